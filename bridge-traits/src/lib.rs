//! # Host Bridge Traits
//!
//! Contracts between the sync engine and the collaborators it treats as opaque.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP execution with transport-level retry
//!   and streaming downloads
//! - [`MediaCatalog`](catalog::MediaCatalog) - Paginated search/list and batch/single
//!   lookups against the remote photo library
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations must keep
//! the distinction between an HTTP-level rejection (`HttpStatus`), a transport failure
//! (`Network`) and a local I/O failure (`Io`): the engine quarantines only the first.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{ByteStream, HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//!
//!     async fn download_stream(&self, request: HttpRequest) -> Result<ByteStream> {
//!         todo!()
//!     }
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod http;

pub use error::BridgeError;

pub use catalog::{
    BatchGetResult, BatchItemResult, CatalogPage, DateRange, ItemStatus, KindFilter,
    MediaCatalog, MediaKind, RemoteMediaItem, SearchQuery,
};
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
