//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with transport-level retry and streaming
//!   downloads backed by `tokio-util`'s `StreamReader`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = Arc::new(ReqwestHttpClient::with_pool_size(20)?);
//!     // Hand to the catalog connector and the download orchestrator
//!     Ok(())
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
