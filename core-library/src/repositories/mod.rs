//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface the sync engine depends on
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//! - Candidate paging is keyset-based via [`CandidateCursor`](crate::models::CandidateCursor)
//!
//! ## Available Repositories
//!
//! - `MediaRepository` - Indexed media records and the scan watermark

pub mod media;

pub use media::{MediaRepository, SqliteMediaRepository};
