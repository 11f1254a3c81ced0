//! # Google Photos Provider
//!
//! Implements the `MediaCatalog` trait for the Google Photos Library API v1.
//!
//! ## Overview
//!
//! This module provides:
//! - Whole-library listing and date/type filtered search
//! - Batch and single lookups that refresh time-limited base URLs
//! - Conversion of API media items into catalog descriptors

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GooglePhotosConnector, PHOTOS_API_BASE};
pub use error::{GooglePhotosError, Result};
