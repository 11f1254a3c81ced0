//! # Library Management Module
//!
//! Owns the mirror index database and provides repository patterns for data
//! access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - The [`MediaRecord`] model and its local path rules
//! - The [`MediaRepository`] contract used by the sync engine

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig, DatabaseLocation};
pub use error::{LibraryError, Result};
pub use models::{CandidateCursor, CandidateFilter, MediaRecord};
pub use repositories::{MediaRepository, SqliteMediaRepository};
