//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the photo library mirror:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! Every other engine crate reads its settings from [`MirrorConfig`] and logs
//! through the subscriber installed by [`logging::init_logging`].

pub mod config;
pub mod error;
pub mod logging;

pub use config::{parse_date, MirrorConfig, MirrorConfigBuilder, SyncPhases};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
