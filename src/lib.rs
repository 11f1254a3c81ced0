//! Workspace placeholder crate.
//!
//! Re-exports the `core-service` façade so hosts can depend on
//! `gphotos-mirror` alone and pick the bridge set through its features.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
