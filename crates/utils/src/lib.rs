//! Shared utilities for urlcache
//!
//! Atomic file replacement used for the persisted index, and the tracing
//! subscriber setup used by binaries.

pub mod atomic_file;
pub mod tracing;

pub use atomic_file::*;
