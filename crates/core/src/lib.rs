//! Core types and errors for urlcache
//!
//! This crate holds the pieces shared by every other crate in the workspace:
//! the HTTP request/response model handed over by the transport, the storage
//! policy hint, the clock used for all expiry decisions, and the core error
//! type used by the shared utilities.

pub mod clock;
pub mod errors;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{Error, Result};
pub use types::*;
