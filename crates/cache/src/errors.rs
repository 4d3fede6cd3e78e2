//! Error handling for the cache subsystem
//!
//! Every variant carries a [`RecoveryHint`]. Only configuration errors are
//! fatal; everything else is recovered locally by treating the affected
//! entry as a miss.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
