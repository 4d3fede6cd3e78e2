//! The `UrlCache` facade
//!
//! - [`types`]: the handle and the state shared with the IO lane
//! - `builder`: opening a cache root and reconciling it with the index
//! - `operations`: lookup, store, invalidate and administrative calls

pub(crate) mod internal;
pub(crate) mod types;

mod builder;
mod operations;
mod trait_impl;

pub use types::UrlCache;

#[cfg(test)]
mod tests;
