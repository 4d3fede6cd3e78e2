//! Cache operations, one file per concern

mod admin;
mod invalidate;
mod lookup;
mod store;
