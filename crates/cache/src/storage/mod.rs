//! On-disk blob storage
//!
//! - [`blob`]: one file per entry, written via temp file and rename
//! - [`format`]: magic, CRC32C checksum and bincode record inside each file

pub mod blob;
pub mod format;

pub use blob::{BlobStore, SweepReport};
pub use format::{BlobRecord, BLOB_MAGIC};
