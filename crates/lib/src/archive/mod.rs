//! Archives: packaged code payloads.
//!
//! An archive is either embedded in its package record (a literal) or stored
//! in the blob store and referenced by URL with a checksum.
//!
//! # Submodules
//!
//! - [`builder`] - Turns path/glob/URL inputs into a single archive file
//! - [`blob`] - Blob store clients (HTTP and in-memory)
//! - [`transport`] - Literal-or-upload storage and proxied retrieval

pub mod blob;
pub mod builder;
pub mod transport;
mod types;

pub use types::*;
