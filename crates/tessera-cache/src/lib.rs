//! Keyed dependency cache for Tessera.
//!
//! Entries are tar+gzip bundles of the paths a pipeline declares expensive
//! to rebuild, stored on the local filesystem under a key derived from the
//! run's ref and cell attributes.

pub mod archive;
pub mod keys;
pub mod store;

pub use keys::{resolve, sanitize};
pub use store::FilesystemStore;
