//! Object storage backed by a single-rooted directory tree
//!
//! One regular file per object at `<root>/<bucket>/<key>`. The
//! filesystem is the metadata store: existence, size, and
//! last-modified time all come from stat calls, and the content
//! digest is computed from the bytes themselves.

pub mod digest;
pub mod file_store;
pub mod paths;

pub use digest::DigestAccumulator;
pub use file_store::{FileStore, ObjectMeta};
pub use paths::ObjectPath;
