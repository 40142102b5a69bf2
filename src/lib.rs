//! WolfStore - Filesystem-Backed Object Storage
//!
//! A single-node object storage server that maps S3-style
//! `/<bucket>/<key>` paths onto a directory tree on local disk.
//! Objects are streamed to and from disk with constant memory use,
//! digested with SHA-256 as they move, and served with full
//! byte-range support.

pub mod config;
pub mod error;
pub mod http;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use http::ObjectServer;
pub use store::FileStore;
