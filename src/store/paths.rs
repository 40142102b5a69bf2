//! Request path parsing and hardening
//!
//! Object paths have the form `/<bucket>/<key>`. The bucket is a
//! single path segment; the key may contain further separators and
//! maps to a nested file path under the bucket directory. Parsing
//! rejects anything that could resolve outside the store root.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Validated `(bucket, key)` pair addressing exactly one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    bucket: String,
    key: String,
}

impl ObjectPath {
    /// Parse a raw request path into a validated object path.
    ///
    /// Strips leading/trailing separators, splits off the bucket, and
    /// treats the remainder as the key. Fails when either part is
    /// missing or empty, or when any segment is not a plain name
    /// (`..`, `.`, and empty segments are all rejected).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::InvalidPath("missing bucket and key".to_string()));
        }

        let (bucket, key) = trimmed
            .split_once('/')
            .ok_or_else(|| Error::InvalidPath("missing key".to_string()))?;

        if bucket.is_empty() {
            return Err(Error::InvalidPath("empty bucket name".to_string()));
        }
        if key.is_empty() {
            return Err(Error::InvalidPath("empty key name".to_string()));
        }

        validate_segments(bucket)?;
        validate_segments(key)?;

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Bucket name (first path segment)
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key (remainder, may contain separators)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Relative file path under the store root
    pub fn relative(&self) -> PathBuf {
        Path::new(&self.bucket).join(&self.key)
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Reject segments that could escape the store root when joined
fn validate_segments(part: &str) -> Result<()> {
    // An empty segment ("a//b") shows up as a non-Normal component
    // or collapses silently; check for it explicitly.
    if part.split('/').any(|seg| seg.is_empty()) {
        return Err(Error::InvalidPath("empty path segment".to_string()));
    }

    for component in Path::new(part).components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(Error::InvalidPath(format!(
                    "path segment not allowed: {part}"
                )));
            }
        }
    }

    Ok(())
}
