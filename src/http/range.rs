//! Range header parsing and validation
//!
//! Supports the single-span form `bytes=<start>-<end>` with an
//! optionally empty end bound ("through end of object"). Suffix
//! ranges (`bytes=-N`) and multi-span ranges are rejected as
//! malformed. Unsatisfiable bounds report the true total size so the
//! caller can retry correctly.

use crate::error::{Error, Result};

/// A validated, inclusive byte span within an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset served
    pub start: u64,
    /// Last byte offset served (inclusive, already clamped to size)
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the span
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Content-Range header value for a satisfied range
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Content-Range header value for an unsatisfiable range
pub fn unsatisfiable_content_range(total: u64) -> String {
    format!("bytes */{total}")
}

/// Parse and validate a Range header against an object's total size.
///
/// Validation order matters: syntax errors are `InvalidRange` (400),
/// a well-formed range that starts past the end of the object or is
/// inverted is `RangeNotSatisfiable` (416), and an end past the last
/// byte is silently clamped.
pub fn parse_range(header: &str, total: u64) -> Result<ByteRange> {
    let spec = header
        .strip_prefix("bytes=")
        .ok_or_else(|| Error::InvalidRange(format!("unsupported range unit: {header}")))?;

    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| Error::InvalidRange(format!("malformed range: {header}")))?;

    if start_str.is_empty() {
        // Suffix ranges are not supported
        return Err(Error::InvalidRange(format!(
            "missing range start: {header}"
        )));
    }

    let start: u64 = start_str
        .parse()
        .map_err(|_| Error::InvalidRange(format!("invalid range start: {start_str}")))?;

    let end: u64 = if end_str.is_empty() {
        total.saturating_sub(1)
    } else {
        end_str
            .parse()
            .map_err(|_| Error::InvalidRange(format!("invalid range end: {end_str}")))?
    };

    if start > end || start >= total {
        return Err(Error::RangeNotSatisfiable { total });
    }

    Ok(ByteRange {
        start,
        end: end.min(total - 1),
    })
}
