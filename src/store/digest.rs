//! Streaming SHA-256 digest computation
//!
//! The same accumulator feeds both the store path (hashing bytes as
//! they are written) and the retrieve path (hashing a second pass
//! over the persisted file), so the two values are directly
//! comparable as ETags.

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Copy/hash buffer size; memory use is independent of object size
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Incremental SHA-256 accumulator producing a hex-encoded digest
#[derive(Default)]
pub struct DigestAccumulator {
    hasher: Sha256,
}

impl DigestAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finalize and return the lowercase hex digest
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl std::fmt::Debug for DigestAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DigestAccumulator")
    }
}

/// Digest an entire reader through a bounded buffer
pub async fn digest_reader<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut accumulator = DigestAccumulator::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        accumulator.update(&buf[..n]);
    }

    Ok(accumulator.finalize_hex())
}
