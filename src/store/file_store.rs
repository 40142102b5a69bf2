//! Filesystem-backed object store
//!
//! One regular file per object. Writes stream into a uniquely named
//! temporary file alongside the destination and are renamed into
//! place only once the body is fully on disk, so a concurrent reader
//! sees either the previous complete object or the new one, never a
//! partial write. The rename is the only synchronization primitive;
//! concurrent stores to the same identity race and the last writer
//! wins.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::digest::{self, DigestAccumulator};
use crate::store::paths::ObjectPath;

/// Object metadata derived from a stat call
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Content length in bytes
    pub size: u64,
    /// Filesystem modification time of the backing file
    pub modified: SystemTime,
}

/// Object store rooted at a single directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the backing file for an object
    fn object_file(&self, path: &ObjectPath) -> PathBuf {
        self.root.join(path.relative())
    }

    /// Store an object from a byte stream, returning its hex digest.
    ///
    /// The digest is computed over the same bytes being written, in
    /// the same bounded-buffer pass. On any failure the temporary
    /// file is removed; the final name is only ever populated by a
    /// complete object.
    pub async fn put<S>(&self, path: &ObjectPath, mut body: S) -> Result<String>
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        let dest = self.object_file(path);
        let parent = dest
            .parent()
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        fs::create_dir_all(parent).await?;

        let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = File::create(&tmp).await?;

        let mut accumulator = DigestAccumulator::new();
        let mut written: u64 = 0;

        let copy_result: Result<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                accumulator.update(&chunk);
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            // Flush to the OS; no sync_all - let the page cache handle durability
            file.flush().await?;
            Ok(())
        }
        .await;

        drop(file);

        if let Err(e) = copy_result {
            remove_tmp(&tmp).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp, &dest).await {
            remove_tmp(&tmp).await;
            return Err(e.into());
        }

        let etag = accumulator.finalize_hex();
        info!("stored {} ({} bytes, etag {})", path, written, etag);
        Ok(etag)
    }

    /// Open an object for reading along with its metadata
    pub async fn open(&self, path: &ObjectPath) -> Result<(File, ObjectMeta)> {
        let file_path = self.object_file(path);
        let file = File::open(&file_path)
            .await
            .map_err(|e| not_found_or_io(e, path))?;

        let meta = file.metadata().await?;
        if meta.is_dir() {
            // A key prefix of some deeper object; not an object itself
            return Err(Error::NotFound(path.to_string()));
        }

        let modified = meta.modified()?;
        debug!("opened {} ({} bytes)", path, meta.len());

        Ok((
            file,
            ObjectMeta {
                size: meta.len(),
                modified,
            },
        ))
    }

    /// Stat an object without opening it for streaming
    pub async fn metadata(&self, path: &ObjectPath) -> Result<ObjectMeta> {
        let meta = fs::metadata(self.object_file(path))
            .await
            .map_err(|e| not_found_or_io(e, path))?;
        if meta.is_dir() {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(ObjectMeta {
            size: meta.len(),
            modified: meta.modified()?,
        })
    }

    /// Digest the current content of an object.
    ///
    /// A full pass over the persisted bytes through its own file
    /// handle, independent of any handle streaming to a client.
    pub async fn digest(&self, path: &ObjectPath) -> Result<String> {
        let mut file = File::open(self.object_file(path))
            .await
            .map_err(|e| not_found_or_io(e, path))?;
        digest::digest_reader(&mut file).await
    }

    /// Delete the backing file for an object
    pub async fn delete(&self, path: &ObjectPath) -> Result<()> {
        let file_path = self.object_file(path);
        let meta = fs::metadata(&file_path)
            .await
            .map_err(|e| not_found_or_io(e, path))?;
        if meta.is_dir() {
            // A key prefix of some deeper object; not an object itself
            return Err(Error::NotFound(path.to_string()));
        }

        fs::remove_file(&file_path)
            .await
            .map_err(|e| not_found_or_io(e, path))?;
        info!("deleted {}", path);
        Ok(())
    }
}

/// Map ENOENT to NotFound, everything else stays an IO error
fn not_found_or_io(e: io::Error, path: &ObjectPath) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound(path.to_string())
    } else {
        Error::Io(e)
    }
}

/// Best-effort cleanup of a partial temporary file
async fn remove_tmp(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("failed to remove partial file {:?}: {}", tmp, e);
        }
    }
}
