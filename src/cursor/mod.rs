//! Durable cursor persistence for ingestion progress.
//!
//! # Atomic Writes
//!
//! Cursor updates use an atomic write pattern:
//! 1. Write serialized bytes to a temp file: `{path}.tmp`
//! 2. Fsync the temp file, then close it. The fsync must happen *before* the
//!    rename: a crash between rename and fsync could leave the final path
//!    pointing at data the storage device never committed.
//! 3. Copy the existing cursor (if any) to `{path}.bak` as a last-known-good
//!    backup.
//! 4. Rename the temp file onto the final path.
//!
//! At any observable moment the on-disk cursor is either the previous
//! fully-written value or the new fully-written value, never a partial write.
//! A failure at any step removes the temp file and surfaces as
//! [`CursorError::AtomicWrite`]; the previous cursor is untouched.

pub mod state;

pub use state::CursorRecord;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::emit;
use crate::error::{AtomicWriteSnafu, CursorError, ReadSnafu, SerializeSnafu};
use crate::metrics::events::CursorSaved;
use snafu::prelude::*;

/// Suffix for the in-flight temp file.
const TMP_SUFFIX: &str = ".tmp";
/// Suffix for the last-known-good backup.
const BAK_SUFFIX: &str = ".bak";

/// Persists cursor records at a caller-chosen path with crash-safe semantics.
pub struct CursorStore {
    path: PathBuf,
    /// Label used in log messages and metrics (e.g. the pipeline name).
    label: String,
}

impl CursorStore {
    /// Create a store for the given cursor file path.
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    /// The final cursor file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Durably persist a cursor record.
    ///
    /// A crash at any instant leaves either the old or the new value readable
    /// at the cursor path. On failure the temp file is removed and the error
    /// carries the stable "atomic cursor write failed" marker.
    pub async fn write(&self, record: &CursorRecord) -> Result<(), CursorError> {
        let bytes = serde_json::to_vec_pretty(record).context(SerializeSnafu)?;
        let tmp_path = self.sibling(TMP_SUFFIX);

        let result = self.write_stages(&tmp_path, bytes).await;

        if let Err(source) = result {
            // Best-effort cleanup; the original cursor (if any) is untouched.
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(source).context(AtomicWriteSnafu {
                path: self.path.display().to_string(),
            });
        }

        emit!(CursorSaved {
            target: self.label.clone(),
        });

        debug!(
            target = %self.label,
            path = %self.path.display(),
            "Saved cursor"
        );

        Ok(())
    }

    /// Steps 1-4 of the atomic write, with the ordering constraints intact.
    async fn write_stages(&self, tmp_path: &Path, bytes: Vec<u8>) -> std::io::Result<()> {
        // 1. Buffered write to the temp sibling.
        let mut file = tokio::fs::File::create(tmp_path).await?;
        file.write_all(&bytes).await?;

        // 2. Flush to storage before the rename, then close the handle.
        file.sync_all().await?;
        drop(file);

        // 3. Back up the previous value, only when one exists.
        match tokio::fs::copy(&self.path, self.sibling(BAK_SUFFIX)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        // 4. Single filesystem-level rename onto the final path.
        tokio::fs::rename(tmp_path, &self.path).await
    }

    /// Load the cursor record.
    ///
    /// Returns `Ok(None)` when no cursor exists or the file fails to parse;
    /// the caller decides whether that is fatal or a fresh-start signal.
    pub async fn read(&self) -> Result<Option<CursorRecord>, CursorError> {
        self.read_at(&self.path).await
    }

    /// Load the last-known-good backup written by a previous overwrite.
    ///
    /// Useful for recovery when the primary cursor is corrupt.
    pub async fn read_backup(&self) -> Result<Option<CursorRecord>, CursorError> {
        self.read_at(&self.sibling(BAK_SUFFIX)).await
    }

    async fn read_at(&self, path: &Path) -> Result<Option<CursorRecord>, CursorError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(target = %self.label, "No cursor found");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).context(ReadSnafu {
                    path: path.display().to_string(),
                });
            }
        };

        match serde_json::from_slice::<CursorRecord>(&bytes) {
            Ok(record) => {
                debug!(
                    target = %self.label,
                    last_update_ts = record.last_update_ts,
                    "Loaded cursor"
                );
                Ok(Some(record))
            }
            Err(e) => {
                warn!(
                    target = %self.label,
                    error = %e,
                    "Failed to parse cursor file, treating as no checkpoint"
                );
                Ok(None)
            }
        }
    }
}
