//! Transfer seam for the upload queue.
//!
//! The actual remote-storage mechanism lives outside the core: the queue only
//! needs a call that succeeds with a byte count or fails with a classifiable
//! message. [`LocalCopyTransfer`] backs tests and local (non-remote) runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// A failed transfer attempt.
///
/// The message is matched against the upload classification table to decide
/// between retry and permanent failure, so implementations should surface the
/// underlying cause text (HTTP status, errno, etc.) rather than flattening it.
#[derive(Debug, Clone)]
pub struct TransferError {
    pub message: String,
}

impl TransferError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransferError {}

/// Moves one finished artifact to remote storage.
///
/// At-least-once semantics: a retried transfer may overwrite its own earlier
/// partial or complete attempt, and must treat that as success.
#[async_trait]
pub trait Transfer: Send + Sync + 'static {
    /// Transfer `local` to `remote`, returning the bytes moved.
    async fn transfer(&self, local: &Path, remote: &str) -> Result<u64, TransferError>;
}

/// Filesystem-backed transfer: copies artifacts under a destination root.
///
/// Used when remote upload resolves to a local path, and by tests.
pub struct LocalCopyTransfer {
    root: PathBuf,
}

impl LocalCopyTransfer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Transfer for LocalCopyTransfer {
    async fn transfer(&self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let dest = self.root.join(remote);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::new(e.to_string()))?;
        }
        tokio::fs::copy(local, &dest)
            .await
            .map_err(|e| TransferError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_copy_round_trip() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let local = src_dir.path().join("artifact.bin");
        std::fs::write(&local, b"compressed bytes").unwrap();

        let transfer = LocalCopyTransfer::new(dst_dir.path());
        let bytes = transfer
            .transfer(&local, "date=2026-08-28/artifact.bin")
            .await
            .unwrap();

        assert_eq!(bytes, 16);
        let copied = std::fs::read(dst_dir.path().join("date=2026-08-28/artifact.bin")).unwrap();
        assert_eq!(copied, b"compressed bytes");
    }

    #[tokio::test]
    async fn test_missing_local_file_fails() {
        let dst_dir = TempDir::new().unwrap();
        let transfer = LocalCopyTransfer::new(dst_dir.path());

        let err = transfer
            .transfer(Path::new("/nonexistent/artifact.bin"), "artifact.bin")
            .await
            .unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_is_idempotent() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let local = src_dir.path().join("artifact.bin");
        std::fs::write(&local, b"v2").unwrap();

        let transfer = LocalCopyTransfer::new(dst_dir.path());
        transfer.transfer(&local, "artifact.bin").await.unwrap();
        transfer.transfer(&local, "artifact.bin").await.unwrap();

        let copied = std::fs::read(dst_dir.path().join("artifact.bin")).unwrap();
        assert_eq!(copied, b"v2");
    }
}
