//! File functions
//!
//! One file holds one tree. An operation reads the whole file when it starts and, if it changed
//! the tree, rewrites the whole file when it finishes. No locking is done: with concurrent
//! writers, the last one wins.
//!
//! A store writes a sibling `.tmp` file and renames it over the index, so a failed write leaves
//! the previous index in place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::tree::AttendanceTree;

/// Location of a persisted tree.
#[derive(Clone, Debug)]
pub struct IndexFile {
    path: PathBuf,
}

impl IndexFile {
    /// Refer to an index file at the specified path. Nothing is opened yet.
    pub fn new<P: AsRef<Path>>(origin: P) -> Self {
        Self {
            path: origin.as_ref().into(),
        }
    }

    /// Where the index lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and verify the tree. A missing file is an error.
    pub async fn load(&self) -> Result<AttendanceTree> {
        tracing::info!("Opening index at: {}", self.path.display());

        let bytes = tokio::fs::read(&self.path).await?;
        let tree = AttendanceTree::from_bytes(&bytes)?;
        tree.verify()?;
        tree.info();
        Ok(tree)
    }

    /// Load the tree, starting from an empty one if the file does not exist yet.
    pub async fn load_or_default(&self) -> Result<AttendanceTree> {
        match self.load().await {
            Ok(tree) => Ok(tree),
            Err(err) => {
                // If the error is NotFound, the first store will create the file
                if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
                    if io_error.kind() == ErrorKind::NotFound {
                        tracing::info!("No index at: {}, starting empty", self.path.display());
                        return Ok(AttendanceTree::new());
                    }
                }
                Err(err)
            }
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        temp.into()
    }

    /// Serialize the tree and replace the file contents with it.
    pub async fn store(&self, tree: &AttendanceTree) -> Result<()> {
        tracing::info!("Storing index at: {}", self.path.display());

        let bytes = tree.to_bytes()?;
        let temp = self.temp_path();
        if let Err(e) = write_synced(&temp, &bytes).await {
            tracing::error!("Failed to write: {}, {e}", temp.display());
            // Best effort, report the write error
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| e.into())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
