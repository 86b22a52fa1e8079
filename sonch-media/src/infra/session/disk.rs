use std::path::PathBuf;

use async_trait::async_trait;

use super::SessionStorage;
use crate::error::{MediaError, Result};

/// Session storage backed by a `cacache` directory.
///
/// Values survive process restarts until [`SessionStorage::clear`] wipes the
/// directory, which is what ending a session means here.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SessionStorage for DiskStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match cacache::read(self.root.as_path(), key).await {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                MediaError::Storage(format!(
                    "session entry {key} is not valid UTF-8: {e}"
                ))
            }),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(MediaError::Storage(format!(
                "cacache read failed for {key}: {e}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        cacache::write(self.root.as_path(), key, value.as_bytes())
            .await
            .map(|_| ())
            .map_err(|e| {
                MediaError::Storage(format!("cacache write failed for {key}: {e}"))
            })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let opts = cacache::index::RemoveOpts::new().remove_fully(true);
        match opts.remove(self.root.as_path(), key).await {
            Ok(()) | Err(cacache::Error::EntryNotFound(_, _)) => Ok(()),
            Err(e) => Err(MediaError::Storage(format!(
                "cacache remove failed for {key}: {e}"
            ))),
        }
    }

    async fn clear(&self) -> Result<()> {
        cacache::clear(self.root.as_path()).await.map_err(|e| {
            MediaError::Storage(format!("cacache clear failed: {e}"))
        })
    }
}
