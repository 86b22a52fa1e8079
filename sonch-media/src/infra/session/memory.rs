use async_trait::async_trait;
use dashmap::DashMap;

use super::SessionStorage;
use crate::error::Result;

/// Process-local session storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("token").await.unwrap(), None);

        storage.set("token", "abc".into()).await.unwrap();
        assert_eq!(storage.get("token").await.unwrap().as_deref(), Some("abc"));

        storage.remove("token").await.unwrap();
        storage.remove("token").await.unwrap();
        assert!(storage.is_empty());
    }
}
