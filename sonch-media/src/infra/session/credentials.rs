use super::SharedStorage;
use crate::error::Result;
use crate::infra::constants::session::TOKEN_KEY;

/// Bearer credential persisted in session storage under a fixed key.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    storage: SharedStorage,
}

impl CredentialStore {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    pub async fn token(&self) -> Result<Option<String>> {
        Ok(self
            .storage
            .get(TOKEN_KEY)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    pub async fn is_present(&self) -> Result<bool> {
        Ok(self.token().await?.is_some())
    }

    pub async fn store(&self, token: String) -> Result<()> {
        self.storage.set(TOKEN_KEY, token).await
    }

    pub async fn evict(&self) -> Result<()> {
        self.storage.remove(TOKEN_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::infra::session::MemoryStorage;

    #[tokio::test]
    async fn blank_tokens_count_as_absent() {
        let credentials = CredentialStore::new(Arc::new(MemoryStorage::new()));
        credentials.store("  ".into()).await.unwrap();
        assert!(!credentials.is_present().await.unwrap());

        credentials.store("t0k".into()).await.unwrap();
        assert_eq!(credentials.token().await.unwrap().as_deref(), Some("t0k"));

        credentials.evict().await.unwrap();
        assert!(credentials.token().await.unwrap().is_none());
    }
}
