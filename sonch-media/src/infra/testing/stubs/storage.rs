use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{MediaError, Result};
use crate::infra::session::{MemoryStorage, SessionStorage};

/// Memory-backed session storage whose writes can be slowed down and whose
/// removals can be made to fail.
#[derive(Debug, Default)]
pub struct ScriptedStorage {
    inner: MemoryStorage,
    fail_removes: AtomicBool,
    write_delay_ms: AtomicU64,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// Every `set` sleeps this long before it lands.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStorage for ScriptedStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(MediaError::Storage(format!("scripted failure removing {key}")));
        }
        self.inner.remove(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}
