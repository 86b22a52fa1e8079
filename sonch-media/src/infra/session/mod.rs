//! Session-scoped key/value storage
//!
//! The credential and the post list snapshot both live here. The storage is
//! an explicit interface so that caching policy stays independent from the
//! medium: [`MemoryStorage`] for tests and short-lived processes,
//! [`DiskStorage`] for a session directory that survives between invocations
//! of the operator binary until it is cleared.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub mod credentials;
pub mod disk;
pub mod memory;

pub use credentials::CredentialStore;
pub use disk::DiskStorage;
pub use memory::MemoryStorage;

#[async_trait]
pub trait SessionStorage: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Drop everything held for this session.
    async fn clear(&self) -> Result<()>;
}

pub type SharedStorage = Arc<dyn SessionStorage>;
