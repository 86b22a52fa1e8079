//! Store-on-read, invalidate-on-write cache for the post list
//!
//! The snapshot lives in session storage as the raw JSON list (key `blogs`)
//! plus its capture time. Any mutation in this session drops it; the next
//! read goes back to the backend. A snapshot older than the configured max
//! age counts as a miss and is dropped as well.
//!
//! Every invalidation bumps a generation counter. A read that started its
//! fetch under an older generation returns what it got to its caller but
//! does not store it, so a slow pre-mutation read can't resurrect a
//! snapshot the mutation just invalidated. Reads of the snapshot hold the
//! same lock as writes, so nobody sees the list without its capture time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sonch_model::{Post, PostId};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::infra::constants::session::{POSTS_CAPTURED_AT_KEY, POSTS_KEY};
use crate::infra::retry::{RetryPolicy, retry};
use crate::infra::services::BlogApi;
use crate::infra::session::SharedStorage;

/// Snapshot of the whole post collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub posts: Vec<Post>,
    pub captured_at: DateTime<Utc>,
}

enum Snapshot {
    Absent,
    Usable(CacheEntry),
    /// Present but unreadable or too old.
    Discard(String),
}

#[derive(Debug)]
struct CacheInner {
    storage: SharedStorage,
    /// Held while reading, writing or removing the snapshot.
    generation: Mutex<u64>,
    /// Serializes invalidate-then-refetch cycles.
    refresh_lock: Mutex<()>,
    policy: RetryPolicy,
    max_age: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct PostListCache {
    inner: Arc<CacheInner>,
}

impl PostListCache {
    /// `policy` governs the retrying list fetch on a miss. Snapshots never
    /// expire on their own.
    pub fn new(storage: SharedStorage, policy: RetryPolicy) -> Self {
        Self::with_max_age(storage, policy, None)
    }

    /// Like [`PostListCache::new`], but snapshots older than `max_age` are
    /// treated as a miss.
    pub fn with_max_age(
        storage: SharedStorage,
        policy: RetryPolicy,
        max_age: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                storage,
                generation: Mutex::new(0),
                refresh_lock: Mutex::new(()),
                policy,
                max_age,
            }),
        }
    }

    /// The stored snapshot, if any. An unreadable or expired snapshot is
    /// removed and reported as a miss.
    pub async fn get(&self) -> Result<Option<CacheEntry>> {
        let mut generation = self.inner.generation.lock().await;
        match self.read().await? {
            Snapshot::Absent => Ok(None),
            Snapshot::Usable(entry) => Ok(Some(entry)),
            Snapshot::Discard(reason) => {
                warn!("[PostListCache] Discarding snapshot: {reason}");
                self.drop_snapshot(&mut generation).await?;
                Ok(None)
            }
        }
    }

    /// Look a post up in the snapshot without touching the network.
    pub async fn find(&self, id: &PostId) -> Result<Option<Post>> {
        Ok(self
            .get()
            .await?
            .and_then(|entry| entry.posts.into_iter().find(|post| &post.id == id)))
    }

    /// Replace the snapshot. Counts as a fresh capture.
    pub async fn set(&self, posts: &[Post]) -> Result<()> {
        let _generation = self.inner.generation.lock().await;
        self.write(posts).await
    }

    /// Drop the snapshot unconditionally.
    pub async fn invalidate(&self) -> Result<()> {
        let mut generation = self.inner.generation.lock().await;
        self.drop_snapshot(&mut generation).await
    }

    /// End the session: the snapshot, the credential and anything else in
    /// session storage are removed.
    pub async fn clear_session(&self) -> Result<()> {
        let mut generation = self.inner.generation.lock().await;
        *generation = generation.wrapping_add(1);
        self.inner.storage.clear().await?;
        info!("[PostListCache] Session storage cleared (generation {})", *generation);
        Ok(())
    }

    /// Cached list on a hit; otherwise a retrying fetch whose result is
    /// stored unless an invalidation happened meanwhile.
    pub async fn list(&self, api: &dyn BlogApi) -> Result<Vec<Post>> {
        match self.get().await {
            Ok(Some(entry)) => {
                debug!(
                    "[PostListCache] Hit: {} posts captured at {}",
                    entry.posts.len(),
                    entry.captured_at
                );
                return Ok(entry.posts);
            }
            Ok(None) => {}
            Err(e) => warn!("[PostListCache] Reading snapshot failed: {e}"),
        }

        let started_under = *self.inner.generation.lock().await;
        let posts = retry(self.inner.policy, "list posts", || api.list_posts()).await?;

        let generation = self.inner.generation.lock().await;
        if *generation == started_under {
            if let Err(e) = self.write(&posts).await {
                warn!("[PostListCache] Storing snapshot failed: {e}");
            }
        } else {
            debug!(
                "[PostListCache] Not storing list fetched under generation {started_under} (now {})",
                *generation
            );
        }

        Ok(posts)
    }

    /// Invalidate, then repopulate from the backend.
    ///
    /// A failed invalidation is returned, since the old snapshot may still be
    /// in storage. A failed refetch only leaves the cache empty and yields
    /// `None`; the next read fetches again.
    pub async fn refresh(&self, api: &dyn BlogApi) -> Result<Option<Vec<Post>>> {
        let _cycle = self.inner.refresh_lock.lock().await;
        self.invalidate().await?;
        match self.list(api).await {
            Ok(posts) => {
                info!("[PostListCache] Refreshed with {} posts", posts.len());
                Ok(Some(posts))
            }
            Err(e) => {
                warn!("[PostListCache] Refetch after invalidation failed: {e}");
                Ok(None)
            }
        }
    }

    /// Callers must hold the generation lock.
    async fn read(&self) -> Result<Snapshot> {
        let storage = &self.inner.storage;
        let Some(raw) = storage.get(POSTS_KEY).await? else {
            return Ok(Snapshot::Absent);
        };
        let captured_at = storage.get(POSTS_CAPTURED_AT_KEY).await?;

        let posts = match serde_json::from_str::<Vec<Post>>(&raw) {
            Ok(posts) => posts,
            Err(e) => return Ok(Snapshot::Discard(e.to_string())),
        };
        let Some(captured_at) = captured_at else {
            return Ok(Snapshot::Discard("missing capture time".into()));
        };
        let captured_at = match DateTime::parse_from_rfc3339(&captured_at) {
            Ok(at) => at.with_timezone(&Utc),
            Err(e) => return Ok(Snapshot::Discard(e.to_string())),
        };

        if let Some(max_age) = self.inner.max_age
            && let Ok(age) = Utc::now().signed_duration_since(captured_at).to_std()
            && age > max_age
        {
            return Ok(Snapshot::Discard(format!(
                "captured at {captured_at}, older than {max_age:?}"
            )));
        }

        Ok(Snapshot::Usable(CacheEntry { posts, captured_at }))
    }

    /// Callers must hold the generation lock and pass its value.
    async fn drop_snapshot(&self, generation: &mut u64) -> Result<()> {
        *generation = generation.wrapping_add(1);
        debug!("[PostListCache] Invalidated (generation {})", *generation);
        self.inner.storage.remove(POSTS_KEY).await?;
        self.inner.storage.remove(POSTS_CAPTURED_AT_KEY).await
    }

    /// Callers must hold the generation lock.
    async fn write(&self, posts: &[Post]) -> Result<()> {
        let raw = serde_json::to_string(posts)?;
        self.inner.storage.set(POSTS_KEY, raw).await?;
        self.inner
            .storage
            .set(POSTS_CAPTURED_AT_KEY, Utc::now().to_rfc3339())
            .await
    }
}
