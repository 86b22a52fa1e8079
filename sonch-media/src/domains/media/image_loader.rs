//! Per-image load with bounded, cache-busted retries
//!
//! Each attempt is submitted to the shared [`ImageLoadQueue`], so a page full
//! of failing images retries one request at a time instead of stampeding the
//! origin. After the n-th failure the loader waits `n * base_delay` and
//! resubmits with `?retry=n` so intermediaries can't hand back the cached
//! failure. Once the budget is spent the state is terminal and the image is
//! never requested again by this loader.

use std::sync::Arc;

use log::{debug, error, warn};
use sonch_model::ImageId;

use crate::domains::media::image_queue::ImageLoadQueue;
use crate::error::{MediaError, Result};
use crate::infra::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::infra::services::ImageSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Not started.
    Pending,
    /// Attempt `attempt` (1-based) is queued or in flight.
    Loading { attempt: u32 },
    Loaded(Vec<u8>),
    /// No image id; render the placeholder without a request.
    Missing,
    /// Budget exhausted. Terminal.
    Failed { attempts: u32, last_error: String },
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoadState::Loaded(_) | LoadState::Missing | LoadState::Failed { .. }
        )
    }

    /// Whether the UI should show the fallback instead of the image.
    pub fn shows_placeholder(&self) -> bool {
        matches!(self, LoadState::Missing | LoadState::Failed { .. })
    }

    pub fn into_bytes(self) -> Result<Option<Vec<u8>>> {
        match self {
            LoadState::Loaded(bytes) => Ok(Some(bytes)),
            LoadState::Failed {
                attempts,
                last_error,
            } => Err(MediaError::PermanentLoadFailure {
                attempts,
                last_error,
            }),
            LoadState::Pending | LoadState::Loading { .. } | LoadState::Missing => {
                Ok(None)
            }
        }
    }
}

#[derive(Debug)]
pub struct ImageLoader {
    image_id: Option<ImageId>,
    queue: ImageLoadQueue,
    source: Arc<dyn ImageSource>,
    policy: RetryPolicy,
    state: LoadState,
}

impl ImageLoader {
    pub fn new(
        image_id: Option<ImageId>,
        queue: ImageLoadQueue,
        source: Arc<dyn ImageSource>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            image_id,
            queue,
            source,
            policy,
            state: LoadState::Pending,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn into_state(self) -> LoadState {
        self.state
    }

    /// Drive the load to a terminal state.
    ///
    /// Calling this again after it finished returns the settled state without
    /// new requests. Dropping the future mid-flight discards the outcome; a
    /// fetch that was already queued still runs.
    pub async fn load(&mut self) -> &LoadState {
        if !self.state.is_terminal() {
            let settled = self.run().await;
            self.state = settled;
        }
        &self.state
    }

    async fn run(&mut self) -> LoadState {
        let id = self.image_id.as_ref().map(|id| id.as_str().to_owned());
        let mut retry = RetryState::new(self.policy);

        loop {
            let version = (retry.failures() > 0).then_some(retry.failures());
            let Some(url) = self.source.image_url(id.as_deref(), version) else {
                return LoadState::Missing;
            };

            let attempt = retry.next_attempt();
            self.state = LoadState::Loading { attempt };
            debug!("[ImageLoader] attempt {attempt} for {url}");

            let source = Arc::clone(&self.source);
            let outcome = self
                .queue
                .add(move || async move { source.fetch_image(url).await })
                .await
                .and_then(|fetched| fetched);

            let err = match outcome {
                Ok(bytes) => return LoadState::Loaded(bytes),
                Err(err) => err,
            };

            match retry.record_failure() {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        "[ImageLoader] {} failed on attempt {attempt}: {err}; retrying in {delay:?}",
                        id.as_deref().unwrap_or_default()
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    error!(
                        "[ImageLoader] giving up on {} after {attempt} attempts: {err}",
                        id.as_deref().unwrap_or_default()
                    );
                    return LoadState::Failed {
                        attempts: retry.failures(),
                        last_error: err.to_string(),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infra::testing::TestBlogApi;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(5))
    }

    fn loader(api: &TestBlogApi, id: Option<&str>) -> ImageLoader {
        ImageLoader::new(
            id.map(|id| ImageId::new(id).unwrap()),
            ImageLoadQueue::new(),
            Arc::new(api.clone()),
            policy(),
        )
    }

    #[tokio::test]
    async fn recovers_on_third_attempt_with_busted_urls() {
        let api = TestBlogApi::new();
        api.put_image("f1", b"jpeg".to_vec());
        api.fail_next_fetches(2);

        let mut loader = loader(&api, Some("f1"));
        assert_eq!(loader.load().await, &LoadState::Loaded(b"jpeg".to_vec()));

        let queries: Vec<_> = api
            .fetched_urls()
            .iter()
            .map(|url| url.query().map(str::to_owned))
            .collect();
        assert_eq!(
            queries,
            vec![None, Some("retry=1".into()), Some("retry=2".into())]
        );
    }

    #[tokio::test]
    async fn stops_after_three_attempts() {
        let api = TestBlogApi::new();
        api.fail_next_fetches(u32::MAX);

        let mut loader = loader(&api, Some("f1"));
        let state = loader.load().await.clone();

        assert!(matches!(state, LoadState::Failed { attempts: 3, .. }));
        assert!(state.shows_placeholder());
        assert_eq!(api.fetched_urls().len(), 3);

        // Terminal: loading again does not touch the network.
        loader.load().await;
        assert_eq!(api.fetched_urls().len(), 3);

        let err = state.into_bytes().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PermanentLoadFailure);
    }

    #[tokio::test]
    async fn missing_ids_skip_the_network() {
        let api = TestBlogApi::new();
        let mut loader = loader(&api, None);
        assert_eq!(loader.load().await, &LoadState::Missing);
        assert!(api.fetched_urls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn loaders_sharing_a_queue_fetch_one_at_a_time() {
        let api = TestBlogApi::new();
        api.set_fetch_delay(Duration::from_millis(5));
        for n in 0..6 {
            api.put_image(&format!("img-{n}"), vec![n as u8]);
        }
        api.fail_next_fetches(1);

        let queue = ImageLoadQueue::new();
        let source: Arc<dyn ImageSource> = Arc::new(api.clone());
        let handles: Vec<_> = (0..6)
            .map(|n| {
                let mut loader = ImageLoader::new(
                    Some(ImageId::new(format!("img-{n}")).unwrap()),
                    queue.clone(),
                    Arc::clone(&source),
                    policy(),
                );
                tokio::spawn(async move { loader.load().await.clone() })
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), LoadState::Loaded(_)));
        }
        assert_eq!(api.max_concurrent_fetches(), 1);
    }
}
