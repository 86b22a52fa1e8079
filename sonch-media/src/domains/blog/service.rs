//! Media service facade
//!
//! The one entry point the rest of the site talks to. Uploads are compressed
//! and retried, post writes upload their banner first, and every mutation
//! (including login and logout) invalidates the post cache and refetches it
//! before returning. A failed invalidation fails the mutation, because the
//! old snapshot may still be served. A failed refetch is only logged; the
//! cache stays empty and the next read goes to the backend.
//!
//! Logging out ends the session: the credential, the snapshot and anything
//! else in session storage are removed.

use std::sync::Arc;

use log::{info, warn};
use reqwest::StatusCode;
use sonch_model::{ImageId, LoginRequest, Post, PostId, PostPayload, StoredImage};
use url::Url;

use crate::domains::blog::post_cache::PostListCache;
use crate::domains::media::compressor::{self, CompressionSettings};
use crate::domains::media::image_loader::{ImageLoader, LoadState};
use crate::domains::media::image_queue::ImageLoadQueue;
use crate::error::{MediaError, Result, ValidationError};
use crate::infra::api_client::ApiClient;
use crate::infra::api_types::UploadFile;
use crate::infra::config::MediaConfig;
use crate::infra::retry::{RetryPolicy, retry};
use crate::infra::services::{BlogApi, ImageSource};
use crate::infra::session::{
    CredentialStore, DiskStorage, MemoryStorage, SharedStorage,
};

/// Retry budgets and compression bounds the facade applies.
#[derive(Debug, Clone, Copy)]
pub struct ServicePolicies {
    pub upload: RetryPolicy,
    pub image: RetryPolicy,
    pub compression: CompressionSettings,
}

impl ServicePolicies {
    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        Ok(Self {
            upload: RetryPolicy::new(
                config.upload_max_attempts,
                config.retry_base_delay(),
            ),
            image: RetryPolicy::new(
                config.image_max_load_attempts,
                config.image_retry_base_delay(),
            ),
            compression: CompressionSettings::from_config(config)?,
        })
    }
}

/// A raw banner file picked by the author, uploaded before the post write.
#[derive(Clone)]
pub struct BannerUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for BannerUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BannerUpload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MediaService {
    api: Arc<dyn BlogApi>,
    images: Arc<dyn ImageSource>,
    credentials: CredentialStore,
    cache: PostListCache,
    queue: ImageLoadQueue,
    policies: ServicePolicies,
}

impl MediaService {
    /// `credentials` and `cache` must be the same ones the API client evicts
    /// on auth failures.
    pub fn new(
        api: Arc<dyn BlogApi>,
        images: Arc<dyn ImageSource>,
        credentials: CredentialStore,
        cache: PostListCache,
        policies: ServicePolicies,
    ) -> Self {
        Self {
            api,
            images,
            credentials,
            cache,
            queue: ImageLoadQueue::new(),
            policies,
        }
    }

    /// Wire storage, HTTP client and cache from configuration.
    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        let storage: SharedStorage = match &config.session_dir {
            Some(dir) => {
                info!("[MediaService] Session storage at {}", dir.display());
                Arc::new(DiskStorage::new(dir.clone()))
            }
            None => Arc::new(MemoryStorage::new()),
        };

        let credentials = CredentialStore::new(Arc::clone(&storage));
        let cache = PostListCache::with_max_age(
            storage,
            RetryPolicy::new(config.list_max_attempts, config.retry_base_delay()),
            config.post_cache_max_age(),
        );
        let client = Arc::new(ApiClient::from_config(
            config,
            credentials.clone(),
            cache.clone(),
        )?);

        Ok(Self::new(
            client.clone(),
            client,
            credentials,
            cache,
            ServicePolicies::from_config(config)?,
        ))
    }

    pub fn cache(&self) -> &PostListCache {
        &self.cache
    }

    /// Compress, then upload with retries. Returns the backend's id and the
    /// size of what was actually sent.
    pub async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredImage> {
        let compressed = compressor::compress(bytes, self.policies.compression).await?;
        let file = UploadFile::from_compressed(file_name, compressed);

        let id = retry(self.policies.upload, "upload image", || {
            self.api.upload_image(&file)
        })
        .await?;
        info!(
            "[MediaService] Uploaded {} ({} bytes) as {}",
            file.file_name,
            file.bytes.len(),
            id
        );
        Ok(StoredImage {
            id,
            uploaded_bytes: file.bytes.len(),
        })
    }

    pub fn image_url(&self, id: Option<&str>, version: Option<u32>) -> Option<Url> {
        self.images.image_url(id, version)
    }

    /// Load one image through the shared queue.
    pub async fn load_image(&self, id: Option<&ImageId>) -> LoadState {
        let mut loader = ImageLoader::new(
            id.cloned(),
            self.queue.clone(),
            Arc::clone(&self.images),
            self.policies.image,
        );
        loader.load().await;
        loader.into_state()
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        self.cache.list(self.api.as_ref()).await
    }

    /// From the cached list when it has the post, else one request.
    pub async fn get_post(&self, id: &PostId) -> Result<Post> {
        match self.cache.find(id).await {
            Ok(Some(post)) => return Ok(post),
            Ok(None) => {}
            Err(e) => warn!("[MediaService] Post cache unreadable: {e}"),
        }
        self.api.get_post(id).await
    }

    pub async fn create_post(
        &self,
        payload: PostPayload,
        banner: Option<BannerUpload>,
    ) -> Result<Post> {
        let payload = self.attach_banner(payload, banner).await?;
        let post = self.api.create_post(&payload).await?;
        info!("[MediaService] Created post {}", post.id);
        self.refresh_posts().await?;
        Ok(post)
    }

    pub async fn update_post(
        &self,
        id: &PostId,
        payload: PostPayload,
        banner: Option<BannerUpload>,
    ) -> Result<Post> {
        let payload = self.attach_banner(payload, banner).await?;
        let post = self.api.update_post(id, &payload).await?;
        info!("[MediaService] Updated post {}", post.id);
        self.refresh_posts().await?;
        Ok(post)
    }

    /// Fails without a request when no credential is held.
    pub async fn delete_post(&self, id: &PostId) -> Result<()> {
        self.require_credential().await?;
        self.api.delete_post(id).await?;
        info!("[MediaService] Deleted post {}", id);
        self.refresh_posts().await?;
        Ok(())
    }

    /// Best-effort removal of a stored image. Posts are not touched.
    pub async fn delete_image(&self, id: &ImageId) -> Result<()> {
        self.require_credential().await?;
        self.api.delete_image(id).await?;
        info!("[MediaService] Deleted image {}", id);
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let token = self
            .api
            .login(&request)
            .await?
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or(MediaError::Auth {
                status: StatusCode::UNAUTHORIZED,
            })?;

        self.credentials.store(token).await?;
        info!("[MediaService] Logged in as {}", email);
        self.refresh_posts().await?;
        Ok(())
    }

    /// Ends the session, then refetches the anonymous post list.
    pub async fn logout(&self) -> Result<()> {
        self.end_session().await?;
        info!("[MediaService] Logged out");
        self.refresh_posts().await?;
        Ok(())
    }

    /// Drop the credential and everything else held in session storage.
    pub async fn end_session(&self) -> Result<()> {
        self.credentials.evict().await?;
        self.cache.clear_session().await
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        self.credentials.is_present().await
    }

    async fn require_credential(&self) -> Result<()> {
        if self.credentials.is_present().await? {
            Ok(())
        } else {
            Err(ValidationError::MissingCredential.into())
        }
    }

    async fn attach_banner(
        &self,
        payload: PostPayload,
        banner: Option<BannerUpload>,
    ) -> Result<PostPayload> {
        match banner {
            Some(banner) => {
                let stored = self.upload_image(&banner.file_name, banner.bytes).await?;
                Ok(payload.with_banner(Some(stored.id)))
            }
            None => Ok(payload),
        }
    }

    async fn refresh_posts(&self) -> Result<()> {
        self.cache.refresh(self.api.as_ref()).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use image::{DynamicImage, ImageFormat};

    use super::*;
    use crate::infra::session::SessionStorage;
    use crate::infra::testing::{Request, ScriptedStorage, TestBlogApi, sample_post};

    struct Harness {
        service: MediaService,
        api: TestBlogApi,
        credentials: CredentialStore,
        storage: SharedStorage,
    }

    fn harness(api: TestBlogApi) -> Harness {
        harness_with(api, Arc::new(MemoryStorage::new()))
    }

    fn harness_with(api: TestBlogApi, storage: SharedStorage) -> Harness {
        let credentials = CredentialStore::new(Arc::clone(&storage));
        let fast = RetryPolicy::new(3, Duration::from_millis(5));
        let cache = PostListCache::new(Arc::clone(&storage), fast);
        let policies = ServicePolicies {
            upload: fast,
            image: fast,
            compression: CompressionSettings::new(
                1200,
                800,
                0.8,
                Duration::from_secs(10),
            )
            .unwrap(),
        };
        let service = MediaService::new(
            Arc::new(api.clone()),
            Arc::new(api.clone()),
            credentials.clone(),
            cache,
            policies,
        );
        Harness {
            service,
            api,
            credentials,
            storage,
        }
    }

    async fn signed_in(api: TestBlogApi) -> Harness {
        let h = harness(api);
        h.credentials.store("t0k".into()).await.unwrap();
        h
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|post| post.title.as_str()).collect()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|post| post.id.as_str()).collect()
    }

    #[tokio::test]
    async fn delete_without_credential_sends_nothing() {
        let h = harness(TestBlogApi::with_posts(vec![sample_post("a")]));
        let err = h
            .service
            .delete_post(&PostId::new("a").unwrap())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(
            err,
            MediaError::Validation(ValidationError::MissingCredential)
        ));
        assert!(h.api.requests().is_empty());

        let err = h
            .service
            .delete_image(&ImageId::new("img").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(h.api.requests().is_empty());
    }

    #[tokio::test]
    async fn listing_twice_costs_one_request() {
        let h = harness(TestBlogApi::with_posts(vec![sample_post("a")]));
        h.service.list_posts().await.unwrap();
        h.service.list_posts().await.unwrap();
        assert_eq!(h.api.count(|r| matches!(r, Request::ListPosts)), 1);
    }

    #[tokio::test]
    async fn delete_refreshes_the_cached_list() {
        let h =
            signed_in(TestBlogApi::with_posts(vec![sample_post("a"), sample_post("b")]))
                .await;
        assert_eq!(ids(&h.service.list_posts().await.unwrap()), ["a", "b"]);

        h.service.delete_post(&PostId::new("a").unwrap()).await.unwrap();

        assert_eq!(ids(&h.service.list_posts().await.unwrap()), ["b"]);
        assert_eq!(
            h.api.requests(),
            vec![
                Request::ListPosts,
                Request::DeletePost(PostId::new("a").unwrap()),
                Request::ListPosts,
            ]
        );
    }

    #[tokio::test]
    async fn update_refreshes_the_cached_list() {
        let h = signed_in(TestBlogApi::with_posts(vec![sample_post("a")])).await;
        let before = h.service.list_posts().await.unwrap();
        assert_ne!(titles(&before), ["Edited"]);

        h.service
            .update_post(
                &PostId::new("a").unwrap(),
                PostPayload::new("Edited", "<p>edited</p>", "Sonch"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(titles(&h.service.list_posts().await.unwrap()), ["Edited"]);
        assert_eq!(h.api.count(|r| matches!(r, Request::ListPosts)), 2);
    }

    #[tokio::test]
    async fn failed_invalidation_fails_the_mutation() {
        let storage = Arc::new(ScriptedStorage::new());
        let h = harness_with(
            TestBlogApi::with_posts(vec![sample_post("a"), sample_post("b")]),
            storage.clone(),
        );
        h.credentials.store("t0k".into()).await.unwrap();
        assert_eq!(ids(&h.service.list_posts().await.unwrap()), ["a", "b"]);

        storage.fail_removes(true);
        let err = h
            .service
            .delete_post(&PostId::new("a").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Storage(_)));
        assert_eq!(h.api.count(|r| matches!(r, Request::DeletePost(_))), 1);
    }

    #[tokio::test]
    async fn create_never_leaves_the_old_snapshot_behind() {
        let h = signed_in(TestBlogApi::with_posts(vec![sample_post("a")])).await;
        h.service.list_posts().await.unwrap();

        let created = h
            .service
            .create_post(PostPayload::new("New", "<p>body</p>", "Sonch"), None)
            .await
            .unwrap();

        let listed = h.service.list_posts().await.unwrap();
        assert!(listed.iter().any(|post| post.id == created.id));
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn banner_is_uploaded_before_the_write() {
        let h = signed_in(TestBlogApi::with_posts(vec![sample_post("a")])).await;
        let id = PostId::new("a").unwrap();

        let updated = h
            .service
            .update_post(
                &id,
                PostPayload::new("Edited", "<p>edited</p>", "Sonch"),
                Some(BannerUpload {
                    file_name: "banner.png".into(),
                    bytes: png(2400, 1000),
                }),
            )
            .await
            .unwrap();

        let requests = h.api.requests();
        let Request::UploadImage {
            file_name,
            content_type,
            ..
        } = &requests[0]
        else {
            panic!("expected upload first, got {requests:?}");
        };
        assert_eq!(file_name, "banner.jpg");
        assert_eq!(content_type, "image/jpeg");

        let Request::UpdatePost(updated_id, payload) = &requests[1] else {
            panic!("expected update second, got {requests:?}");
        };
        assert_eq!(updated_id, &id);
        assert_eq!(payload.banner_id, updated.banner_image_id);
        assert!(updated.banner_image_id.is_some());
    }

    #[tokio::test]
    async fn uploads_are_compressed_before_they_leave() {
        let h = harness(TestBlogApi::new());
        let original = png(2400, 1800);
        let original_len = original.len();
        let stored = h.service.upload_image("photo.png", original).await.unwrap();

        let received = h.api.image(stored.id.as_str()).unwrap();
        assert_eq!(stored.uploaded_bytes, received.len());
        assert_ne!(stored.uploaded_bytes, original_len);
        let decoded = image::load_from_memory(&received).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1067, 800));
    }

    #[tokio::test]
    async fn upload_retries_transient_failures() {
        let h = harness(TestBlogApi::new());
        h.api.fail_next_uploads(2);

        h.service.upload_image("a.png", png(10, 10)).await.unwrap();
        assert_eq!(
            h.api.count(|r| matches!(r, Request::UploadImage { .. })),
            3
        );
    }

    #[tokio::test]
    async fn upload_gives_up_after_three_attempts() {
        let h = harness(TestBlogApi::new());
        h.api.fail_next_uploads(u32::MAX);

        let err = h.service.upload_image("a.png", png(10, 10)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(
            h.api.count(|r| matches!(r, Request::UploadImage { .. })),
            3
        );
    }

    #[tokio::test]
    async fn undecodable_banner_blocks_the_write() {
        let h = signed_in(TestBlogApi::new()).await;
        let err = h
            .service
            .create_post(
                PostPayload::new("t", "c", "a"),
                Some(BannerUpload {
                    file_name: "notes.txt".into(),
                    bytes: b"plain text".to_vec(),
                }),
            )
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(h.api.requests().is_empty());
    }

    #[tokio::test]
    async fn get_post_prefers_the_cached_list() {
        let h = harness(TestBlogApi::with_posts(vec![sample_post("a")]));
        h.service.list_posts().await.unwrap();

        let post = h.service.get_post(&PostId::new("a").unwrap()).await.unwrap();
        assert_eq!(post.id.as_str(), "a");
        assert_eq!(h.api.count(|r| matches!(r, Request::GetPost(_))), 0);

        let missing = h
            .service
            .get_post(&PostId::new("zzz").unwrap())
            .await
            .unwrap_err();
        assert_eq!(missing.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(h.api.count(|r| matches!(r, Request::GetPost(_))), 1);
    }

    #[tokio::test]
    async fn login_and_logout_toggle_the_credential_and_refresh() {
        let h = harness(TestBlogApi::with_posts(vec![sample_post("a")]));
        assert!(!h.service.is_authenticated().await.unwrap());

        h.service.login("me@example.com", "hunter2").await.unwrap();
        assert!(h.service.is_authenticated().await.unwrap());
        assert_eq!(
            h.api.requests(),
            vec![
                Request::Login {
                    email: "me@example.com".into()
                },
                Request::ListPosts,
            ]
        );

        h.service.logout().await.unwrap();
        assert!(!h.service.is_authenticated().await.unwrap());
        assert_eq!(h.api.count(|r| matches!(r, Request::ListPosts)), 2);
    }

    #[tokio::test]
    async fn logout_clears_the_session_storage() {
        let h = signed_in(TestBlogApi::with_posts(vec![sample_post("a")])).await;
        h.storage.set("draft", "unsaved".into()).await.unwrap();

        h.service.logout().await.unwrap();

        assert!(h.storage.get("draft").await.unwrap().is_none());
        assert!(!h.service.is_authenticated().await.unwrap());
        // Repopulated by the anonymous refetch.
        assert_eq!(h.service.cache().get().await.unwrap().unwrap().posts.len(), 1);
    }

    #[tokio::test]
    async fn end_session_wipes_a_disk_session() {
        let dir = tempfile::tempdir().unwrap();
        let storage: SharedStorage =
            Arc::new(DiskStorage::new(dir.path().join("session")));
        let h = harness_with(TestBlogApi::with_posts(vec![sample_post("a")]), storage);
        h.credentials.store("t0k".into()).await.unwrap();
        h.service.list_posts().await.unwrap();

        h.service.end_session().await.unwrap();

        assert!(h.storage.get("token").await.unwrap().is_none());
        assert!(h.service.cache().get().await.unwrap().is_none());
        assert!(h.api.requests().iter().all(|r| matches!(r, Request::ListPosts)));
    }

    #[tokio::test]
    async fn rejected_login_stores_nothing() {
        let api = TestBlogApi::new();
        api.set_login_token(None);
        let h = harness(api);

        let err = h.service.login("me@example.com", "nope").await.unwrap_err();
        assert!(err.is_auth());
        assert!(!h.service.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn refresh_failure_does_not_fail_the_mutation() {
        let h = signed_in(TestBlogApi::with_posts(vec![sample_post("a")])).await;
        h.api.fail_next_lists(u32::MAX);

        h.service.delete_post(&PostId::new("a").unwrap()).await.unwrap();
        assert!(h.service.cache().get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_image_runs_through_the_shared_queue() {
        let h = harness(TestBlogApi::new());
        h.api.put_image("f1", b"bytes".to_vec());
        h.api.fail_next_fetches(1);

        let state = h.service.load_image(Some(&ImageId::new("f1").unwrap())).await;
        assert_eq!(state, LoadState::Loaded(b"bytes".to_vec()));
        assert_eq!(h.api.fetched_urls().len(), 2);

        assert_eq!(h.service.load_image(None).await, LoadState::Missing);
        assert_eq!(h.service.image_url(Some(""), None), None);
    }
}
