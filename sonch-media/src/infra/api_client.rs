use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use sonch_model::{
    ImageId, LoginRequest, LoginResponse, Post, PostId, PostPayload,
    UploadResponse,
};
use url::Url;

use crate::domains::blog::post_cache::PostListCache;
use crate::error::{MediaError, Result};
use crate::infra::api_types::UploadFile;
use crate::infra::config::MediaConfig;
use crate::infra::constants::image::CACHE_BUST_PARAM;
use crate::infra::services::{BlogApi, ImageSource};
use crate::infra::session::CredentialStore;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Multipart,
}

/// API client with bearer authentication and auth-failure eviction
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credentials: CredentialStore,
    post_cache: PostListCache,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client
    ///
    /// The credential store and post cache must be the ones the rest of the
    /// session uses: a 401/403 from any request evicts both.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: CredentialStore,
        post_cache: PostListCache,
    ) -> Result<Self> {
        let base_url = Url::parse(&normalize_base_url(base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(MediaError::Config(format!(
                "API URL cannot carry paths: {base_url}"
            )));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            MediaError::Config(format!("failed to create HTTP client: {e}"))
        })?;

        info!(
            "[ApiClient] Creating API client with base URL: {} (timeout {:?})",
            base_url, timeout
        );

        Ok(Self {
            client,
            base_url,
            credentials,
            post_cache,
        })
    }

    pub fn from_config(
        config: &MediaConfig,
        credentials: CredentialStore,
        post_cache: PostListCache,
    ) -> Result<Self> {
        Self::new(
            &config.api_url,
            config.request_timeout(),
            credentials,
            post_cache,
        )
    }

    /// Build an endpoint URL below the base, one path segment per item.
    /// Segments are percent-encoded, so ids cannot escape their slot.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                MediaError::Config(format!(
                    "API URL cannot carry paths: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build a request with authentication headers
    async fn request(
        &self,
        method: Method,
        url: Url,
        body: BodyKind,
    ) -> Result<RequestBuilder> {
        let mut builder = self.client.request(method, url);
        if body == BodyKind::Json {
            builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        }
        if let Some(token) = self.credentials.token().await? {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    /// Send a request and classify the response status
    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                warn!(
                    "[ApiClient] {} from {}, evicting credential and cached posts",
                    status,
                    response.url()
                );
                self.evict_session().await;
                Err(MediaError::Auth { status })
            }
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(MediaError::Status { status, body })
            }
        }
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MediaError::Body(format!(
                "{e}: {}",
                String::from_utf8_lossy(&bytes[..bytes.len().min(200)])
            ))
        })
    }

    /// Eviction is global: later requests go out without a credential.
    /// In-flight requests are left alone.
    async fn evict_session(&self) {
        if let Err(e) = self.credentials.evict().await {
            warn!("[ApiClient] Failed to evict credential: {}", e);
        }
        if let Err(e) = self.post_cache.invalidate().await {
            warn!("[ApiClient] Failed to invalidate post cache: {}", e);
        }
    }
}

/// Normalize the provided base URL so we don't trip over missing schemes.
/// "localhost:3000/api" becomes "http://localhost:3000/api"; a trailing
/// slash is trimmed to prevent double slashes.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let normalized =
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
    if normalized != raw {
        debug!(
            "[ApiClient] Normalized base URL from '{}' to '{}'",
            raw, normalized
        );
    }
    normalized
}

#[async_trait]
impl BlogApi for ApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let url = self.endpoint(&["auth", "login"])?;
        let builder = self.request(Method::POST, url, BodyKind::Json).await?;
        self.execute_json(builder.json(request)).await
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let url = self.endpoint(&["blogs"])?;
        let builder = self.request(Method::GET, url, BodyKind::Json).await?;
        self.execute_json(builder).await
    }

    async fn get_post(&self, id: &PostId) -> Result<Post> {
        let url = self.endpoint(&["blogs", id.as_str()])?;
        let builder = self.request(Method::GET, url, BodyKind::Json).await?;
        self.execute_json(builder).await
    }

    async fn create_post(&self, payload: &PostPayload) -> Result<Post> {
        let url = self.endpoint(&["blogs"])?;
        let builder = self.request(Method::POST, url, BodyKind::Json).await?;
        self.execute_json(builder.json(payload)).await
    }

    async fn update_post(
        &self,
        id: &PostId,
        payload: &PostPayload,
    ) -> Result<Post> {
        let url = self.endpoint(&["blogs", id.as_str()])?;
        let builder = self.request(Method::PUT, url, BodyKind::Json).await?;
        self.execute_json(builder.json(payload)).await
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        let url = self.endpoint(&["blogs", id.as_str()])?;
        let builder = self.request(Method::DELETE, url, BodyKind::Json).await?;
        self.execute(builder).await.map(|_| ())
    }

    async fn upload_image(&self, file: &UploadFile) -> Result<ImageId> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| MediaError::Processing(e.to_string()))?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&["upload"])?;
        let builder =
            self.request(Method::POST, url, BodyKind::Multipart).await?;
        let response: UploadResponse =
            self.execute_json(builder.multipart(form)).await?;
        Ok(response.file_id)
    }

    async fn delete_image(&self, id: &ImageId) -> Result<()> {
        let url = self.endpoint(&["images", id.as_str()])?;
        let builder = self.request(Method::DELETE, url, BodyKind::Json).await?;
        self.execute(builder).await.map(|_| ())
    }
}

#[async_trait]
impl ImageSource for ApiClient {
    fn image_url(&self, id: Option<&str>, version: Option<u32>) -> Option<Url> {
        let id = id.map(str::trim).filter(|id| !id.is_empty())?;
        let mut url = self.endpoint(&["images", id]).ok()?;
        if let Some(version) = version {
            url.query_pairs_mut()
                .append_pair(CACHE_BUST_PARAM, &version.to_string());
        }
        Some(url)
    }

    async fn fetch_image(&self, url: Url) -> Result<Vec<u8>> {
        let builder = self.request(Method::GET, url, BodyKind::Json).await?;
        let response = self.execute(builder).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
