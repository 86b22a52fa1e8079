//! Backend seams
//!
//! `ApiClient` is the production implementation of both traits; the testing
//! stub implements them in memory so the facade, cache and loader can be
//! exercised without a server.

use std::fmt;

use async_trait::async_trait;
use sonch_model::{ImageId, LoginRequest, LoginResponse, Post, PostId, PostPayload};
use url::Url;

use crate::error::Result;
use crate::infra::api_types::UploadFile;

/// The blog backend's REST contract.
#[async_trait]
pub trait BlogApi: Send + Sync + fmt::Debug {
    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse>;

    /// `GET /blogs`
    async fn list_posts(&self) -> Result<Vec<Post>>;

    /// `GET /blogs/:id`
    async fn get_post(&self, id: &PostId) -> Result<Post>;

    /// `POST /blogs`
    async fn create_post(&self, payload: &PostPayload) -> Result<Post>;

    /// `PUT /blogs/:id`
    async fn update_post(
        &self,
        id: &PostId,
        payload: &PostPayload,
    ) -> Result<Post>;

    /// `DELETE /blogs/:id`
    async fn delete_post(&self, id: &PostId) -> Result<()>;

    /// `POST /upload` as multipart field `file`
    async fn upload_image(&self, file: &UploadFile) -> Result<ImageId>;

    /// `DELETE /images/:fileId`
    async fn delete_image(&self, id: &ImageId) -> Result<()>;
}

/// Where rendered images come from.
#[async_trait]
pub trait ImageSource: Send + Sync + fmt::Debug {
    /// Pure mapping from an image id to a fetchable URL. `version` becomes
    /// the cache-busting query parameter. Missing or blank ids map to `None`.
    fn image_url(&self, id: Option<&str>, version: Option<u32>) -> Option<Url>;

    /// `GET /images/:fileId`
    async fn fetch_image(&self, url: Url) -> Result<Vec<u8>>;
}
