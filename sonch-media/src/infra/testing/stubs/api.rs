use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::StatusCode;
use sonch_model::{
    ImageId, LoginRequest, LoginResponse, Post, PostId, PostPayload,
};
use url::Url;

use crate::error::{MediaError, Result};
use crate::infra::api_types::UploadFile;
use crate::infra::constants::image::CACHE_BUST_PARAM;
use crate::infra::services::{BlogApi, ImageSource};

const STUB_BASE_URL: &str = "http://stub.invalid/api";
pub const STUB_TOKEN: &str = "stub-token";

/// One call observed by the stub, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login { email: String },
    ListPosts,
    GetPost(PostId),
    CreatePost(PostPayload),
    UpdatePost(PostId, PostPayload),
    DeletePost(PostId),
    UploadImage { file_name: String, content_type: String, len: usize },
    DeleteImage(ImageId),
    FetchImage(Url),
}

#[derive(Debug, Clone)]
pub struct TestBlogApi {
    inner: Arc<Mutex<InnerApiState>>,
}

#[derive(Debug, Default)]
struct InnerApiState {
    posts: Vec<Post>,
    images: HashMap<String, Vec<u8>>,
    requests: Vec<Request>,
    login_token: Option<String>,
    next_id: u64,
    fetch_failures: u32,
    list_failures: u32,
    upload_failures: u32,
    fetch_delay: Duration,
    list_delay: Duration,
    fetches_in_flight: usize,
    max_fetches_in_flight: usize,
}

impl Default for TestBlogApi {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBlogApi {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(InnerApiState {
                login_token: Some(STUB_TOKEN.to_string()),
                ..InnerApiState::default()
            })),
        }
    }

    pub fn with_posts(posts: Vec<Post>) -> Self {
        let api = Self::new();
        api.inner.lock().posts = posts;
        api
    }

    pub fn push_post(&self, post: Post) {
        self.inner.lock().posts.push(post);
    }

    pub fn posts(&self) -> Vec<Post> {
        self.inner.lock().posts.clone()
    }

    pub fn put_image(&self, id: &str, bytes: Vec<u8>) {
        self.inner.lock().images.insert(id.to_string(), bytes);
    }

    pub fn image(&self, id: &str) -> Option<Vec<u8>> {
        self.inner.lock().images.get(id).cloned()
    }

    /// `None` makes every login answer 401.
    pub fn set_login_token(&self, token: Option<String>) {
        self.inner.lock().login_token = token;
    }

    /// `u32::MAX` fails forever.
    pub fn fail_next_fetches(&self, n: u32) {
        self.inner.lock().fetch_failures = n;
    }

    pub fn fail_next_lists(&self, n: u32) {
        self.inner.lock().list_failures = n;
    }

    pub fn fail_next_uploads(&self, n: u32) {
        self.inner.lock().upload_failures = n;
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        self.inner.lock().fetch_delay = delay;
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.inner.lock().list_delay = delay;
    }

    pub fn requests(&self) -> Vec<Request> {
        self.inner.lock().requests.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Request) -> bool) -> usize {
        self.inner.lock().requests.iter().filter(|r| predicate(r)).count()
    }

    pub fn fetched_urls(&self) -> Vec<Url> {
        self.inner
            .lock()
            .requests
            .iter()
            .filter_map(|r| match r {
                Request::FetchImage(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.inner.lock().max_fetches_in_flight
    }

    fn record(&self, request: Request) {
        self.inner.lock().requests.push(request);
    }
}

fn take_failure(remaining: &mut u32) -> bool {
    match *remaining {
        0 => false,
        u32::MAX => true,
        _ => {
            *remaining -= 1;
            true
        }
    }
}

fn unavailable() -> MediaError {
    MediaError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "stub unavailable".into(),
    }
}

fn not_found(what: &str) -> MediaError {
    MediaError::Status {
        status: StatusCode::NOT_FOUND,
        body: format!("{what} not found"),
    }
}

/// Fixed-timestamp post for fixtures.
pub fn sample_post(id: &str) -> Post {
    Post {
        id: PostId::new(id).expect("sample post id"),
        title: format!("Post {id}"),
        content: format!("<p>{id}</p>"),
        banner_image_id: None,
        author: "Sonch".into(),
        created_at: DateTime::<Utc>::from_timestamp(1_709_287_200, 0)
            .unwrap_or_default(),
    }
}

#[async_trait]
impl BlogApi for TestBlogApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.record(Request::Login {
            email: request.email.clone(),
        });
        match self.inner.lock().login_token.clone() {
            Some(token) => Ok(LoginResponse { token: Some(token) }),
            None => Err(MediaError::Auth {
                status: StatusCode::UNAUTHORIZED,
            }),
        }
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        self.record(Request::ListPosts);
        let (snapshot, delay) = {
            let mut state = self.inner.lock();
            if take_failure(&mut state.list_failures) {
                return Err(unavailable());
            }
            (state.posts.clone(), state.list_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn get_post(&self, id: &PostId) -> Result<Post> {
        self.record(Request::GetPost(id.clone()));
        self.inner
            .lock()
            .posts
            .iter()
            .find(|post| &post.id == id)
            .cloned()
            .ok_or_else(|| not_found("post"))
    }

    async fn create_post(&self, payload: &PostPayload) -> Result<Post> {
        self.record(Request::CreatePost(payload.clone()));
        let mut state = self.inner.lock();
        state.next_id += 1;
        let post = Post {
            id: PostId::new(format!("post-{}", state.next_id))?,
            title: payload.title.clone(),
            content: payload.content.clone(),
            banner_image_id: payload.banner_id.clone(),
            author: payload.author.clone(),
            created_at: Utc::now(),
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(
        &self,
        id: &PostId,
        payload: &PostPayload,
    ) -> Result<Post> {
        self.record(Request::UpdatePost(id.clone(), payload.clone()));
        let mut state = self.inner.lock();
        let post = state
            .posts
            .iter_mut()
            .find(|post| &post.id == id)
            .ok_or_else(|| not_found("post"))?;
        post.title = payload.title.clone();
        post.content = payload.content.clone();
        post.author = payload.author.clone();
        if payload.banner_id.is_some() {
            post.banner_image_id = payload.banner_id.clone();
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        self.record(Request::DeletePost(id.clone()));
        let mut state = self.inner.lock();
        let before = state.posts.len();
        state.posts.retain(|post| &post.id != id);
        if state.posts.len() == before {
            return Err(not_found("post"));
        }
        Ok(())
    }

    async fn upload_image(&self, file: &UploadFile) -> Result<ImageId> {
        self.record(Request::UploadImage {
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            len: file.bytes.len(),
        });
        let mut state = self.inner.lock();
        if take_failure(&mut state.upload_failures) {
            return Err(unavailable());
        }
        state.next_id += 1;
        let id = format!("img-{}", state.next_id);
        state.images.insert(id.clone(), file.bytes.clone());
        Ok(ImageId::new(id)?)
    }

    async fn delete_image(&self, id: &ImageId) -> Result<()> {
        self.record(Request::DeleteImage(id.clone()));
        self.inner
            .lock()
            .images
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found("image"))
    }
}

#[async_trait]
impl ImageSource for TestBlogApi {
    fn image_url(&self, id: Option<&str>, version: Option<u32>) -> Option<Url> {
        let id = id.map(str::trim).filter(|id| !id.is_empty())?;
        let mut url = Url::parse(STUB_BASE_URL).ok()?;
        url.path_segments_mut().ok()?.extend(["images", id]);
        if let Some(version) = version {
            url.query_pairs_mut()
                .append_pair(CACHE_BUST_PARAM, &version.to_string());
        }
        Some(url)
    }

    async fn fetch_image(&self, url: Url) -> Result<Vec<u8>> {
        let delay = {
            let mut state = self.inner.lock();
            state.requests.push(Request::FetchImage(url.clone()));
            state.fetches_in_flight += 1;
            state.max_fetches_in_flight =
                state.max_fetches_in_flight.max(state.fetches_in_flight);
            state.fetch_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.lock();
        state.fetches_in_flight -= 1;
        if take_failure(&mut state.fetch_failures) {
            return Err(MediaError::Transport("connection reset by stub".into()));
        }
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|id| state.images.get(id).cloned())
            .ok_or_else(|| not_found("image"))
    }
}
