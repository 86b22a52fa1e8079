//! Compiled defaults. `MediaConfig` overrides most of these at runtime.

pub mod http {
    use std::time::Duration;

    pub const DEFAULT_API_URL: &str = "https://api-sonch.vercel.app/api";

    /// Per-request timeout. Backoff delays come on top of this.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
}

pub mod retry {
    use std::time::Duration;

    /// Linear backoff unit: the n-th retry waits `n * RETRY_BASE_DELAY`.
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(1_000);
    pub const UPLOAD_MAX_ATTEMPTS: u32 = 3;
    pub const LIST_MAX_ATTEMPTS: u32 = 3;
}

pub mod image {
    use std::time::Duration;

    /// Total fetch attempts for one rendered image, the first load included.
    pub const IMAGE_MAX_LOAD_ATTEMPTS: u32 = 3;
    pub const IMAGE_RETRY_BASE_DELAY: Duration = Duration::from_millis(1_000);
    /// Query parameter carrying the cache-busting retry counter.
    pub const CACHE_BUST_PARAM: &str = "retry";
}

pub mod compression {
    use std::time::Duration;

    pub const MAX_WIDTH: u32 = 1200;
    pub const MAX_HEIGHT: u32 = 800;
    pub const QUALITY: f32 = 0.8;
    pub const DECODE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";
}

pub mod session {
    use std::time::Duration;

    pub const TOKEN_KEY: &str = "token";
    pub const POSTS_KEY: &str = "blogs";
    pub const POSTS_CAPTURED_AT_KEY: &str = "blogs:captured_at";
    /// A post list snapshot older than this is fetched again.
    pub const POSTS_MAX_AGE: Duration = Duration::from_secs(30 * 60);
}
