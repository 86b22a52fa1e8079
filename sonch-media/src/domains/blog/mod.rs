pub mod post_cache;
pub mod service;

pub use post_cache::{CacheEntry, PostListCache};
pub use service::{BannerUpload, MediaService, ServicePolicies};
