//! Sonch media pipeline
//!
//! Client-side plumbing behind the blog: images are compressed before upload,
//! rendered images load through a single-file queue with bounded retries, and
//! the post list is cached for the session and dropped on every write.
//!
//! Notes
//! - [`MediaService`] is the entry point; the other modules are public for
//!   the integration tests and the `sonch-media` binary.
//! - Nothing here outlives the session directory it is pointed at.

pub mod domains;
pub mod error;
pub mod infra;

pub use domains::blog::{BannerUpload, MediaService, ServicePolicies};
pub use domains::media::{ImageLoadQueue, LoadState};
pub use error::{ErrorKind, MediaError, Result, ValidationError};
pub use infra::config::MediaConfig;
