//! In-memory backend for exercising the pipeline without a server.
//!
//! Compiled for unit tests and behind the `testing` feature.

pub mod stubs;

pub use stubs::api::{Request, TestBlogApi, sample_post};
pub use stubs::storage::ScriptedStorage;
