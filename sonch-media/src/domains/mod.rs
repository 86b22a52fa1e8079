//! Domain modules for the media pipeline
//!
//! `media` owns image bytes on their way out (compression) and back in
//! (queued, retried loads). `blog` owns posts: the list cache and the facade
//! that ties uploads, writes and cache invalidation together.

pub mod blog;
pub mod media;
