//! Core data model definitions shared across sonch crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod auth;
pub mod error;
pub mod ids;
pub mod image;
pub mod post;
pub mod prelude;

// Intentionally curated re-exports for downstream consumers.
pub use auth::{LoginRequest, LoginResponse};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{ImageId, PostId};
pub use image::{
    ImageBounds, ImageDimensions, ImageDimensionsError, StoredImage,
    UploadResponse,
};
pub use post::{Post, PostPayload};
