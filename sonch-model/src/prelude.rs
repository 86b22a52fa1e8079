pub use crate::auth::{LoginRequest, LoginResponse};
pub use crate::ids::{ImageId, PostId};
pub use crate::image::{ImageBounds, ImageDimensions, StoredImage};
pub use crate::post::{Post, PostPayload};
