pub mod compressor;
pub mod image_loader;
pub mod image_queue;

pub use compressor::{CompressedImage, CompressionSettings, compress};
pub use image_loader::{ImageLoader, LoadState};
pub use image_queue::{ImageLoadQueue, QueueState, QueuedTask};
