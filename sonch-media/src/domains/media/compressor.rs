//! Client-side compression for outgoing images
//!
//! Every upload is decoded, shrunk to fit the configured bounds and
//! re-encoded as JPEG before it leaves the machine, even when it already
//! fits. Decoding runs on the blocking pool under a deadline so a payload the
//! decoder chokes on fails with a decode error instead of stalling the upload.

use std::io::Cursor;
use std::time::Duration;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use log::debug;
use sonch_model::{ImageBounds, ImageDimensions};

use crate::error::{MediaError, Result, ValidationError};
use crate::infra::config::MediaConfig;
use crate::infra::constants::compression::OUTPUT_CONTENT_TYPE;

/// Bounds, quality and decode deadline for one compression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    bounds: ImageBounds,
    quality: f32,
    decode_timeout: Duration,
}

impl CompressionSettings {
    /// `quality` must lie in `(0, 1]`.
    pub fn new(
        max_width: u32,
        max_height: u32,
        quality: f32,
        decode_timeout: Duration,
    ) -> Result<Self> {
        let bounds = ImageBounds::new(max_width, max_height)
            .map_err(|e| ValidationError::InvalidSettings(e.to_string()))?;
        if !(quality > 0.0 && quality <= 1.0) {
            return Err(ValidationError::InvalidSettings(format!(
                "quality must be in (0, 1], got {quality}"
            ))
            .into());
        }
        Ok(Self {
            bounds,
            quality,
            decode_timeout,
        })
    }

    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        Self::new(
            config.compression.max_width,
            config.compression.max_height,
            config.compression.quality,
            config.decode_timeout(),
        )
    }

    pub fn bounds(&self) -> ImageBounds {
        self.bounds
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn decode_timeout(&self) -> Duration {
        self.decode_timeout
    }

    /// Encoder quality on the JPEG 1..=100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Re-encoded image ready for upload.
#[derive(Clone)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub original: ImageDimensions,
    pub dimensions: ImageDimensions,
}

impl std::fmt::Debug for CompressedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedImage")
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("original", &self.original.as_u32_tuple())
            .field("dimensions", &self.dimensions.as_u32_tuple())
            .finish()
    }
}

/// Compress on the blocking pool, bounded by the decode deadline.
pub async fn compress(
    data: Vec<u8>,
    settings: CompressionSettings,
) -> Result<CompressedImage> {
    let work = tokio::task::spawn_blocking(move || compress_sync(&data, settings));

    match tokio::time::timeout(settings.decode_timeout, work).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => {
            Err(ValidationError::Decode(format!("decoder aborted: {join}")).into())
        }
        Err(_) => {
            Err(ValidationError::DecodeTimeout(settings.decode_timeout).into())
        }
    }
}

pub fn compress_sync(
    data: &[u8],
    settings: CompressionSettings,
) -> Result<CompressedImage> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| ValidationError::Decode(e.to_string()))?;

    let original = ImageDimensions::try_from((decoded.width(), decoded.height()))
        .map_err(|e| ValidationError::Decode(e.to_string()))?;
    let target = original.fit_within(settings.bounds);

    let resized = if target == original {
        decoded
    } else {
        decoded.resize_exact(
            target.width_u32(),
            target.height_u32(),
            FilterType::Triangle,
        )
    };

    let bytes = encode_jpeg(&resized, settings.jpeg_quality())?;

    debug!(
        "Compressed {}x{} ({} bytes) -> {}x{} ({} bytes) at q{}",
        original.width_u32(),
        original.height_u32(),
        data.len(),
        target.width_u32(),
        target.height_u32(),
        bytes.len(),
        settings.jpeg_quality()
    );

    Ok(CompressedImage {
        bytes,
        content_type: OUTPUT_CONTENT_TYPE,
        original,
        dimensions: target,
    })
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| MediaError::Processing(format!("JPEG encode failed: {e}")))?;
    Ok(buf.into_inner())
}
