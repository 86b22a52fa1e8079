use std::num::NonZeroU32;

use crate::error::ModelError;

/// Non-zero pixel dimensions for a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageDimensions {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDimensionsError {
    ZeroWidth,
    ZeroHeight,
}

impl std::fmt::Display for ImageDimensionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroWidth => f.write_str("image width is zero"),
            Self::ZeroHeight => f.write_str("image height is zero"),
        }
    }
}

impl std::error::Error for ImageDimensionsError {}

impl ImageDimensions {
    pub const fn new(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self { width, height }
    }

    pub const fn width_u32(self) -> u32 {
        self.width.get()
    }

    pub const fn height_u32(self) -> u32 {
        self.height.get()
    }

    pub const fn as_u32_tuple(self) -> (u32, u32) {
        (self.width.get(), self.height.get())
    }

    pub fn exceeds(self, bounds: ImageBounds) -> bool {
        self.width > bounds.max_width || self.height > bounds.max_height
    }

    /// Shrink to fit `bounds`, preserving aspect ratio.
    ///
    /// Scaling happens in two passes: width first, then the height that
    /// results from it is clamped. A single `min(w_ratio, h_ratio)` scale can
    /// land on a different pixel when both sides overflow by different
    /// ratios, so the order matters. Images already inside the bounds are
    /// returned unchanged; nothing is ever enlarged.
    pub fn fit_within(self, bounds: ImageBounds) -> ImageDimensions {
        let max_w = f64::from(bounds.max_width.get());
        let max_h = f64::from(bounds.max_height.get());
        let mut width = f64::from(self.width.get());
        let mut height = f64::from(self.height.get());

        if width > max_w {
            height *= max_w / width;
            width = max_w;
        }

        if height > max_h {
            width *= max_h / height;
            height = max_h;
        }

        ImageDimensions {
            width: round_to_pixel(width),
            height: round_to_pixel(height),
        }
    }
}

fn round_to_pixel(value: f64) -> NonZeroU32 {
    let rounded = value.round().clamp(1.0, f64::from(u32::MAX)) as u32;
    NonZeroU32::new(rounded).unwrap_or(NonZeroU32::MIN)
}

impl TryFrom<(u32, u32)> for ImageDimensions {
    type Error = ImageDimensionsError;

    fn try_from(value: (u32, u32)) -> Result<Self, Self::Error> {
        let (width, height) = value;
        let width =
            NonZeroU32::new(width).ok_or(ImageDimensionsError::ZeroWidth)?;
        let height =
            NonZeroU32::new(height).ok_or(ImageDimensionsError::ZeroHeight)?;
        Ok(Self { width, height })
    }
}

/// Upper bounds for an outgoing image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageBounds {
    pub max_width: NonZeroU32,
    pub max_height: NonZeroU32,
}

impl ImageBounds {
    pub fn new(max_width: u32, max_height: u32) -> Result<Self, ModelError> {
        let max_width = NonZeroU32::new(max_width).ok_or_else(|| {
            ModelError::InvalidBounds("max width must be non-zero".into())
        })?;
        let max_height = NonZeroU32::new(max_height).ok_or_else(|| {
            ModelError::InvalidBounds("max height must be non-zero".into())
        })?;
        Ok(Self {
            max_width,
            max_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dims(w: u32, h: u32) -> ImageDimensions {
        ImageDimensions::try_from((w, h)).unwrap()
    }

    fn bounds(w: u32, h: u32) -> ImageBounds {
        ImageBounds::new(w, h).unwrap()
    }

    #[test]
    fn landscape_photo_is_clamped_by_height_after_width_pass() {
        let out = dims(4000, 3000).fit_within(bounds(1200, 800));
        assert_eq!(out.as_u32_tuple(), (1067, 800));
    }

    #[test]
    fn width_pass_alone_when_height_fits() {
        let out = dims(2400, 1000).fit_within(bounds(1200, 800));
        assert_eq!(out.as_u32_tuple(), (1200, 500));
    }

    #[test]
    fn tall_image_only_hits_height_clamp() {
        let out = dims(600, 1600).fit_within(bounds(1200, 800));
        assert_eq!(out.as_u32_tuple(), (300, 800));
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let out = dims(640, 480).fit_within(bounds(1200, 800));
        assert_eq!(out.as_u32_tuple(), (640, 480));
        assert!(!dims(640, 480).exceeds(bounds(1200, 800)));
    }

    #[test]
    fn extreme_strip_keeps_one_pixel() {
        let out = dims(20_000, 1).fit_within(bounds(1200, 800));
        assert_eq!(out.as_u32_tuple(), (1200, 1));
    }

    #[test]
    fn zero_bounds_are_rejected() {
        assert!(ImageBounds::new(0, 800).is_err());
        assert!(ImageBounds::new(1200, 0).is_err());
        assert_eq!(
            ImageDimensions::try_from((0, 10)),
            Err(ImageDimensionsError::ZeroWidth)
        );
    }

    proptest! {
        #[test]
        fn fitted_output_stays_in_bounds_and_keeps_ratio(
            w in 1u32..12_000,
            h in 1u32..12_000,
            max_w in 64u32..4_096,
            max_h in 64u32..4_096,
        ) {
            let ratio = f64::from(w) / f64::from(h);
            prop_assume!((1.0 / 50.0..=50.0).contains(&ratio));
            let source = dims(w, h);
            let limit = bounds(max_w, max_h);
            prop_assume!(source.exceeds(limit));

            let out = source.fit_within(limit);
            prop_assert!(out.width_u32() <= max_w);
            prop_assert!(out.height_u32() <= max_h);

            let expected_w = f64::from(out.height_u32()) * ratio;
            let tolerance = 0.5 + 0.5 * ratio + 1e-9;
            prop_assert!(
                (f64::from(out.width_u32()) - expected_w).abs() <= tolerance,
                "{}x{} -> {}x{}", w, h, out.width_u32(), out.height_u32()
            );
        }
    }
}
