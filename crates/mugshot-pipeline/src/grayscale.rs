//! Grayscale stage: drop color, keep luminance.
//!
//! Uses the `image` crate's weighted luminance conversion, so green
//! contributes the most and blue the least. The output is always a
//! single-channel image; any alpha channel is discarded.

use crate::types::DynamicImage;

/// Convert `image` to single-channel luminance.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(image.to_luma8())
}
