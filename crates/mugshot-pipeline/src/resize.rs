//! Resize stage: scale every crop to one fixed output size.
//!
//! Faces come out of the crop stage at whatever size the detector found
//! them. Resizing brings the whole batch to a common size so the later
//! stages (and the circle mask in particular) behave the same for every
//! portrait. Aspect ratio is not preserved.

use image::imageops::FilterType;

use crate::types::{DynamicImage, TargetSize};

/// Resampling filter used for every resize: bicubic (Catmull-Rom).
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Resize `image` to exactly `size`.
#[must_use = "returns the resized image"]
pub fn scale(image: &DynamicImage, size: TargetSize) -> DynamicImage {
    image.resize_exact(size.width(), size.height(), RESIZE_FILTER)
}

/// Resize every image in `images` to exactly `size`, keeping order.
#[must_use = "returns the resized images"]
pub fn scale_all(images: &[DynamicImage], size: TargetSize) -> Vec<DynamicImage> {
    images.iter().map(|image| scale(image, size)).collect()
}
