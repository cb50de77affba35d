//! Crop stage: cut the padded face region out of the source image.

use serde::{Deserialize, Serialize};

use crate::detect::{FaceLocator, find_face};
use crate::geometry::pad_roi;
use crate::types::{Dimensions, DynamicImage, Roi};

/// Where the crop stage cut, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    /// Face box as reported by the locator.
    pub face: Roi,
    /// Face box after padding, before intersecting with the image.
    pub padded: Roi,
    /// Region actually cut out of the image.
    pub cropped: Roi,
}

/// Cut `roi` out of `image`.
///
/// The region is first intersected with the image bounds, so a box that
/// runs past the right or bottom edge yields a smaller crop instead of an
/// error. For a region already inside the image the output is exactly
/// `roi.width x roi.height`.
#[must_use = "returns the cropped image"]
pub fn crop_to_roi(image: &DynamicImage, roi: Roi) -> DynamicImage {
    let r = roi.clamp_to(Dimensions::of(image));
    image.crop_imm(r.x, r.y, r.width, r.height)
}

/// Locate a face, pad it by `padding` pixels, and crop.
///
/// Returns `None` when the locator finds no face.
#[must_use]
pub fn crop_to_face<L: FaceLocator + ?Sized>(
    locator: &L,
    image: &DynamicImage,
    padding: u32,
) -> Option<(DynamicImage, CropRegion)> {
    let face = find_face(locator, image)?;
    let bounds = Dimensions::of(image);
    let padded = pad_roi(face, padding, bounds);
    let region = CropRegion {
        face,
        padded,
        cropped: padded.clamp_to(bounds),
    };
    Some((crop_to_roi(image, padded), region))
}
