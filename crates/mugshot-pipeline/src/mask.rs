//! Circular mask: cut the portrait to a disc through its alpha channel.
//!
//! The disc is centered on the image and its radius is half the image
//! **width**, whatever the height. On a portrait-oriented image the disc
//! leaves bands above and below; on a landscape one it is clipped at the
//! top and bottom edges. It is never stretched into an ellipse.
//!
//! This is the last stage in the pipeline (optional), applied after
//! grayscale.

use image::{Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::types::{Dimensions, DynamicImage, GrayImage};

/// Alpha for pixels inside the disc.
const OPAQUE: u8 = u8::MAX;

/// Hard 0/255 disc mask for an image of `dimensions`.
#[must_use = "returns the circle mask"]
#[allow(clippy::cast_possible_wrap)]
pub fn circle_mask(dimensions: Dimensions) -> GrayImage {
    let mut mask = GrayImage::new(dimensions.width, dimensions.height);
    let center = (
        (dimensions.width / 2) as i32,
        (dimensions.height / 2) as i32,
    );
    let radius = (dimensions.width / 2) as i32;
    draw_filled_circle_mut(&mut mask, center, radius, Luma([OPAQUE]));
    mask
}

/// Apply [`circle_mask`] as the alpha channel of `image`.
///
/// Single-channel inputs are expanded to RGB first, and any existing
/// alpha is replaced, so the output is always RGBA.
#[must_use = "returns the masked image"]
pub fn circle(image: &DynamicImage) -> DynamicImage {
    let rgb = image.to_rgb8();
    let mask = circle_mask(Dimensions::new(rgb.width(), rgb.height()));
    let rgba = RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let alpha = if mask.get_pixel(x, y).0[0] > 0 { OPAQUE } else { 0 };
        Rgba([r, g, b, alpha])
    });
    DynamicImage::ImageRgba8(rgba)
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn alpha(image: &DynamicImage, x: u32, y: u32) -> u8 {
        image.to_rgba8().get_pixel(x, y).0[3]
    }

    #[test]
    fn square_center_opaque_corners_clear() {
        let out = circle(&DynamicImage::new_rgb8(100, 100));
        assert_eq!(alpha(&out, 50, 50), 255);
        for (x, y) in [(0, 0), (99, 0), (0, 99), (99, 99), (88, 88)] {
            assert_eq!(alpha(&out, x, y), 0, "({x}, {y})");
        }
        for (x, y) in [(50, 2), (2, 50), (97, 50), (50, 97)] {
            assert_eq!(alpha(&out, x, y), 255, "({x}, {y})");
        }
    }

    #[test]
    fn mask_is_binary() {
        let mask = circle_mask(Dimensions::new(37, 37));
        assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert!(mask.pixels().any(|p| p.0[0] == 255));
        assert!(mask.pixels().any(|p| p.0[0] == 0));
    }

    #[test]
    fn radius_follows_width_on_tall_image() {
        // 40 wide, 100 tall: radius 20 around (20, 50).
        let mask = circle_mask(Dimensions::new(40, 100));
        assert_eq!(mask.get_pixel(20, 50).0[0], 255);
        assert_eq!(mask.get_pixel(20, 5).0[0], 0);
        assert_eq!(mask.get_pixel(20, 95).0[0], 0);
    }

    #[test]
    fn radius_follows_width_on_wide_image() {
        // 100 wide, 40 tall: radius 50 around (50, 20) spans the height.
        let mask = circle_mask(Dimensions::new(100, 40));
        assert_eq!(mask.get_pixel(50, 0).0[0], 255);
        assert_eq!(mask.get_pixel(50, 39).0[0], 255);
        assert_eq!(mask.get_pixel(5, 20).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn gray_input_is_expanded() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([77])));
        let out = circle(&gray);
        assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        assert_eq!(out.to_rgba8().get_pixel(5, 5), &Rgba([77, 77, 77, 255]));
    }

    #[test]
    fn color_is_kept_under_mask() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([1, 2, 3])));
        let out = circle(&rgb).to_rgba8();
        assert_eq!(out.get_pixel(5, 5), &Rgba([1, 2, 3, 255]));
        assert_eq!(out.get_pixel(0, 0), &Rgba([1, 2, 3, 0]));
    }

    #[test]
    fn existing_alpha_is_replaced() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([9, 9, 9, 3])));
        assert_eq!(alpha(&circle(&rgba), 5, 5), 255);
    }
}
