//! Rotate stage: turn the portrait about its center.
//!
//! Wraps [`imageproc::geometric_transformations::rotate_about_center`].
//! The canvas keeps its size, so corners uncovered by the rotation are
//! filled with black (and fully transparent black for images with alpha).

use image::{ImageBuffer, Luma, Pixel, Rgb, Rgba};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

use crate::types::DynamicImage;

/// Rotate `image` counter-clockwise by `degrees` about `(w/2, h/2)`
/// using bicubic interpolation.
///
/// Luminance, RGB and RGBA images keep their channel layout; any other
/// layout is rotated as RGBA.
#[must_use = "returns the rotated image"]
pub fn rotate(image: &DynamicImage, degrees: f32) -> DynamicImage {
    // imageproc turns clockwise for positive angles.
    let theta = -degrees.to_radians();
    match image {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(turn(gray, theta, Luma([0]))),
        DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(turn(rgb, theta, Rgb([0, 0, 0]))),
        DynamicImage::ImageRgba8(rgba) => {
            DynamicImage::ImageRgba8(turn(rgba, theta, Rgba([0, 0, 0, 0])))
        }
        other => DynamicImage::ImageRgba8(turn(&other.to_rgba8(), theta, Rgba([0, 0, 0, 0]))),
    }
}

fn turn<P>(image: &ImageBuffer<P, Vec<u8>>, theta: f32, fill: P) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    rotate_about_center(image, theta, Interpolation::Bicubic, fill)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GenericImageView, GrayImage, RgbImage, RgbaImage};

    use super::*;

    /// A smooth 40x40 gradient; bicubic resampling of a near-identity
    /// transform stays within a couple of levels of the source.
    fn gradient() -> RgbImage {
        RgbImage::from_fn(40, 40, |x, y| {
            Rgb([
                u8::try_from(x * 5).unwrap(),
                u8::try_from(y * 5).unwrap(),
                u8::try_from((x + y) * 2).unwrap(),
            ])
        })
    }

    /// Largest per-channel difference over the interior, ignoring a
    /// border where resampling reaches the fill color.
    fn interior_difference(a: &RgbImage, b: &RgbImage, border: u32) -> u8 {
        let mut worst = 0;
        for y in border..a.height() - border {
            for x in border..a.width() - border {
                let (pa, pb) = (a.get_pixel(x, y), b.get_pixel(x, y));
                for c in 0..3 {
                    worst = worst.max(pa.0[c].abs_diff(pb.0[c]));
                }
            }
        }
        worst
    }

    #[test]
    fn zero_degrees_is_identity() {
        let source = gradient();
        let rotated = rotate(&DynamicImage::ImageRgb8(source.clone()), 0.0).to_rgb8();
        assert!(interior_difference(&source, &rotated, 4) <= 2);
    }

    #[test]
    fn full_turn_is_identity() {
        let source = gradient();
        let rotated = rotate(&DynamicImage::ImageRgb8(source.clone()), 360.0).to_rgb8();
        assert!(interior_difference(&source, &rotated, 4) <= 2);
    }

    #[test]
    fn positive_angle_turns_counter_clockwise() {
        // Right half white: a quarter turn counter-clockwise moves it to
        // the top half.
        let source = GrayImage::from_fn(20, 20, |x, _| Luma([if x >= 10 { 255 } else { 0 }]));
        let rotated = rotate(&DynamicImage::ImageLuma8(source), 90.0).to_luma8();
        assert!(rotated.get_pixel(10, 5).0[0] > 200);
        assert!(rotated.get_pixel(10, 14).0[0] < 50);
    }

    #[test]
    fn exposed_corners_are_black() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([255, 255, 255])));
        let rotated = rotate(&white, 45.0).to_rgb8();
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rotated.get_pixel(19, 19), &Rgb([0, 0, 0]));
        assert!(rotated.get_pixel(10, 10).0.iter().all(|&c| c > 250));
    }

    #[test]
    fn exposed_corners_are_transparent_with_alpha() {
        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba([9, 9, 9, 255])));
        let rotated = rotate(&opaque, 30.0).to_rgba8();
        assert_eq!(rotated.get_pixel(0, 0).0[3], 0);
        assert!(rotated.get_pixel(10, 10).0[3] > 250);
    }

    #[test]
    fn canvas_size_and_layout_are_kept() {
        let gray = DynamicImage::new_luma8(31, 17);
        let rotated = rotate(&gray, 12.5);
        assert_eq!(rotated.dimensions(), (31, 17));
        assert!(matches!(rotated, DynamicImage::ImageLuma8(_)));

        let rgb = DynamicImage::new_rgb8(8, 8);
        assert!(matches!(rotate(&rgb, -30.0), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn other_layouts_rotate_as_rgba() {
        let wide = DynamicImage::new_rgb16(8, 8);
        assert!(matches!(rotate(&wide, 10.0), DynamicImage::ImageRgba8(_)));
    }
}
