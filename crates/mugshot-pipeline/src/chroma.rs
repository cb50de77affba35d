//! Chroma-key stage: swap greenscreen pixels for a background image.
//!
//! Pixels are classified in 8-bit HSV, the layout common image tooling
//! uses: hue in half-degrees (`0..=180`), saturation and value in
//! `0..=255`. A pixel is green when its hue lies in [`GREEN_HUE`]
//! (centered on 60, i.e. 120 degrees) and it is saturated and bright
//! enough to be screen rather than shadow.
//!
//! The mask is hard: each output pixel comes entirely from either the
//! background or the foreground, with no feathering.

use std::ops::RangeInclusive;

use image::{Luma, Rgb};

use crate::types::{Background, Dimensions, DynamicImage, GrayImage, PipelineError, RgbImage};

/// Hue window, in half-degrees, counted as green.
pub const GREEN_HUE: RangeInclusive<u8> = 50..=70;

/// Minimum saturation for a green pixel.
pub const MIN_SATURATION: u8 = 60;

/// Minimum value (brightness) for a green pixel.
pub const MIN_VALUE: u8 = 60;

/// Convert an RGB pixel to 8-bit `[hue, saturation, value]`.
///
/// Hue is in half-degrees so it fits a byte. Greys (including black and
/// white) have hue and saturation 0.
#[must_use]
pub fn hsv(Rgb([r, g, b]): Rgb<u8>) -> [u8; 3] {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let v = r.max(g).max(b);
    let diff = v - r.min(g).min(b);

    let s = if v == 0 { 0 } else { (diff * 255 + v / 2) / v };
    let h = if diff == 0 {
        0
    } else {
        let sector = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        // 30 half-degrees per sector unit, rounded half up.
        let h = (60 * sector + diff).div_euclid(2 * diff);
        if h < 0 { h + 180 } else { h }
    };

    [byte(h), byte(s), byte(v)]
}

fn byte(value: i32) -> u8 {
    u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX)
}

/// Whether a pixel belongs to the greenscreen.
#[must_use]
pub fn is_green(pixel: Rgb<u8>) -> bool {
    let [h, s, v] = hsv(pixel);
    GREEN_HUE.contains(&h) && s >= MIN_SATURATION && v >= MIN_VALUE
}

/// Binary greenscreen mask: 255 where [`is_green`], 0 elsewhere.
#[must_use = "returns the greenscreen mask"]
pub fn green_mask(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if is_green(*image.get_pixel(x, y)) { 255 } else { 0 }])
    })
}

/// Replace every greenscreen pixel of `image` with the pixel at the same
/// position in `background`.
///
/// Only the top-left `width x height` corner of the background is used;
/// it is never scaled. The output is always three-channel RGB.
///
/// # Errors
///
/// Returns [`PipelineError::BackgroundTooSmall`] if the background does
/// not cover the image on both axes.
pub fn replace_greenscreen(
    image: DynamicImage,
    background: &Background,
) -> Result<DynamicImage, PipelineError> {
    let dimensions = Dimensions::of(&image);
    if !background.dimensions().contains(dimensions) {
        return Err(PipelineError::BackgroundTooSmall {
            background: background.dimensions(),
            image: dimensions,
        });
    }

    let backdrop = background.image();
    let mut composite = image.into_rgb8();
    for (x, y, pixel) in composite.enumerate_pixels_mut() {
        if is_green(*pixel) {
            *pixel = *backdrop.get_pixel(x, y);
        }
    }
    Ok(DynamicImage::ImageRgb8(composite))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SCREEN: Rgb<u8> = Rgb([0, 255, 0]);

    /// A 40x30 background whose pixels encode their own coordinates.
    fn gradient_background() -> Background {
        Background::new(RgbImage::from_fn(40, 30, |x, y| {
            Rgb([u8::try_from(x * 6).unwrap(), u8::try_from(y * 8).unwrap(), 200])
        }))
    }

    // --- HSV ---

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv(Rgb([255, 0, 0])), [0, 255, 255]);
        assert_eq!(hsv(Rgb([0, 255, 0])), [60, 255, 255]);
        assert_eq!(hsv(Rgb([0, 0, 255])), [120, 255, 255]);
    }

    #[test]
    fn hsv_greys_have_no_hue() {
        assert_eq!(hsv(Rgb([0, 0, 0])), [0, 0, 0]);
        assert_eq!(hsv(Rgb([128, 128, 128])), [0, 0, 128]);
        assert_eq!(hsv(Rgb([255, 255, 255])), [0, 0, 255]);
    }

    #[test]
    fn hsv_magenta_wraps_below_zero() {
        // 300 degrees, reached from the red sector with g < b.
        assert_eq!(hsv(Rgb([255, 0, 255])), [150, 255, 255]);
    }

    #[test]
    fn hsv_saturation_rounds() {
        // diff 100, v 200: 100 * 255 / 200 = 127.5
        assert_eq!(hsv(Rgb([100, 200, 100]))[1], 128);
    }

    // --- Classification ---

    #[test]
    fn hue_window_edges() {
        // 100 degrees -> 50 half-degrees, inside.
        assert!(is_green(Rgb([85, 255, 0])));
        // ~96 degrees -> 48, outside.
        assert!(!is_green(Rgb([100, 255, 0])));
        // 140 degrees -> 70, inside.
        assert!(is_green(Rgb([0, 255, 85])));
    }

    #[test]
    fn dark_and_washed_out_green_is_not_screen() {
        assert!(is_green(Rgb([0, 100, 0])));
        assert!(!is_green(Rgb([0, 50, 0])));
        assert!(!is_green(Rgb([220, 240, 220])));
    }

    #[test]
    fn green_mask_marks_screen_only() {
        let image = RgbImage::from_fn(4, 1, |x, _| {
            if x % 2 == 0 {
                SCREEN
            } else {
                Rgb([200, 150, 120])
            }
        });
        let mask = green_mask(&image);
        let values: Vec<u8> = mask.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![255, 0, 255, 0]);
    }

    // --- Composite ---

    #[test]
    fn all_green_becomes_cropped_background() {
        let background = gradient_background();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, SCREEN));
        let out = replace_greenscreen(image, &background).unwrap().to_rgb8();
        assert_eq!(out.dimensions(), (20, 10));
        for (x, y, pixel) in out.enumerate_pixels() {
            assert_eq!(pixel, background.image().get_pixel(x, y));
        }
    }

    #[test]
    fn non_green_is_unchanged() {
        let skin = RgbImage::from_fn(20, 10, |x, y| {
            Rgb([200, 150 + u8::try_from(x).unwrap(), 120 + u8::try_from(y).unwrap()])
        });
        let out = replace_greenscreen(DynamicImage::ImageRgb8(skin.clone()), &gradient_background())
            .unwrap()
            .to_rgb8();
        assert_eq!(out, skin);
    }

    #[test]
    fn mixed_image_replaces_only_screen() {
        let image = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                SCREEN
            } else {
                Rgb([90, 60, 40])
            }
        });
        let background = gradient_background();
        let out = replace_greenscreen(DynamicImage::ImageRgb8(image), &background)
            .unwrap()
            .to_rgb8();
        assert_eq!(out.get_pixel(2, 3), background.image().get_pixel(2, 3));
        assert_eq!(out.get_pixel(7, 3), &Rgb([90, 60, 40]));
    }

    #[test]
    fn background_exactly_image_size_is_fine() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, SCREEN));
        assert!(replace_greenscreen(image, &gradient_background()).is_ok());
    }

    #[test]
    fn background_too_small_is_error() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(41, 10, SCREEN));
        let err = replace_greenscreen(image, &gradient_background()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::BackgroundTooSmall {
                background: Dimensions::new(40, 30),
                image: Dimensions::new(41, 10),
            }
        );
    }

    #[test]
    fn output_is_rgb_even_for_rgba_input() {
        let image = DynamicImage::new_rgba8(5, 5);
        let out = replace_greenscreen(image, &gradient_background()).unwrap();
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }
}
