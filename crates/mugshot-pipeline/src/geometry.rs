//! Region-of-interest padding.
//!
//! A detected face box is tight around the face. [`pad_roi`] grows it by
//! a fixed number of pixels on every side so the crop keeps some hair,
//! chin and shoulders.

use crate::types::{Dimensions, Roi};

/// Grow `roi` by `pad` pixels on each side, limited by `bounds`.
///
/// The origin moves up and left by `pad` and stops at zero. The size
/// grows by `2 * pad` unless that would reach the image size, in which
/// case it becomes the image size. Width and height are clamped, not
/// shifted: when the origin was stopped at zero, or the face sits close
/// to the right or bottom edge, the result can still run past the image.
/// [`crate::crop::crop_to_roi`] intersects with the image before cutting.
#[must_use]
pub const fn pad_roi(roi: Roi, pad: u32, bounds: Dimensions) -> Roi {
    let grow = pad.saturating_mul(2);
    let width = roi.width.saturating_add(grow);
    let height = roi.height.saturating_add(grow);
    Roi {
        x: roi.x.saturating_sub(pad),
        y: roi.y.saturating_sub(pad),
        width: if width < bounds.width {
            width
        } else {
            bounds.width
        },
        height: if height < bounds.height {
            height
        } else {
            bounds.height
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Dimensions = Dimensions::new(100, 100);

    #[test]
    fn zero_padding_is_identity() {
        let roi = Roi::new(10, 20, 30, 40);
        assert_eq!(pad_roi(roi, 0, BOUNDS), roi);
    }

    #[test]
    fn interior_roi_grows_on_every_side() {
        let padded = pad_roi(Roi::new(40, 40, 20, 20), 10, BOUNDS);
        assert_eq!(padded, Roi::new(30, 30, 40, 40));
        assert!(padded.is_within(BOUNDS));
    }

    #[test]
    fn origin_stops_at_zero() {
        let padded = pad_roi(Roi::new(5, 3, 20, 20), 10, BOUNDS);
        assert_eq!(padded, Roi::new(0, 0, 40, 40));
    }

    #[test]
    fn size_reaching_bounds_becomes_bounds() {
        // 90 + 2*30 = 150 >= 100
        let padded = pad_roi(Roi::new(10, 10, 90, 90), 30, BOUNDS);
        assert_eq!(padded, Roi::new(0, 0, 100, 100));
    }

    #[test]
    fn size_exactly_at_bounds_becomes_bounds() {
        // 80 + 2*10 = 100, not < 100
        let padded = pad_roi(Roi::new(10, 10, 80, 80), 10, BOUNDS);
        assert_eq!(padded, Roi::new(0, 0, 100, 100));
        assert!(padded.is_within(BOUNDS));
    }

    #[test]
    fn non_square_bounds_clamp_each_axis_independently() {
        let bounds = Dimensions::new(200, 60);
        let padded = pad_roi(Roi::new(50, 10, 40, 40), 20, bounds);
        assert_eq!(padded, Roi::new(30, 0, 80, 60));
    }

    #[test]
    fn face_near_right_edge_runs_past_image() {
        // Width is clamped in the frame of the original origin, so a face
        // hugging the right edge produces a box that overshoots it.
        let padded = pad_roi(Roi::new(80, 40, 15, 15), 10, BOUNDS);
        assert_eq!(padded, Roi::new(70, 30, 35, 35));
        assert_eq!(padded.right(), 105);
        assert!(!padded.is_within(BOUNDS));
        assert_eq!(padded.clamp_to(BOUNDS), Roi::new(70, 30, 30, 35));
    }

    #[test]
    fn huge_padding_saturates() {
        let padded = pad_roi(Roi::new(10, 10, 10, 10), u32::MAX, BOUNDS);
        assert_eq!(padded, Roi::new(0, 0, 100, 100));
    }

    #[test]
    fn padded_roi_stays_inside_when_margins_allow() {
        // Sweep faces inside a 64x48 image with paddings up to 12px; when
        // the face has at least `pad` pixels of margin on every side (or
        // the padded size is clamped to the full image from the origin),
        // the result never leaves the image.
        let bounds = Dimensions::new(64, 48);
        for pad in [0, 1, 5, 12] {
            for x in (0..64).step_by(7) {
                for y in (0..48).step_by(5) {
                    for w in [1, 8, 20] {
                        for h in [1, 6, 18] {
                            let roi = Roi::new(x, y, w, h);
                            if !roi.is_within(bounds) {
                                continue;
                            }
                            let padded = pad_roi(roi, pad, bounds);
                            assert!(padded.width <= bounds.width);
                            assert!(padded.height <= bounds.height);
                            let margins_ok = x >= pad
                                && y >= pad
                                && u64::from(pad) + roi.right() <= u64::from(bounds.width)
                                && u64::from(pad) + roi.bottom() <= u64::from(bounds.height);
                            if margins_ok {
                                assert!(
                                    padded.is_within(bounds),
                                    "{roi} padded by {pad} left the image: {padded}",
                                );
                            }
                            assert!(padded.clamp_to(bounds).is_within(bounds));
                        }
                    }
                }
            }
        }
    }
}
