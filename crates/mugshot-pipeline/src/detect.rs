//! Face location: find the face box the crop stage pads and cuts.
//!
//! This module defines the [`FaceLocator`] trait for pluggable face
//! detectors and [`CascadeDetector`], the stock implementation that runs
//! a boosted Haar cascade over an image pyramid.
//!
//! The pipeline only ever uses the **first** detection a locator
//! reports. For [`CascadeDetector`] that is the group containing the
//! earliest raw hit in scan order, not the largest or most confident
//! face.

use image::Luma;
use image::imageops::{self, FilterType};

use crate::cascade::{HaarCascade, IntegralImages, Verdict};
use crate::types::{Dimensions, DynamicImage, GrayImage, PipelineError, Roi};

/// Trait for face detection strategies.
///
/// Input: a single-channel luminance image.
/// Output: face boxes in the detector's native order. An empty list
/// means no face, which is a normal outcome.
pub trait FaceLocator: Send + Sync {
    /// Locate faces in the given luminance image.
    fn locate(&self, gray: &GrayImage) -> Vec<Roi>;
}

/// Convert `image` to [`detection_gray`], run `locator`, and keep the
/// first box.
#[must_use]
pub fn find_face<L: FaceLocator + ?Sized>(locator: &L, image: &DynamicImage) -> Option<Roi> {
    let gray = detection_gray(image);
    locator.locate(&gray).into_iter().next()
}

/// Luminance as stock face cascades were trained on it.
///
/// BT.601 weights (0.299, 0.587, 0.114) in 14-bit fixed point with
/// rounding. Single-channel inputs pass through unchanged. This is the
/// detector's input only; the grayscale stage keeps the `image` crate's
/// conversion.
#[must_use]
pub fn detection_gray(image: &DynamicImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    const SHIFT: u32 = 14;

    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let weighted = R * u32::from(r) + G * u32::from(g) + B * u32::from(b);
        let luma = (weighted + (1 << (SHIFT - 1))) >> SHIFT;
        Luma([u8::try_from(luma).unwrap_or(u8::MAX)])
    })
}

/// Multi-scale sliding-window detector over a [`HaarCascade`].
///
/// The image is shrunk by `scale_factor` per pyramid level while the
/// cascade window stays fixed, which is equivalent to growing the window
/// over the original image. Raw hits are clustered and averaged by
/// [`group_rectangles`]; a cluster needs more than `min_neighbors`
/// members to count as a face.
#[derive(Debug, Clone)]
pub struct CascadeDetector {
    cascade: HaarCascade,
    scale_factor: f64,
    min_neighbors: u32,
}

impl CascadeDetector {
    /// Default pyramid step between detection scales.
    pub const DEFAULT_SCALE_FACTOR: f64 = 1.3;

    /// Default number of overlapping hits a face must exceed.
    pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;

    /// Relative tolerance used when clustering raw hits.
    pub const GROUP_EPS: f64 = 0.2;

    /// Wrap a cascade with the default scale factor and neighbor count.
    #[must_use]
    pub const fn new(cascade: HaarCascade) -> Self {
        Self {
            cascade,
            scale_factor: Self::DEFAULT_SCALE_FACTOR,
            min_neighbors: Self::DEFAULT_MIN_NEIGHBORS,
        }
    }

    /// Use a different pyramid step.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] unless `scale_factor` is a
    /// finite number greater than 1.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Result<Self, PipelineError> {
        if !scale_factor.is_finite() || scale_factor <= 1.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "scale factor must be greater than 1, got {scale_factor}"
            )));
        }
        self.scale_factor = scale_factor;
        Ok(self)
    }

    /// Use a different neighbor threshold. Zero disables grouping.
    #[must_use]
    pub const fn with_min_neighbors(mut self, min_neighbors: u32) -> Self {
        self.min_neighbors = min_neighbors;
        self
    }

    /// Every window the cascade accepts, in source coordinates, before
    /// grouping.
    ///
    /// Levels are scanned from the finest scale up; within a level,
    /// windows are visited row by row.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn candidates(&self, gray: &GrayImage) -> Vec<Roi> {
        let window = self.cascade.window();
        let (width, height) = gray.dimensions();
        let mut hits = Vec::new();
        let mut factor = 1.0_f64;

        loop {
            let scaled = Dimensions::new(
                (f64::from(width) / factor).round() as u32,
                (f64::from(height) / factor).round() as u32,
            );
            let scaled_window = Dimensions::new(
                (f64::from(window.width) * factor).round() as u32,
                (f64::from(window.height) * factor).round() as u32,
            );
            if scaled.width < window.width || scaled.height < window.height {
                break;
            }
            if !Dimensions::new(width, height).contains(scaled_window) {
                break;
            }

            let level = if scaled == Dimensions::new(width, height) {
                None
            } else {
                Some(imageops::resize(
                    gray,
                    scaled.width,
                    scaled.height,
                    FilterType::Triangle,
                ))
            };
            let integral = IntegralImages::new(level.as_ref().unwrap_or(gray));
            let step = if factor > 2.0 { 1 } else { 2 };
            let span = Dimensions::new(
                scaled.width - window.width,
                scaled.height - window.height,
            );

            let before = hits.len();
            let mut y = 0;
            while y <= span.height {
                let mut x = 0;
                while x <= span.width {
                    match self.cascade.evaluate(&integral, x, y) {
                        Verdict::Accepted => hits.push(Roi::new(
                            (f64::from(x) * factor).round_ties_even() as u32,
                            (f64::from(y) * factor).round_ties_even() as u32,
                            scaled_window.width,
                            scaled_window.height,
                        )),
                        // A window failing the first stage is unlikely to
                        // have a neighbor that passes.
                        Verdict::Rejected { stage: 0 } => x += step,
                        Verdict::Rejected { .. } => {}
                    }
                    x += step;
                }
                y += step;
            }
            tracing::trace!(
                factor,
                level = %scaled,
                hits = hits.len() - before,
                "scanned pyramid level"
            );

            factor *= self.scale_factor;
        }

        hits
    }
}

impl FaceLocator for CascadeDetector {
    fn locate(&self, gray: &GrayImage) -> Vec<Roi> {
        let raw = self.candidates(gray);
        let faces = group_rectangles(&raw, self.min_neighbors, Self::GROUP_EPS);
        tracing::debug!(candidates = raw.len(), faces = faces.len(), "cascade detection");
        faces
    }
}

/// Cluster overlapping rectangles and average each cluster.
///
/// Two rectangles are similar when every edge is within
/// `eps * (min width + min height) / 2` of its counterpart; clusters are
/// the transitive closure of that relation. A cluster survives when it
/// has more than `min_neighbors` members and is not nested inside a
/// stronger cluster. Survivors are returned in the order their first
/// member appeared in `rects`.
///
/// With `min_neighbors == 0` the input is returned unchanged.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn group_rectangles(rects: &[Roi], min_neighbors: u32, eps: f64) -> Vec<Roi> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, class_count) = partition(rects, eps);

    let mut sums = vec![[0_u64; 4]; class_count];
    let mut counts = vec![0_u32; class_count];
    for (rect, &label) in rects.iter().zip(&labels) {
        let sum = &mut sums[label];
        sum[0] += u64::from(rect.x);
        sum[1] += u64::from(rect.y);
        sum[2] += u64::from(rect.width);
        sum[3] += u64::from(rect.height);
        counts[label] += 1;
    }
    let averaged: Vec<Roi> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| {
            let mean = |total: u64| (total as f64 / f64::from(count)).round_ties_even() as u32;
            Roi::new(mean(sum[0]), mean(sum[1]), mean(sum[2]), mean(sum[3]))
        })
        .collect();

    let mut faces = Vec::new();
    for (i, (&inner, &n1)) in averaged.iter().zip(&counts).enumerate() {
        if n1 <= min_neighbors {
            continue;
        }
        let swallowed = averaged.iter().zip(&counts).enumerate().any(|(j, (&outer, &n2))| {
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (f64::from(outer.width) * eps).round_ties_even() as i64;
            let dy = (f64::from(outer.height) * eps).round_ties_even() as i64;
            let (ix, iy) = (i64::from(inner.x), i64::from(inner.y));
            let (ox, oy) = (i64::from(outer.x), i64::from(outer.y));
            ix >= ox - dx
                && iy >= oy - dy
                && inner.right() as i64 <= outer.right() as i64 + dx
                && inner.bottom() as i64 <= outer.bottom() as i64 + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !swallowed {
            faces.push(inner);
        }
    }
    faces
}

/// Whether two rectangles are close enough to belong to one cluster.
#[allow(clippy::cast_precision_loss)]
fn similar(a: Roi, b: Roi, eps: f64) -> bool {
    let delta = eps * f64::from(a.width.min(b.width) + a.height.min(b.height)) * 0.5;
    let close = |p: u64, q: u64| (p.abs_diff(q) as f64) <= delta;
    close(a.x.into(), b.x.into())
        && close(a.y.into(), b.y.into())
        && close(a.right(), b.right())
        && close(a.bottom(), b.bottom())
}

/// Union-find partition of `rects` under [`similar`].
///
/// Labels are numbered in order of each class's first member.
fn partition(rects: &[Roi], eps: f64) -> (Vec<usize>, usize) {
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut parent: Vec<usize> = (0..rects.len()).collect();
    for i in 0..rects.len() {
        for j in 0..i {
            if similar(rects[i], rects[j], eps) {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; rects.len()];
    let mut class_count = 0;
    let mut labels = Vec::with_capacity(rects.len());
    for i in 0..rects.len() {
        let r = root(&mut parent, i);
        if class_of_root[r] == usize::MAX {
            class_of_root[r] = class_count;
            class_count += 1;
        }
        labels.push(class_of_root[r]);
    }
    (labels, class_count)
}
