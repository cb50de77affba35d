//! Shared types for the mugshot portrait pipeline.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Re-export `DynamicImage` so downstream crates can hand images to the
/// pipeline without depending on `image` directly.
pub use image::DynamicImage;

/// Re-export `GrayImage` for luminance and mask rasters.
pub use image::GrayImage;

/// Re-export `RgbImage`, the pixel layout of chroma-key backgrounds.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions from a width and height.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an image.
    #[must_use]
    pub fn of(image: &DynamicImage) -> Self {
        Self::new(image.width(), image.height())
    }

    /// Whether `other` fits inside these dimensions on both axes.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned region of interest in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge (pixels from the left of the image).
    pub x: u32,
    /// Top edge (pixels from the top of the image).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Roi {
    /// Create a new region.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the right-most column covered by the region.
    #[must_use]
    pub const fn right(self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// One past the bottom-most row covered by the region.
    #[must_use]
    pub const fn bottom(self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Width and height of the region.
    #[must_use]
    pub const fn dimensions(self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Whether the region lies entirely inside an image of `bounds`.
    #[must_use]
    pub const fn is_within(self, bounds: Dimensions) -> bool {
        self.right() <= bounds.width as u64 && self.bottom() <= bounds.height as u64
    }

    /// Intersect the region with an image of `bounds`.
    ///
    /// The origin is pulled inside the image and the size is cut at the
    /// right and bottom edges, which is what slicing a pixel grid does.
    #[must_use]
    pub fn clamp_to(self, bounds: Dimensions) -> Self {
        let x = self.x.min(bounds.width);
        let y = self.y.min(bounds.height);
        Self {
            x,
            y,
            width: self.width.min(bounds.width - x),
            height: self.height.min(bounds.height - y),
        }
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Output size for the resize stage. Both axes are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    width: NonZeroU32,
    height: NonZeroU32,
}

impl TargetSize {
    /// Create a target size from two non-zero dimensions.
    #[must_use]
    pub const fn new(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self { width, height }
    }

    /// Resolve a target size from a list of user-supplied values.
    ///
    /// An empty list means "no resize". Exactly two positive values make
    /// a size; anything else is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when the list has one value,
    /// more than two values, or a zero.
    pub fn from_values(values: &[u32]) -> Result<Option<Self>, PipelineError> {
        match *values {
            [] => Ok(None),
            [width, height] => match (NonZeroU32::new(width), NonZeroU32::new(height)) {
                (Some(width), Some(height)) => Ok(Some(Self::new(width, height))),
                _ => Err(PipelineError::InvalidConfig(format!(
                    "target size must be positive, got {width}x{height}"
                ))),
            },
            _ => Err(PipelineError::InvalidConfig(format!(
                "target size needs exactly two values (width and height), got {}",
                values.len()
            ))),
        }
    }

    /// Target width in pixels.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.width.get()
    }

    /// Target height in pixels.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.height.get()
    }

    /// The size as plain [`Dimensions`].
    #[must_use]
    pub const fn dimensions(self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }
}

/// Chroma-key background, decoded once and shared read-only by every
/// image in the batch.
#[derive(Clone)]
pub struct Background(RgbImage);

impl Background {
    /// Wrap a decoded background image.
    #[must_use]
    pub const fn new(image: RgbImage) -> Self {
        Self(image)
    }

    /// The background pixels.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.0
    }

    /// Background dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.0.width(), self.0.height())
    }
}

impl fmt::Debug for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Background({})", self.dimensions())
    }
}

/// Configuration for the portrait pipeline, resolved once before a batch.
///
/// Stages run in a fixed order: crop (always), resize, chroma key,
/// rotate, grayscale, circle. Each optional stage is enabled by its
/// field.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pixels of context added on each side of the detected face.
    pub padding: u32,

    /// Resize every cropped face to exactly this size.
    pub size: Option<TargetSize>,

    /// Replace greenscreen pixels with this background.
    ///
    /// Must be at least as large as every image reaching the stage.
    pub background: Option<Background>,

    /// Rotate counter-clockwise by this many degrees.
    pub rotation: Option<f32>,

    /// Convert to single-channel luminance.
    pub grayscale: bool,

    /// Mask to a circle through a hard alpha channel.
    pub circle: bool,
}

impl PipelineConfig {
    /// Default padding around detected faces, in pixels.
    pub const DEFAULT_PADDING: u32 = 30;

    /// Set the face padding.
    #[must_use]
    pub const fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Enable the resize stage.
    #[must_use]
    pub const fn with_size(mut self, size: TargetSize) -> Self {
        self.size = Some(size);
        self
    }

    /// Enable the chroma-key stage.
    #[must_use]
    pub fn with_background(mut self, background: Background) -> Self {
        self.background = Some(background);
        self
    }

    /// Enable the rotate stage.
    #[must_use]
    pub const fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = Some(degrees);
        self
    }

    /// Enable or disable the grayscale stage.
    #[must_use]
    pub const fn with_grayscale(mut self, grayscale: bool) -> Self {
        self.grayscale = grayscale;
        self
    }

    /// Enable or disable the circle stage.
    #[must_use]
    pub const fn with_circle(mut self, circle: bool) -> Self {
        self.circle = circle;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            padding: Self::DEFAULT_PADDING,
            size: None,
            background: None,
            rotation: None,
            grayscale: false,
            circle: false,
        }
    }
}

/// A pipeline output, tagged with the batch index of the input it came
/// from.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Index of the source image in the input batch.
    pub source_index: usize,
    /// The transformed image.
    pub image: DynamicImage,
}

/// Errors raised by pipeline stages and configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The chroma-key background cannot cover the foreground.
    #[error("background {background} is smaller than image {image}")]
    BackgroundTooSmall {
        /// Background dimensions.
        background: Dimensions,
        /// Foreground dimensions.
        image: Dimensions,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Dimensions ---

    #[test]
    fn dimensions_display() {
        assert_eq!(Dimensions::new(640, 480).to_string(), "640x480");
    }

    #[test]
    fn dimensions_contains() {
        let outer = Dimensions::new(100, 50);
        assert!(outer.contains(Dimensions::new(100, 50)));
        assert!(outer.contains(Dimensions::new(10, 10)));
        assert!(!outer.contains(Dimensions::new(101, 10)));
        assert!(!outer.contains(Dimensions::new(10, 51)));
    }

    // --- Roi ---

    #[test]
    fn roi_edges() {
        let roi = Roi::new(10, 20, 30, 40);
        assert_eq!(roi.right(), 40);
        assert_eq!(roi.bottom(), 60);
        assert_eq!(roi.dimensions(), Dimensions::new(30, 40));
    }

    #[test]
    fn roi_edges_do_not_overflow() {
        let roi = Roi::new(u32::MAX, u32::MAX, u32::MAX, 1);
        assert_eq!(roi.right(), 2 * u64::from(u32::MAX));
        assert_eq!(roi.bottom(), u64::from(u32::MAX) + 1);
    }

    #[test]
    fn roi_within_bounds() {
        let bounds = Dimensions::new(100, 100);
        assert!(Roi::new(0, 0, 100, 100).is_within(bounds));
        assert!(!Roi::new(1, 0, 100, 100).is_within(bounds));
        assert!(!Roi::new(0, 90, 10, 11).is_within(bounds));
    }

    #[test]
    fn roi_clamp_cuts_right_and_bottom() {
        let clamped = Roi::new(70, 80, 50, 50).clamp_to(Dimensions::new(100, 100));
        assert_eq!(clamped, Roi::new(70, 80, 30, 20));
    }

    #[test]
    fn roi_clamp_origin_outside_gives_empty() {
        let clamped = Roi::new(150, 10, 20, 20).clamp_to(Dimensions::new(100, 100));
        assert_eq!(clamped, Roi::new(100, 10, 0, 20));
    }

    #[test]
    fn roi_clamp_inside_is_identity() {
        let roi = Roi::new(5, 5, 10, 10);
        assert_eq!(roi.clamp_to(Dimensions::new(100, 100)), roi);
    }

    // --- TargetSize ---

    #[test]
    fn target_size_empty_means_none() {
        assert_eq!(TargetSize::from_values(&[]).unwrap(), None);
    }

    #[test]
    fn target_size_two_values() {
        let size = TargetSize::from_values(&[120, 80]).unwrap().unwrap();
        assert_eq!(size.width(), 120);
        assert_eq!(size.height(), 80);
        assert_eq!(size.dimensions(), Dimensions::new(120, 80));
    }

    #[test]
    fn target_size_single_value_is_config_error() {
        let err = TargetSize::from_values(&[120]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn target_size_three_values_is_config_error() {
        assert!(TargetSize::from_values(&[1, 2, 3]).is_err());
    }

    #[test]
    fn target_size_zero_is_config_error() {
        assert!(TargetSize::from_values(&[0, 10]).is_err());
        assert!(TargetSize::from_values(&[10, 0]).is_err());
    }

    // --- PipelineConfig ---

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.padding, 30);
        assert!(config.size.is_none());
        assert!(config.background.is_none());
        assert!(config.rotation.is_none());
        assert!(!config.grayscale);
        assert!(!config.circle);
    }

    #[test]
    fn pipeline_config_builders() {
        let size = TargetSize::from_values(&[64, 64]).unwrap().unwrap();
        let config = PipelineConfig::default()
            .with_padding(5)
            .with_size(size)
            .with_background(Background::new(RgbImage::new(10, 10)))
            .with_rotation(15.0)
            .with_grayscale(true)
            .with_circle(true);
        assert_eq!(config.padding, 5);
        assert_eq!(config.size, Some(size));
        assert_eq!(
            config.background.as_ref().map(Background::dimensions),
            Some(Dimensions::new(10, 10))
        );
        assert_eq!(config.rotation, Some(15.0));
        assert!(config.grayscale);
        assert!(config.circle);
    }

    #[test]
    fn background_debug_shows_dimensions_only() {
        let bg = Background::new(RgbImage::new(4, 3));
        assert_eq!(format!("{bg:?}"), "Background(4x3)");
    }

    // --- PipelineError ---

    #[test]
    fn error_invalid_config_display() {
        let err = PipelineError::InvalidConfig("bad size".to_string());
        assert_eq!(err.to_string(), "invalid pipeline configuration: bad size");
    }

    #[test]
    fn error_background_too_small_display() {
        let err = PipelineError::BackgroundTooSmall {
            background: Dimensions::new(10, 10),
            image: Dimensions::new(20, 5),
        };
        assert_eq!(err.to_string(), "background 10x10 is smaller than image 20x5");
    }

    // --- Serde ---

    #[test]
    fn roi_serde_round_trip() {
        let roi = Roi::new(1, 2, 3, 4);
        let json = serde_json::to_string(&roi).unwrap();
        assert_eq!(serde_json::from_str::<Roi>(&json).unwrap(), roi);
    }
}
