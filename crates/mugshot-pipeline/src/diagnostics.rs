//! Batch diagnostics: what happened to every image, and how long it took.
//!
//! Every call to [`process_batch`](crate::process_batch) returns a
//! [`BatchReport`] alongside the images. Each input gets exactly one
//! [`ImageOutcome`]: either the crop region and per-stage timings of a
//! processed image, or the reason it was left out of the output.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crop::CropRegion;
use crate::types::{Dimensions, DynamicImage, PipelineError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// One step of the portrait pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Face location, padding and crop. Always runs.
    Crop,
    /// Scale to the configured size.
    Resize,
    /// Greenscreen replacement.
    ChromaKey,
    /// Rotation about the center.
    Rotate,
    /// Luminance conversion.
    Grayscale,
    /// Circular alpha mask.
    Circle,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Crop => "Crop",
            Self::Resize => "Resize",
            Self::ChromaKey => "Chroma Key",
            Self::Rotate => "Rotate",
            Self::Grayscale => "Grayscale",
            Self::Circle => "Circle",
        })
    }
}

/// Diagnostics for a single stage applied to a single image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Which stage ran.
    pub stage: StageKind,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Dimensions of the stage's output.
    pub output: Dimensions,
    /// Channel count of the stage's output.
    pub channels: u8,
}

impl StageDiagnostics {
    /// Describe `output` as produced by `stage` in `duration`.
    #[must_use]
    pub fn of(stage: StageKind, duration: Duration, output: &DynamicImage) -> Self {
        Self {
            stage,
            duration,
            output: Dimensions::of(output),
            channels: output.color().channel_count(),
        }
    }
}

/// Diagnostics for one processed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDiagnostics {
    /// Index of the image in the input batch.
    pub source_index: usize,
    /// Dimensions of the input image.
    pub input: Dimensions,
    /// Face box and the region cut around it.
    pub crop: CropRegion,
    /// Stages that ran, in order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration for this image (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Why an image was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The face locator found nothing.
    #[error("face not found; make sure lighting is good and the face is unobscured")]
    NoFace,

    /// A stage rejected the image.
    #[error(transparent)]
    Stage(#[from] PipelineError),
}

/// What happened to one input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// The image made it through every enabled stage.
    Processed(ImageDiagnostics),
    /// The image was dropped.
    Skipped {
        /// Index of the image in the input batch.
        source_index: usize,
        /// Why it was dropped.
        reason: SkipReason,
    },
}

impl ImageOutcome {
    /// Index of the input image this outcome describes.
    #[must_use]
    pub const fn source_index(&self) -> usize {
        match self {
            Self::Processed(diag) => diag.source_index,
            Self::Skipped { source_index, .. } => *source_index,
        }
    }
}

/// Per-image outcomes for a whole batch, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Number of images handed to the pipeline.
    pub input_count: usize,
    /// Number of images in the output.
    pub output_count: usize,
    /// One entry per input image.
    pub entries: Vec<ImageOutcome>,
    /// Wall-clock duration of the whole batch (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl BatchReport {
    /// Number of images that were dropped.
    #[must_use]
    pub const fn skipped_count(&self) -> usize {
        self.input_count.saturating_sub(self.output_count)
    }

    /// Dropped images with their reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (usize, &SkipReason)> {
        self.entries.iter().filter_map(|entry| match entry {
            ImageOutcome::Skipped {
                source_index,
                reason,
            } => Some((*source_index, reason)),
            ImageOutcome::Processed(_) => None,
        })
    }

    /// Format the report for humans.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Batch Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Images: {} in, {} out, {} skipped",
            self.input_count,
            self.output_count,
            self.skipped_count(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration)
        ));

        for entry in &self.entries {
            lines.push(String::new());
            match entry {
                ImageOutcome::Processed(diag) => {
                    lines.push(format!(
                        "#{} {} -> face {} -> crop {}  ({:.3}ms)",
                        diag.source_index,
                        diag.input,
                        diag.crop.face,
                        diag.crop.cropped,
                        duration_ms(diag.total_duration),
                    ));
                    for stage in &diag.stages {
                        lines.push(format!(
                            "    {:<12} {:>9.3}ms  {} x{}",
                            stage.stage.to_string(),
                            duration_ms(stage.duration),
                            stage.output,
                            stage.channels,
                        ));
                    }
                }
                ImageOutcome::Skipped {
                    source_index,
                    reason,
                } => {
                    lines.push(format!("#{source_index} skipped: {reason}"));
                }
            }
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
