//! Batch orchestration: run every image through the enabled stages.
//!
//! Each image flows through
//!
//! ```text
//! crop -> resize -> chroma key -> rotate -> grayscale -> circle
//! ```
//!
//! running only the stages the [`PipelineConfig`] enables, always in that
//! order. Crop always runs. Images are independent of each other, so the
//! batch is spread over the rayon thread pool; the output keeps input
//! order and tags every image with the index it came from.
//!
//! A failure is confined to its own image. When no face is found, or the
//! chroma-key background is too small, that image is left out of the
//! output and the reason is recorded in the [`BatchReport`].

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::detect::FaceLocator;
use crate::diagnostics::{
    BatchReport, ImageDiagnostics, ImageOutcome, SkipReason, StageDiagnostics, StageKind,
};
use crate::types::{Dimensions, DynamicImage, PipelineConfig, ProcessedImage};
use crate::{chroma, crop, grayscale, mask, resize, rotate};

/// Images that made it through, plus what happened to every input.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Processed images, in input order.
    pub images: Vec<ProcessedImage>,
    /// One entry per input image.
    pub report: BatchReport,
}

impl PipelineConfig {
    /// The stages this configuration runs, in execution order.
    #[must_use]
    pub fn enabled_stages(&self) -> Vec<StageKind> {
        let mut stages = vec![StageKind::Crop];
        if self.size.is_some() {
            stages.push(StageKind::Resize);
        }
        if self.background.is_some() {
            stages.push(StageKind::ChromaKey);
        }
        if self.rotation.is_some() {
            stages.push(StageKind::Rotate);
        }
        if self.grayscale {
            stages.push(StageKind::Grayscale);
        }
        if self.circle {
            stages.push(StageKind::Circle);
        }
        stages
    }
}

/// Process a whole batch.
///
/// Never fails as a whole: images that cannot be processed are skipped
/// and listed in the report.
#[must_use]
pub fn process_batch<L: FaceLocator + ?Sized>(
    images: Vec<DynamicImage>,
    config: &PipelineConfig,
    locator: &L,
) -> BatchOutcome {
    let start = Instant::now();
    let input_count = images.len();
    tracing::info!(
        images = input_count,
        stages = ?config.enabled_stages(),
        "processing batch"
    );

    let results: Vec<_> = images
        .into_par_iter()
        .enumerate()
        .map(|(index, image)| (index, process_image(index, image, config, locator)))
        .collect();

    let mut processed = Vec::with_capacity(results.len());
    let mut entries = Vec::with_capacity(results.len());
    for (source_index, result) in results {
        match result {
            Ok((image, diagnostics)) => {
                processed.push(ProcessedImage {
                    source_index,
                    image,
                });
                entries.push(ImageOutcome::Processed(diagnostics));
            }
            Err(reason) => {
                tracing::warn!(source_index, %reason, "skipping image");
                entries.push(ImageOutcome::Skipped {
                    source_index,
                    reason,
                });
            }
        }
    }

    let report = BatchReport {
        input_count,
        output_count: processed.len(),
        entries,
        total_duration: start.elapsed(),
    };
    tracing::info!(
        processed = report.output_count,
        skipped = report.skipped_count(),
        duration_ms = report.total_duration.as_secs_f64() * 1000.0,
        "batch complete"
    );

    BatchOutcome {
        images: processed,
        report,
    }
}

/// Run one image through the enabled stages.
///
/// `source_index` is only used to label the diagnostics.
///
/// # Errors
///
/// Returns [`SkipReason::NoFace`] when the locator finds nothing, and
/// [`SkipReason::Stage`] when a stage rejects the image (a chroma-key
/// background smaller than the crop).
pub fn process_image<L: FaceLocator + ?Sized>(
    source_index: usize,
    image: DynamicImage,
    config: &PipelineConfig,
    locator: &L,
) -> Result<(DynamicImage, ImageDiagnostics), SkipReason> {
    let start = Instant::now();
    let input = Dimensions::of(&image);
    let mut timer = StageTimer::default();

    let (cropped, region) = timer.time(StageKind::Crop, || {
        crop::crop_to_face(locator, &image, config.padding).ok_or(SkipReason::NoFace)
    })?;
    drop(image);
    tracing::debug!(source_index, face = %region.face, crop = %region.cropped, "face cropped");

    let mut current = cropped;
    if let Some(size) = config.size {
        current = timer.step(StageKind::Resize, current, |img| Ok(resize::scale(&img, size)))?;
    }
    if let Some(background) = &config.background {
        current = timer.step(StageKind::ChromaKey, current, |img| {
            chroma::replace_greenscreen(img, background).map_err(SkipReason::from)
        })?;
    }
    if let Some(degrees) = config.rotation {
        current = timer.step(StageKind::Rotate, current, |img| Ok(rotate::rotate(&img, degrees)))?;
    }
    if config.grayscale {
        current = timer.step(StageKind::Grayscale, current, |img| {
            Ok(grayscale::to_grayscale(&img))
        })?;
    }
    if config.circle {
        current = timer.step(StageKind::Circle, current, |img| Ok(mask::circle(&img)))?;
    }

    let diagnostics = ImageDiagnostics {
        source_index,
        input,
        crop: region,
        stages: timer.stages,
        total_duration: start.elapsed(),
    };
    Ok((current, diagnostics))
}

/// Collects [`StageDiagnostics`] as stages run.
#[derive(Default)]
struct StageTimer {
    stages: Vec<StageDiagnostics>,
}

impl StageTimer {
    /// Run a stage that yields an image plus extra data, timing it.
    fn time<T>(
        &mut self,
        stage: StageKind,
        run: impl FnOnce() -> Result<(DynamicImage, T), SkipReason>,
    ) -> Result<(DynamicImage, T), SkipReason> {
        let start = Instant::now();
        let (image, extra) = run()?;
        self.record(stage, start.elapsed(), &image);
        Ok((image, extra))
    }

    /// Run an owned image-to-image stage, timing it.
    fn step(
        &mut self,
        stage: StageKind,
        input: DynamicImage,
        run: impl FnOnce(DynamicImage) -> Result<DynamicImage, SkipReason>,
    ) -> Result<DynamicImage, SkipReason> {
        let start = Instant::now();
        let output = run(input)?;
        self.record(stage, start.elapsed(), &output);
        Ok(output)
    }

    fn record(&mut self, stage: StageKind, duration: Duration, output: &DynamicImage) {
        let diag = StageDiagnostics::of(stage, duration, output);
        tracing::debug!(
            %stage,
            output = %diag.output,
            channels = diag.channels,
            duration_ms = duration.as_secs_f64() * 1000.0,
            "stage complete"
        );
        self.stages.push(diag);
    }
}
