//! mugshot-pipeline: Pure portrait standardization pipeline (sans-IO).
//!
//! Turns a batch of portrait photos into uniform headshots through:
//! face location -> padded crop -> resize -> chroma key -> rotate ->
//! grayscale -> circular mask, with every stage after the crop optional.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and returns in-memory images plus a [`BatchReport`]. Reading
//! files, loading the cascade asset and writing PNGs lives in
//! `mugshot-io`.
//!
//! ```rust,no_run
//! # use mugshot_pipeline::{CascadeDetector, HaarCascade, PipelineConfig, process_batch};
//! # use mugshot_pipeline::CascadeError;
//! # fn run(xml: &str, images: Vec<image::DynamicImage>) -> Result<(), CascadeError> {
//! let detector = CascadeDetector::new(HaarCascade::from_xml(xml)?);
//! let config = PipelineConfig::default().with_circle(true);
//! let outcome = process_batch(images, &config, &detector);
//! println!("{}", outcome.report.report());
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod chroma;
pub mod crop;
pub mod detect;
pub mod diagnostics;
pub mod geometry;
pub mod grayscale;
pub mod mask;
pub mod pipeline;
pub mod resize;
pub mod rotate;
pub mod types;

pub use cascade::{CascadeError, HaarCascade};
pub use crop::CropRegion;
pub use detect::{CascadeDetector, FaceLocator, find_face};
pub use diagnostics::{BatchReport, ImageDiagnostics, ImageOutcome, SkipReason, StageKind};
pub use pipeline::{BatchOutcome, process_batch, process_image};
pub use types::{
    Background, Dimensions, PipelineConfig, PipelineError, ProcessedImage, Roi, TargetSize,
};
