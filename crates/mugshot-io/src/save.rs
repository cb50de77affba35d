//! Output writing: one PNG per processed image.
//!
//! Files are named `img0.png`, `img1.png`, ... by position in the output
//! batch (not by source index), so a batch with skipped images still
//! produces a gap-free sequence.

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use mugshot_pipeline::ProcessedImage;
use tracing::{debug, info, warn};

use crate::IoError;

/// File name for the `index`-th output image.
#[must_use]
pub fn output_name(index: usize) -> String {
    format!("img{index}.png")
}

/// What [`save_all`] wrote.
#[derive(Debug, Default)]
pub struct SaveSummary {
    /// Files written, in output order.
    pub written: Vec<PathBuf>,
    /// Files that could not be written.
    pub failed: Vec<(PathBuf, IoError)>,
}

/// Write every image in `images` to `dir` as PNG.
///
/// The directory is created if needed. A failure on one file is logged
/// and recorded in the summary; the remaining files are still written.
///
/// # Errors
///
/// Returns [`IoError::Io`] only if `dir` cannot be created.
pub fn save_all(images: &[ProcessedImage], dir: &Path) -> Result<SaveSummary, IoError> {
    fs::create_dir_all(dir)?;

    let mut summary = SaveSummary::default();
    for (index, processed) in images.iter().enumerate() {
        let path = dir.join(output_name(index));
        match processed.image.save_with_format(&path, ImageFormat::Png) {
            Ok(()) => {
                debug!(path = %path.display(), source_index = processed.source_index, "wrote");
                summary.written.push(path);
            }
            Err(source) => {
                warn!(path = %path.display(), %source, "failed to write output");
                summary.failed.push((path.clone(), IoError::Encode { path, source }));
            }
        }
    }

    info!(
        dir = %dir.display(),
        written = summary.written.len(),
        failed = summary.failed.len(),
        "outputs saved"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_numbered_pngs() {
        assert_eq!(output_name(0), "img0.png");
        assert_eq!(output_name(12), "img12.png");
    }
}
