//! Input loading: explicit image paths, a folder of images, and the
//! chroma-key background.
//!
//! Every image is decoded with the `image` crate and converted to 8-bit
//! RGB before it reaches the pipeline. A file that is missing or does not
//! decode is reported as a [`LoadIssue`] and the rest of the batch still
//! loads.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use mugshot_pipeline::Background;
use tracing::{debug, info, warn};

use crate::IoError;

/// An input that could not be loaded.
#[derive(Debug)]
pub struct LoadIssue {
    /// The path that failed (a file, or the folder itself).
    pub path: PathBuf,
    /// What went wrong.
    pub error: IoError,
}

/// The decoded input batch.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    /// Decoded RGB images, in load order.
    pub images: Vec<DynamicImage>,
    /// Source path of each image (parallel to `images`).
    pub sources: Vec<PathBuf>,
    /// Inputs that were skipped.
    pub issues: Vec<LoadIssue>,
}

impl LoadedBatch {
    /// Whether no image was loaded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn push(&mut self, path: PathBuf) {
        match load_image(&path) {
            Ok(image) => {
                debug!(
                    path = %path.display(),
                    width = image.width(),
                    height = image.height(),
                    "loaded"
                );
                self.images.push(image);
                self.sources.push(path);
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping input");
                self.issues.push(LoadIssue { path, error });
            }
        }
    }
}

/// Decode the image at `path` and convert it to RGB.
///
/// # Errors
///
/// Returns [`IoError::NotFound`] if the file does not exist,
/// [`IoError::Decode`] if its content is not a supported image.
pub fn load_image(path: &Path) -> Result<DynamicImage, IoError> {
    let reader = ImageReader::open(path)
        .map_err(|e| IoError::from_io(path, e))?
        .with_guessed_format()
        .map_err(|e| IoError::from_io(path, e))?;
    let image = reader.decode().map_err(|source| IoError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(DynamicImage::ImageRgb8(image.into_rgb8()))
}

/// Load the chroma-key background.
///
/// # Errors
///
/// Same as [`load_image`].
pub fn load_background(path: &Path) -> Result<Background, IoError> {
    let image = load_image(path)?;
    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded background"
    );
    Ok(Background::new(image.into_rgb8()))
}

/// Regular files directly inside `folder`, sorted by file name.
///
/// # Errors
///
/// Returns [`IoError::NotFound`] if the folder does not exist, or
/// [`IoError::Io`] if it cannot be listed.
pub fn list_folder(folder: &Path) -> Result<Vec<PathBuf>, IoError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder).map_err(|e| IoError::from_io(folder, e))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Load `paths` in order, then every file in `folder`.
///
/// Problems are per item: a missing or undecodable file, or an unreadable
/// folder, becomes a [`LoadIssue`] and loading carries on.
#[must_use]
pub fn load_batch(paths: &[PathBuf], folder: Option<&Path>) -> LoadedBatch {
    let mut batch = LoadedBatch::default();

    if paths.is_empty() && folder.is_none() {
        warn!("No images provided.");
        return batch;
    }

    for path in paths {
        batch.push(path.clone());
    }

    if let Some(folder) = folder {
        match list_folder(folder) {
            Ok(files) => {
                debug!(folder = %folder.display(), count = files.len(), "listed folder");
                for file in files {
                    batch.push(file);
                }
            }
            Err(error) => {
                warn!(folder = %folder.display(), %error, "cannot read folder");
                batch.issues.push(LoadIssue {
                    path: folder.to_path_buf(),
                    error,
                });
            }
        }
    }

    info!(
        loaded = batch.images.len(),
        skipped = batch.issues.len(),
        "input batch ready"
    );
    batch
}
