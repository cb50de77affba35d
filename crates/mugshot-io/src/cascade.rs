//! Cascade asset loading.

use std::fs;
use std::path::Path;

use mugshot_pipeline::HaarCascade;
use tracing::info;

use crate::IoError;

/// Cascade file looked up when none is given, relative to the working
/// directory.
pub const DEFAULT_CASCADE_PATH: &str = "haarcascade_frontalface_default.xml";

/// Read and parse the Haar cascade at `path`.
///
/// # Errors
///
/// Returns [`IoError::NotFound`] if the file is missing, [`IoError::Io`]
/// if it cannot be read, or [`IoError::Cascade`] if it is not a valid
/// cascade.
pub fn load_cascade(path: &Path) -> Result<HaarCascade, IoError> {
    let xml = fs::read_to_string(path).map_err(|e| IoError::from_io(path, e))?;
    let cascade = HaarCascade::from_xml(&xml).map_err(|source| IoError::Cascade {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        window = %cascade.window(),
        stages = cascade.stage_count(),
        features = cascade.feature_count(),
        "loaded cascade"
    );
    Ok(cascade)
}
