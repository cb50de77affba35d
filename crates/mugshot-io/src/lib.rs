//! mugshot-io: Filesystem I/O for the mugshot pipeline.
//!
//! Reads the input batch (explicit paths and a folder), the cascade asset
//! and the chroma-key background, and writes pipeline outputs as numbered
//! PNG files. Everything here is blocking `std::fs`; the pipeline itself
//! never touches the filesystem.

use std::path::PathBuf;

use mugshot_pipeline::CascadeError;

pub mod cascade;
pub mod load;
pub mod save;

pub use cascade::{DEFAULT_CASCADE_PATH, load_cascade};
pub use load::{LoadIssue, LoadedBatch, list_folder, load_background, load_batch, load_image};
pub use save::{SaveSummary, output_name, save_all};

/// Errors raised while reading inputs or writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The path does not exist.
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    /// Any other filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but is not a readable image.
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        /// File that failed to decode.
        path: PathBuf,
        /// Underlying decoder error.
        source: image::ImageError,
    },

    /// An output image could not be encoded or written.
    #[error("failed to write {}: {source}", .path.display())]
    Encode {
        /// Destination file.
        path: PathBuf,
        /// Underlying encoder error.
        source: image::ImageError,
    },

    /// The cascade asset is not a usable Haar cascade.
    #[error("invalid cascade {}: {source}", .path.display())]
    Cascade {
        /// Cascade file.
        path: PathBuf,
        /// Parse or validation error.
        source: CascadeError,
    },
}

impl IoError {
    /// Map an `io::Error` for `path`, singling out missing files.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io(err)
        }
    }
}
