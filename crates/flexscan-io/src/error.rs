//! I/O error type.

use std::path::PathBuf;

use flexscan_export::ExportError;
use flexscan_pipeline::PipelineError;

/// Errors that can occur while acquiring frames or persisting results.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The capture device could not be opened.
    #[error("could not open camera {index}: {reason}")]
    CameraOpen {
        /// Device index that was requested.
        index: u32,
        /// Why opening failed.
        reason: String,
    },

    /// A streaming camera failed to deliver a frame.
    #[error("failed to capture from camera {index}: {reason}")]
    CameraCapture {
        /// Device index of the stream.
        index: u32,
        /// Why the capture failed.
        reason: String,
    },

    /// A frame or input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A frame file was read but is not a decodable image.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: PipelineError,
    },

    /// A directory could not be listed or created.
    #[error("directory {} is unusable: {source}", path.display())]
    Directory {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// An output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A pipeline stage failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Serialization or rendering failed.
    #[error(transparent)]
    Export(#[from] ExportError),
}
