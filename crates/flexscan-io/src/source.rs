//! Frame sources for the live session.
//!
//! A [`FrameSource`] hands out frames one at a time until it runs dry.
//! Directories of still images replay a recorded session in file-name
//! order. Camera devices are addressed by index and open through
//! [`CameraSource`] (see the `camera` feature).

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use flexscan_pipeline::{Frame, grayscale};
use tracing::debug;

use crate::IoError;
use crate::camera::CameraSource;

/// File extensions accepted as frames (compared case-insensitively).
pub const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Something that produces frames.
pub trait FrameSource {
    /// Read the next frame, or `Ok(None)` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError`] if a frame could not be acquired.
    fn read_frame(&mut self) -> Result<Option<Frame>, IoError>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn read_frame(&mut self) -> Result<Option<Frame>, IoError> {
        (**self).read_frame()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<Option<Frame>, IoError> {
        (**self).read_frame()
    }
}

/// Still images from one directory, replayed in file-name order.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    paths: VecDeque<PathBuf>,
}

impl ImageSequence {
    /// List the image files in `dir`.
    ///
    /// Subdirectories and files with other extensions are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Directory`] if `dir` cannot be listed.
    pub fn open(dir: &Path) -> Result<Self, IoError> {
        let directory_error = |source| IoError::Directory {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(directory_error)? {
            let path = entry.map_err(directory_error)?.path();
            if path.is_file() && has_frame_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        debug!(dir = %dir.display(), frames = paths.len(), "opened image sequence");
        Ok(Self {
            paths: paths.into(),
        })
    }

    /// Frames left to replay.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl FrameSource for ImageSequence {
    fn read_frame(&mut self) -> Result<Option<Frame>, IoError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let bytes = fs::read(&path).map_err(|source| IoError::Read {
            path: path.clone(),
            source,
        })?;
        let frame =
            grayscale::decode_frame(&bytes).map_err(|source| IoError::Decode { path, source })?;
        Ok(Some(frame))
    }
}

/// Frames held in memory.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
}

impl FrameQueue {
    /// Queue `frames` in order.
    #[must_use]
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Append a frame.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }
}

impl FromIterator<Frame> for FrameQueue {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl FrameSource for FrameQueue {
    fn read_frame(&mut self) -> Result<Option<Frame>, IoError> {
        Ok(self.frames.pop_front())
    }
}

/// Where the live session gets its frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSourceSpec {
    /// A camera device by index.
    Device(u32),
    /// A directory of still images.
    Directory(PathBuf),
}

/// Open the source described by `spec`.
///
/// # Errors
///
/// Returns [`IoError::CameraOpen`] if the device cannot be opened (always,
/// when built without the `camera` feature) and [`IoError::Directory`] if
/// a directory cannot be listed.
pub fn open_source(spec: &FrameSourceSpec) -> Result<Box<dyn FrameSource>, IoError> {
    match spec {
        FrameSourceSpec::Device(index) => Ok(Box::new(CameraSource::open(*index)?)),
        FrameSourceSpec::Directory(dir) => Ok(Box::new(ImageSequence::open(dir)?)),
    }
}
