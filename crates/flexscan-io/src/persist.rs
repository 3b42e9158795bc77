//! Writing captures to disk.
//!
//! Each capture is a pair `capture_<ts>.png` + `metrics_<ts>.json`,
//! `<ts>` being the UTC time as `%Y%m%dT%H%M%S%6fZ`. The image is written
//! first and the record second, each to a hidden temporary name that is
//! then renamed into place, so a metrics file never points at a missing
//! image and a half-written file is never visible under its final name.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flexscan_export::{MeasurementRecord, encode_png};
use flexscan_pipeline::Frame;
use tracing::info;

use crate::IoError;

/// `strftime` pattern for artifact timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6fZ";

/// Paths of one persisted capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifacts {
    /// The annotated capture image.
    pub image: PathBuf,
    /// The measurement record.
    pub metrics: PathBuf,
}

/// Destination for completed captures.
pub trait CaptureSink {
    /// Persist the annotated image and its record.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError`] if encoding or writing fails.
    fn persist(
        &mut self,
        overlay: &Frame,
        record: &MeasurementRecord,
    ) -> Result<CaptureArtifacts, IoError>;
}

impl<K: CaptureSink + ?Sized> CaptureSink for &mut K {
    fn persist(
        &mut self,
        overlay: &Frame,
        record: &MeasurementRecord,
    ) -> Result<CaptureArtifacts, IoError> {
        (**self).persist(overlay, record)
    }
}

/// Writes capture pairs into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Use `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Directory`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, IoError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| IoError::Directory {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact paths for `stamp` that do not exist yet.
    ///
    /// Two captures within the same microsecond get `_1`, `_2`, ...
    /// suffixes.
    fn free_artifacts(&self, stamp: &str) -> CaptureArtifacts {
        let mut suffix = 0u32;
        loop {
            let tag = if suffix == 0 {
                stamp.to_owned()
            } else {
                format!("{stamp}_{suffix}")
            };
            let artifacts = CaptureArtifacts {
                image: self.dir.join(format!("capture_{tag}.png")),
                metrics: self.dir.join(format!("metrics_{tag}.json")),
            };
            if !artifacts.image.exists() && !artifacts.metrics.exists() {
                return artifacts;
            }
            suffix += 1;
        }
    }
}

impl CaptureSink for DirectorySink {
    fn persist(
        &mut self,
        overlay: &Frame,
        record: &MeasurementRecord,
    ) -> Result<CaptureArtifacts, IoError> {
        let png = encode_png(overlay)?;
        let json = record.to_json_pretty()?;

        let artifacts = self.free_artifacts(&timestamp(Utc::now()));
        write_atomic(&artifacts.image, &png)?;
        write_atomic(&artifacts.metrics, json.as_bytes())?;

        info!(
            image = %artifacts.image.display(),
            metrics = %artifacts.metrics.display(),
            "capture persisted"
        );
        Ok(artifacts)
    }
}

/// Format `at` as an artifact timestamp.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Write `bytes` to a temporary sibling of `path`, then rename it into
/// place.
///
/// # Errors
///
/// Returns [`IoError::Write`] if writing or renaming fails; the
/// temporary file is removed in that case.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    let write_error = |source| IoError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file_name = path
        .file_name()
        .map_or_else(|| "artifact".into(), |name| name.to_string_lossy());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    if let Err(err) = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path)) {
        // Best effort; the original error is what matters.
        let _ = fs::remove_file(&tmp);
        return Err(write_error(err));
    }
    Ok(())
}

/// Write `frame` as a PNG at `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`IoError::Directory`], [`IoError::Export`], or
/// [`IoError::Write`] on failure.
pub fn write_png(path: &Path, frame: &Frame) -> Result<(), IoError> {
    create_parent(path)?;
    write_atomic(path, &encode_png(frame)?)
}

/// Write `record` as pretty JSON at `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`IoError::Directory`], [`IoError::Export`], or
/// [`IoError::Write`] on failure.
pub fn write_record(path: &Path, record: &MeasurementRecord) -> Result<(), IoError> {
    create_parent(path)?;
    write_atomic(path, record.to_json_pretty()?.as_bytes())
}

fn create_parent(path: &Path) -> Result<(), IoError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| IoError::Directory {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
