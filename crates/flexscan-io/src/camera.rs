//! Camera devices as frame sources.
//!
//! Devices are opened by index through `nokhwa`'s native backend, which
//! is only compiled in with the `camera` feature. Each capture is
//! decoded to RGB and handed out as a [`Frame`]. The stream is stopped
//! when the source is dropped, which happens when the live session that
//! owns it ends.
//!
//! Without the feature, [`CameraSource::open`] fails with
//! [`IoError::CameraOpen`] for every index.

use std::fmt::Display;

use flexscan_pipeline::Frame;
#[cfg(feature = "camera")]
use tracing::{debug, info};

use crate::IoError;
use crate::source::FrameSource;

/// Error for a device that could not be opened.
#[must_use]
pub fn open_error(index: u32, reason: impl Display) -> IoError {
    IoError::CameraOpen {
        index,
        reason: reason.to_string(),
    }
}

/// Error for a frame that could not be captured or decoded.
#[must_use]
pub fn capture_error(index: u32, reason: impl Display) -> IoError {
    IoError::CameraCapture {
        index,
        reason: reason.to_string(),
    }
}

/// A streaming camera device.
#[cfg(feature = "camera")]
pub struct CameraSource {
    index: u32,
    camera: nokhwa::Camera,
}

#[cfg(feature = "camera")]
impl CameraSource {
    /// Open device `index` at its highest frame rate and start streaming.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::CameraOpen`] if the device does not exist or
    /// refuses to stream.
    pub fn open(index: u32) -> Result<Self, IoError> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};

        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = nokhwa::Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| open_error(index, e))?;
        camera.open_stream().map_err(|e| open_error(index, e))?;

        let resolution = camera.resolution();
        info!(
            index,
            name = %camera.info().human_name(),
            width = resolution.width(),
            height = resolution.height(),
            "camera opened"
        );
        Ok(Self { index, camera })
    }

    /// Device index this source reads from.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, IoError> {
        use nokhwa::pixel_format::RgbFormat;

        let buffer = self.camera.frame().map_err(|e| capture_error(self.index, e))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| capture_error(self.index, e))?;
        let (width, height) = decoded.dimensions();
        let frame = Frame::from_raw(width, height, decoded.into_raw()).ok_or_else(|| {
            capture_error(self.index, format!("short {width}x{height} RGB buffer"))
        })?;
        Ok(Some(frame))
    }
}

#[cfg(feature = "camera")]
impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            debug!(index = self.index, error = %err, "stopping camera stream failed");
        }
    }
}

/// Stand-in used when the crate is built without camera support.
///
/// [`CameraSource::open`] never succeeds, so no value of it exists.
#[cfg(not(feature = "camera"))]
#[derive(Debug)]
pub struct CameraSource {
    _unopenable: (),
}

#[cfg(not(feature = "camera"))]
impl CameraSource {
    /// Always fails: no capture backend is compiled in.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::CameraOpen`].
    pub fn open(index: u32) -> Result<Self, IoError> {
        Err(open_error(
            index,
            "built without camera support; enable the `camera` feature or replay frames from a directory",
        ))
    }
}

#[cfg(not(feature = "camera"))]
impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, IoError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failures_map_to_camera_open() {
        let err = open_error(3, "device busy");
        assert!(matches!(
            &err,
            IoError::CameraOpen { index: 3, reason } if reason == "device busy"
        ));
        assert_eq!(err.to_string(), "could not open camera 3: device busy");
    }

    #[test]
    fn capture_failures_map_to_camera_capture() {
        let err = capture_error(1, "timed out");
        assert!(matches!(err, IoError::CameraCapture { index: 1, .. }));
        assert_eq!(err.to_string(), "failed to capture from camera 1: timed out");
    }

    #[test]
    fn missing_device_cannot_be_opened() {
        // No machine running the tests has this many cameras; without the
        // `camera` feature every index fails the same way.
        let result = CameraSource::open(9_999);
        assert!(matches!(result, Err(IoError::CameraOpen { index: 9_999, .. })));
    }
}
