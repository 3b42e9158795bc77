//! flexscan-io: Frame sources, artifact persistence, and the live
//! capture session.
//!
//! Everything that touches the outside world lives here: reading frames
//! from a camera (with the `camera` feature) or a directory, writing
//! captures and their measurement records to disk, the wall clock, and the
//! synchronous acquire -> score -> gate -> burst loop that ties the
//! `flexscan-pipeline` stages together.

pub mod analyze;
pub mod camera;
pub mod clock;
pub mod error;
pub mod live;
pub mod persist;
pub mod source;

pub use analyze::{AnalyzeOptions, ImageAnalysis, analyze_image};
pub use camera::CameraSource;
pub use clock::SystemClock;
pub use error::IoError;
pub use live::{LiveSession, SessionSummary};
pub use persist::{CaptureArtifacts, CaptureSink, DirectorySink};
pub use source::{FrameQueue, FrameSource, FrameSourceSpec, ImageSequence, open_source};
