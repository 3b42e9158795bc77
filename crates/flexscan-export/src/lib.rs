//! flexscan-export: Pure serializers for flexscan output (sans-IO).
//!
//! Converts pipeline results into their persisted forms: the JSON
//! measurement record, PNG bytes, and the annotated overlay image.
//! Nothing here touches the filesystem; writing is `flexscan-io`'s job.

pub mod error;
pub mod overlay;
pub mod png;
pub mod record;

pub use error::ExportError;
pub use overlay::{OverlayStyle, render_analysis, render_overlay};
pub use png::{encode_gray_png, encode_png};
pub use record::MeasurementRecord;
