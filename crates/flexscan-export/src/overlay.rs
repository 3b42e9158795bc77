//! Annotated capture overlay.
//!
//! Draws the measurement on top of the segmentation overlay with
//! `tiny-skia`: the traced centerline, the base-to-tip chord, a ring at
//! the hinge, and the outline of every decoded marker. The result is the
//! image persisted as `capture_<ts>.png`.

use flexscan_pipeline::curvature::MIN_POINTS_FOR_CURVATURE;
use flexscan_pipeline::{CenterlinePath, DetectedMarker, Frame, FrameAnalysis, Point};
use tiny_skia::{Color, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use crate::ExportError;

/// Colors and widths for the overlay layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Centerline stroke color (RGB).
    pub centerline_color: [u8; 3],
    /// Chord stroke color (RGB).
    pub chord_color: [u8; 3],
    /// Hinge ring color (RGB).
    pub hinge_color: [u8; 3],
    /// Marker outline color (RGB).
    pub marker_color: [u8; 3],
    /// Stroke width in pixels.
    pub line_width: f32,
    /// Hinge ring radius in pixels.
    pub hinge_radius: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            centerline_color: [230, 40, 40],
            chord_color: [40, 90, 230],
            hinge_color: [250, 210, 0],
            marker_color: [0, 220, 0],
            line_width: 2.0,
            hinge_radius: 6.0,
        }
    }
}

/// Render the overlay for a full frame analysis on top of its
/// segmentation tint.
///
/// # Errors
///
/// Returns [`ExportError::EmptyCanvas`] for a zero-sized frame.
pub fn render_analysis(
    analysis: &FrameAnalysis,
    style: &OverlayStyle,
) -> Result<Frame, ExportError> {
    let path = &analysis.measurement.path;
    let hinge = (path.len() >= MIN_POINTS_FOR_CURVATURE)
        .then_some(analysis.measurement.analysis.hinge_index);
    render_overlay(
        &analysis.segmentation.overlay,
        path,
        hinge,
        &analysis.calibration.markers,
        style,
    )
}

/// Draw the measurement layers onto a copy of `base`.
///
/// `hinge` indexes into `path`; an out-of-range index draws no ring.
///
/// # Errors
///
/// Returns [`ExportError::EmptyCanvas`] for a zero-sized base image.
pub fn render_overlay(
    base: &Frame,
    path: &CenterlinePath,
    hinge: Option<usize>,
    markers: &[DetectedMarker],
    style: &OverlayStyle,
) -> Result<Frame, ExportError> {
    let (width, height) = base.dimensions();
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return Err(ExportError::EmptyCanvas { width, height });
    };

    // Opaque source pixels are already premultiplied.
    for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(base.pixels()) {
        dst[..3].copy_from_slice(&src.0);
        dst[3] = 255;
    }

    let stroke = Stroke {
        width: style.line_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    for marker in markers {
        if let Some(outline) = closed_path(&marker.corners) {
            stroke_with(&mut pixmap, &outline, style.marker_color, &stroke);
        }
    }

    let points = path.to_points();
    if let (Some(first), Some(last)) = (points.first(), points.last())
        && let Some(chord) = open_path(&[*first, *last])
    {
        stroke_with(&mut pixmap, &chord, style.chord_color, &stroke);
    }
    if let Some(centerline) = open_path(&points) {
        stroke_with(&mut pixmap, &centerline, style.centerline_color, &stroke);
    }
    if let Some(at) = hinge.and_then(|i| points.get(i))
        && let Some(ring) = circle(*at, style.hinge_radius)
    {
        stroke_with(&mut pixmap, &ring, style.hinge_color, &stroke);
    }

    // Every layer is opaque over an opaque base, so alpha stays 255.
    let mut out = Frame::new(width, height);
    for (dst, src) in out.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        dst.0.copy_from_slice(&src[..3]);
    }
    Ok(out)
}

fn stroke_with(pixmap: &mut Pixmap, path: &Path, rgb: [u8; 3], stroke: &Stroke) {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255));
    paint.anti_alias = true;
    pixmap.stroke_path(path, &paint, stroke, Transform::identity(), None);
}

#[allow(clippy::cast_possible_truncation)]
fn open_path(points: &[Point]) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    if rest.is_empty() {
        // A lone point still gets a round dot.
        pb.line_to(first.x as f32, first.y as f32);
    }
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.finish()
}

#[allow(clippy::cast_possible_truncation)]
fn closed_path(points: &[Point]) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    pb.finish()
}

#[allow(clippy::cast_possible_truncation)]
fn circle(center: Point, radius: f32) -> Option<Path> {
    PathBuilder::from_circle(center.x as f32, center.y as f32, radius)
}
