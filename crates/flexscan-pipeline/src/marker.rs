//! Square fiducial marker detection.
//!
//! Markers are 6x6 module squares: a one-module black border around a
//! 4x4 payload, printed on a white quiet zone. A payload bit of 1 is a
//! white module. The payload is matched against a [`MarkerDictionary`]
//! in all four rotations, so the marker may appear at any orientation.
//!
//! # Detection steps
//!
//! 1. Binarize the luminance image with a global Otsu level (dark pixels
//!    become foreground).
//! 2. Trace the outer borders of the dark regions with
//!    [`imageproc::contours::find_contours`].
//! 3. Approximate each border by a polygon and keep convex
//!    quadrilaterals of plausible size away from the image edge.
//! 4. Sample the 6x6 module grid through the perspective map from the
//!    module grid to the quadrilateral.
//! 5. Require a dark border and look the payload up in the dictionary.
//!
//! Corners are reported clockwise on screen, starting from the first
//! border pixel found in raster order.

use image::GrayImage;
use imageproc::contours::BorderType;
use imageproc::geometric_transformations::Projection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::simplify;
use crate::types::Point;

/// Modules along one side of a marker, border included.
pub const MARKER_MODULES: u32 = 6;

/// Payload bits along one side of a marker.
pub const PAYLOAD_BITS: u32 = 4;

/// Payload codes of [`MarkerDictionary::Square4x4`].
///
/// Each code is the 4x4 payload read row by row, most significant bit
/// first, with 1 meaning a white module.
const SQUARE_4X4_CODES: [u16; 8] = [
    0xB532, 0x0F9A, 0x332D, 0x9946, 0x549E, 0x79CD, 0x9E2E, 0xC4F2,
];

/// A set of marker payloads that the detector recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkerDictionary {
    /// Eight 4x4 payloads, ids 0 through 7.
    #[default]
    Square4x4,
}

impl MarkerDictionary {
    /// All payload codes, indexed by marker id.
    #[must_use]
    pub const fn codes(self) -> &'static [u16] {
        match self {
            Self::Square4x4 => &SQUARE_4X4_CODES,
        }
    }

    /// Payload code for `id`, if the dictionary has one.
    #[must_use]
    pub fn code(self, id: u16) -> Option<u16> {
        self.codes().get(usize::from(id)).copied()
    }

    /// Best dictionary match for an observed payload over all four
    /// rotations: `(id, rotation, hamming distance)`.
    ///
    /// `rotation` is the number of clockwise quarter turns applied to the
    /// observed payload to reach the dictionary code.
    #[must_use]
    pub fn best_match(self, observed: u16) -> Option<(u16, u8, u32)> {
        let mut best: Option<(u16, u8, u32)> = None;
        let mut rotated = observed;
        for rotation in 0..4u8 {
            for (id, &code) in self.codes().iter().enumerate() {
                let distance = (rotated ^ code).count_ones();
                if best.is_none_or(|(_, _, d)| distance < d) {
                    let id = u16::try_from(id).ok()?;
                    best = Some((id, rotation, distance));
                }
            }
            rotated = rotate_payload_cw(rotated);
        }
        best
    }
}

/// Payload bit at (`row`, `col`); `true` means a white module.
#[must_use]
pub const fn payload_bit(code: u16, row: u32, col: u32) -> bool {
    let shift = PAYLOAD_BITS * PAYLOAD_BITS - 1 - (row * PAYLOAD_BITS + col);
    (code >> shift) & 1 == 1
}

/// Rotate a 4x4 payload a quarter turn clockwise.
#[must_use]
pub const fn rotate_payload_cw(code: u16) -> u16 {
    let n = PAYLOAD_BITS;
    let mut out = 0u16;
    let mut row = 0;
    while row < n {
        let mut col = 0;
        while col < n {
            // The new (row, col) comes from old (n - 1 - col, row).
            if payload_bit(code, n - 1 - col, row) {
                out |= 1 << (n * n - 1 - (row * n + col));
            }
            col += 1;
        }
        row += 1;
    }
    out
}

/// Tunables for [`MarkerDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Which payload set to match against.
    pub dictionary: MarkerDictionary,
    /// Shortest accepted quadrilateral side, in pixels.
    pub min_side_px: f64,
    /// Largest accepted ratio between the longest and shortest side.
    pub max_side_ratio: f64,
    /// Polygon approximation tolerance as a fraction of the border length.
    pub approx_epsilon_ratio: f64,
    /// Minimum distance between a corner and the image edge, in pixels.
    pub min_border_distance_px: f64,
    /// Minimum difference between the darkest and brightest module means.
    pub min_module_contrast: f64,
    /// Largest accepted Hamming distance to a dictionary code.
    pub max_correction_bits: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            dictionary: MarkerDictionary::default(),
            min_side_px: 10.0,
            max_side_ratio: 4.0,
            approx_epsilon_ratio: 0.05,
            min_border_distance_px: 3.0,
            min_module_contrast: 30.0,
            max_correction_bits: 0,
        }
    }
}

/// A decoded marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    /// Dictionary id.
    pub id: u16,
    /// Clockwise quarter turns between the observed and reference payload.
    pub rotation: u8,
    /// Corners in detection order, clockwise on screen.
    pub corners: [Point; 4],
    /// Hamming distance between the observed payload and the code.
    pub hamming_distance: u32,
}

impl DetectedMarker {
    /// Lengths of the four sides, corner `i` to corner `i + 1`.
    #[must_use]
    pub fn side_lengths(&self) -> [f64; 4] {
        std::array::from_fn(|i| self.corners[i].distance(self.corners[(i + 1) % 4]))
    }

    /// Mean side length in pixels.
    #[must_use]
    pub fn mean_side_px(&self) -> f64 {
        self.side_lengths().iter().sum::<f64>() / 4.0
    }
}

/// Square fiducial detector.
#[derive(Debug, Clone, Default)]
pub struct MarkerDetector {
    config: DetectorConfig,
}

impl MarkerDetector {
    /// Create a detector with the given tunables.
    #[must_use]
    pub const fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// The detector's tunables.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Find and decode every marker in a luminance image.
    #[must_use = "returns the detected markers"]
    pub fn detect(&self, gray: &GrayImage) -> Vec<DetectedMarker> {
        if gray.width() == 0 || gray.height() == 0 {
            return Vec::new();
        }

        let level = imageproc::contrast::otsu_level(gray);
        let dark = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            image::Luma([if gray.get_pixel(x, y).0[0] <= level { 255 } else { 0 }])
        });

        let contours: Vec<imageproc::contours::Contour<u32>> =
            imageproc::contours::find_contours(&dark);
        let candidates = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .filter_map(|c| self.quad_candidate(c, gray.width(), gray.height()));

        let mut markers = Vec::new();
        for corners in candidates {
            if let Some(marker) = self.decode(gray, corners) {
                debug!(
                    id = marker.id,
                    rotation = marker.rotation,
                    side_px = marker.mean_side_px(),
                    "decoded marker"
                );
                markers.push(marker);
            }
        }
        markers
    }

    /// Reduce a traced border to four clockwise corners, or reject it.
    #[allow(clippy::cast_precision_loss)]
    fn quad_candidate(
        &self,
        contour: &imageproc::contours::Contour<u32>,
        width: u32,
        height: u32,
    ) -> Option<[Point; 4]> {
        // A border shorter than four minimal sides cannot enclose a marker.
        if contour.points.len() < 4
            || (contour.points.len() as f64) < 4.0 * self.config.min_side_px
        {
            return None;
        }

        let border: Vec<Point> = contour
            .points
            .iter()
            .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
            .collect();
        let epsilon = self.config.approx_epsilon_ratio * simplify::closed_perimeter(&border);
        let polygon = simplify::simplify_closed(&border, epsilon);
        let mut corners: [Point; 4] = polygon.try_into().ok()?;

        if !is_convex(&corners) {
            return None;
        }
        if signed_area(&corners) < 0.0 {
            corners.swap(1, 3);
        }

        let margin = self.config.min_border_distance_px;
        let max_x = f64::from(width) - 1.0 - margin;
        let max_y = f64::from(height) - 1.0 - margin;
        if corners
            .iter()
            .any(|c| c.x < margin || c.y < margin || c.x > max_x || c.y > max_y)
        {
            return None;
        }

        let sides: [f64; 4] = std::array::from_fn(|i| corners[i].distance(corners[(i + 1) % 4]));
        let shortest = sides.iter().copied().fold(f64::INFINITY, f64::min);
        let longest = sides.iter().copied().fold(0.0, f64::max);
        if shortest < self.config.min_side_px || longest > shortest * self.config.max_side_ratio {
            return None;
        }

        Some(corners)
    }

    /// Sample the module grid inside `corners` and match its payload.
    #[allow(clippy::cast_possible_truncation)]
    fn decode(&self, gray: &GrayImage, corners: [Point; 4]) -> Option<DetectedMarker> {
        let m = MARKER_MODULES as f32;
        let grid = [(0.0, 0.0), (m, 0.0), (m, m), (0.0, m)];
        let quad = corners.map(|c| (c.x as f32, c.y as f32));
        let projection = Projection::from_control_points(grid, quad)?;

        let mut means = [[0.0f64; MARKER_MODULES as usize]; MARKER_MODULES as usize];
        for (row, row_means) in means.iter_mut().enumerate() {
            for (col, mean) in row_means.iter_mut().enumerate() {
                *mean = sample_module(gray, &projection, row, col)?;
            }
        }

        let flat = means.iter().flatten().copied();
        let darkest = flat.clone().fold(f64::INFINITY, f64::min);
        let brightest = flat.fold(0.0, f64::max);
        if brightest - darkest < self.config.min_module_contrast {
            return None;
        }
        let threshold = f64::midpoint(darkest, brightest);

        let last = MARKER_MODULES as usize - 1;
        for (row, row_means) in means.iter().enumerate() {
            for (col, &mean) in row_means.iter().enumerate() {
                let on_border = row == 0 || col == 0 || row == last || col == last;
                if on_border && mean >= threshold {
                    return None;
                }
            }
        }

        let mut observed = 0u16;
        for row in 0..PAYLOAD_BITS as usize {
            for col in 0..PAYLOAD_BITS as usize {
                observed <<= 1;
                if means[row + 1][col + 1] >= threshold {
                    observed |= 1;
                }
            }
        }

        let (id, rotation, hamming_distance) = self.config.dictionary.best_match(observed)?;
        if hamming_distance > self.config.max_correction_bits {
            return None;
        }

        Some(DetectedMarker {
            id,
            rotation,
            corners,
            hamming_distance,
        })
    }
}

/// Mean luminance of a 3x3 sample pattern inside module (`row`, `col`).
///
/// Returns `None` if any sample falls outside the image.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn sample_module(
    gray: &GrayImage,
    projection: &Projection,
    row: usize,
    col: usize,
) -> Option<f64> {
    const OFFSETS: [f32; 3] = [0.25, 0.5, 0.75];
    let mut sum = 0.0;
    for dv in OFFSETS {
        for du in OFFSETS {
            let (x, y) = *projection * (col as f32 + du, row as f32 + dv);
            let (x, y) = (x.round(), y.round());
            if x < 0.0 || y < 0.0 || x >= gray.width() as f32 || y >= gray.height() as f32 {
                return None;
            }
            sum += f64::from(gray.get_pixel(x as u32, y as u32).0[0]);
        }
    }
    Some(sum / 9.0)
}

/// Twice the signed area of a polygon in image coordinates (positive
/// when the vertices run clockwise on screen).
fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x.mul_add(b.y, -(b.x * a.y))
        })
        .sum()
}

/// Whether a quadrilateral is strictly convex.
fn is_convex(corners: &[Point; 4]) -> bool {
    let cross: [f64; 4] = std::array::from_fn(|i| {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        (b.x - a.x).mul_add(c.y - b.y, -((b.y - a.y) * (c.x - b.x)))
    });
    cross.iter().all(|&z| z > 0.0) || cross.iter().all(|&z| z < 0.0)
}

/// Render marker `id` as a printable image: white quiet zone of
/// `quiet_modules` modules, black border, payload with white ones.
///
/// Returns `None` for an unknown id or a zero module size.
#[must_use]
pub fn render_marker(
    dictionary: MarkerDictionary,
    id: u16,
    module_px: u32,
    quiet_modules: u32,
) -> Option<GrayImage> {
    let code = dictionary.code(id)?;
    if module_px == 0 {
        return None;
    }
    let modules = MARKER_MODULES + 2 * quiet_modules;
    let size = modules.checked_mul(module_px)?;

    Some(GrayImage::from_fn(size, size, |x, y| {
        let (mx, my) = (x / module_px, y / module_px);
        let inside = (quiet_modules..quiet_modules + MARKER_MODULES).contains(&mx)
            && (quiet_modules..quiet_modules + MARKER_MODULES).contains(&my);
        let white = if inside {
            let (col, row) = (mx - quiet_modules, my - quiet_modules);
            let on_border = row == 0 || col == 0 || row == MARKER_MODULES - 1 || col == MARKER_MODULES - 1;
            !on_border && payload_bit(code, row - 1, col - 1)
        } else {
            true
        };
        image::Luma([if white { 255 } else { 0 }])
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// White canvas with marker `id` pasted at (`left`, `top`).
    fn canvas_with_marker(
        width: u32,
        height: u32,
        id: u16,
        module_px: u32,
        left: u32,
        top: u32,
    ) -> GrayImage {
        let marker = render_marker(MarkerDictionary::Square4x4, id, module_px, 0).unwrap();
        let mut canvas = GrayImage::from_pixel(width, height, image::Luma([255]));
        image::imageops::replace(&mut canvas, &marker, i64::from(left), i64::from(top));
        canvas
    }

    #[test]
    fn rotation_four_times_is_identity() {
        for &code in MarkerDictionary::Square4x4.codes() {
            let mut rotated = code;
            for _ in 0..4 {
                rotated = rotate_payload_cw(rotated);
            }
            assert_eq!(rotated, code);
        }
    }

    #[test]
    fn rotate_moves_top_left_to_top_right() {
        // Only (0, 0) set.
        let code = 0x8000;
        let rotated = rotate_payload_cw(code);
        assert!(payload_bit(rotated, 0, 3));
        assert_eq!(rotated.count_ones(), 1);
    }

    #[test]
    fn dictionary_codes_are_unique_under_rotation() {
        let codes = MarkerDictionary::Square4x4.codes();
        for (i, &a) in codes.iter().enumerate() {
            let mut rotated = a;
            for turn in 0..4 {
                for (j, &b) in codes.iter().enumerate() {
                    if i != j {
                        assert_ne!(rotated, b, "code {i} turned {turn} times equals code {j}");
                    }
                }
                if turn > 0 {
                    assert_ne!(rotated, a, "code {i} is rotationally symmetric");
                }
                rotated = rotate_payload_cw(rotated);
            }
        }
    }

    #[test]
    fn best_match_recovers_rotated_code() {
        let code = MarkerDictionary::Square4x4.code(3).unwrap();
        let turned = rotate_payload_cw(code);
        // Three more clockwise turns bring it back.
        let (id, rotation, distance) = MarkerDictionary::Square4x4.best_match(turned).unwrap();
        assert_eq!((id, rotation, distance), (3, 3, 0));
    }

    #[test]
    fn render_marker_has_black_border_and_white_quiet_zone() {
        let img = render_marker(MarkerDictionary::Square4x4, 0, 4, 1).unwrap();
        assert_eq!(img.dimensions(), (32, 32));
        assert_eq!(img.get_pixel(1, 1).0[0], 255, "quiet zone");
        assert_eq!(img.get_pixel(5, 5).0[0], 0, "border module");
        // Payload (0, 0) of code 0 is 1 (0xB532 starts with bit 1).
        assert_eq!(img.get_pixel(9, 9).0[0], 255, "first payload module");
    }

    #[test]
    fn render_unknown_id_is_none() {
        assert!(render_marker(MarkerDictionary::Square4x4, 99, 4, 1).is_none());
        assert!(render_marker(MarkerDictionary::Square4x4, 0, 0, 1).is_none());
    }

    #[test]
    fn detects_upright_marker_and_its_size() {
        let gray = canvas_with_marker(200, 160, 0, 10, 50, 40);
        let markers = MarkerDetector::default().detect(&gray);

        assert_eq!(markers.len(), 1, "expected exactly one marker");
        let marker = markers[0];
        assert_eq!(marker.id, 0);
        assert_eq!(marker.hamming_distance, 0);
        // Border pixel centers span 59 px on a 60 px marker.
        assert!(
            (marker.mean_side_px() - 59.0).abs() < 1.0,
            "mean side {}",
            marker.mean_side_px()
        );
    }

    #[test]
    fn detects_marker_of_each_id() {
        for id in 0..8 {
            let gray = canvas_with_marker(160, 160, id, 8, 40, 50);
            let markers = MarkerDetector::default().detect(&gray);
            assert_eq!(markers.len(), 1, "id {id}");
            assert_eq!(markers[0].id, id);
        }
    }

    #[test]
    fn detects_rotated_marker() {
        let upright = render_marker(MarkerDictionary::Square4x4, 5, 10, 0).unwrap();
        let turned = image::imageops::rotate90(&upright);
        let mut canvas = GrayImage::from_pixel(160, 160, image::Luma([255]));
        image::imageops::replace(&mut canvas, &turned, 50, 50);

        let markers = MarkerDetector::default().detect(&canvas);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, 5);
    }

    #[test]
    fn corners_run_clockwise() {
        let gray = canvas_with_marker(200, 160, 2, 10, 50, 40);
        let markers = MarkerDetector::default().detect(&gray);
        assert_eq!(markers.len(), 1);
        assert!(signed_area(&markers[0].corners) > 0.0);
    }

    #[test]
    fn blank_image_has_no_markers() {
        let gray = GrayImage::from_pixel(100, 100, image::Luma([200]));
        assert!(MarkerDetector::default().detect(&gray).is_empty());
    }

    #[test]
    fn plain_black_square_is_not_a_marker() {
        let gray = GrayImage::from_fn(120, 120, |x, y| {
            let inside = (30..90).contains(&x) && (30..90).contains(&y);
            image::Luma([if inside { 0 } else { 255 }])
        });
        assert!(MarkerDetector::default().detect(&gray).is_empty());
    }

    #[test]
    fn marker_touching_the_edge_is_rejected() {
        let gray = canvas_with_marker(100, 100, 0, 10, 0, 20);
        assert!(MarkerDetector::default().detect(&gray).is_empty());
    }

    #[test]
    fn mean_side_of_axis_aligned_marker() {
        let marker = DetectedMarker {
            id: 0,
            rotation: 0,
            corners: [
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            hamming_distance: 0,
        };
        assert_eq!(marker.side_lengths(), [10.0; 4]);
        assert!((marker.mean_side_px() - 10.0).abs() < 1e-12);
    }
}
