//! Shared types for the flexscan measurement pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// luminance rasters without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference camera
/// frames without depending on `image` directly.
pub use image::RgbImage;

/// A single color camera frame (height x width x 3 channels, 8-bit).
///
/// Frames are treated as immutable once captured. Stages that need to
/// draw on a frame (annotation, overlays) work on a copy.
pub type Frame = RgbImage;

/// Foreground byte value used by [`BinaryMask`] and [`Skeleton`].
pub const FOREGROUND: u8 = 255;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Length of the image diagonal in pixels.
    #[must_use]
    pub fn diagonal(self) -> f64 {
        f64::from(self.width).hypot(f64::from(self.height))
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A binary region-of-interest mask.
///
/// Stored as a `GrayImage` holding only `0` (background) and
/// [`FOREGROUND`] so it can be handed straight to `imageproc`
/// morphology and contour routines.
#[derive(Debug, Clone)]
pub struct BinaryMask(GrayImage);

impl PartialEq for BinaryMask {
    fn eq(&self, other: &Self) -> bool {
        self.0.dimensions() == other.0.dimensions() && self.0.as_raw() == other.0.as_raw()
    }
}

impl Eq for BinaryMask {}

impl BinaryMask {
    /// An all-background mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Build a mask from a predicate evaluated at every `(x, y)`.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            image::Luma([if f(x, y) { FOREGROUND } else { 0 }])
        }))
    }

    /// Wrap a grayscale raster, treating any non-zero value as foreground.
    #[must_use]
    pub fn from_gray(mut gray: GrayImage) -> Self {
        for p in gray.pixels_mut() {
            if p.0[0] != 0 {
                p.0[0] = FOREGROUND;
            }
        }
        Self(gray)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }

    /// Returns `true` if `(x, y)` is inside the mask and foreground.
    #[must_use]
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.0.width() && y < self.0.height() && self.0.get_pixel(x, y).0[0] != 0
    }

    /// Mark `(x, y)` as foreground or background.
    ///
    /// Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.0.width() && y < self.0.height() {
            self.0.put_pixel(x, y, image::Luma([if value { FOREGROUND } else { 0 }]));
        }
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn count_foreground(&self) -> u64 {
        self.0.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
    }

    /// Foreground area as a fraction of the mask area (0 for an empty raster).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn foreground_ratio(&self) -> f64 {
        let area = self.dimensions().area();
        if area == 0 {
            return 0.0;
        }
        self.count_foreground() as f64 / area as f64
    }

    /// Returns `true` if no pixel is foreground.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.pixels().all(|p| p.0[0] == 0)
    }

    /// Borrow the underlying 0/255 raster.
    #[must_use]
    pub const fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask and return the underlying raster.
    #[must_use]
    pub fn into_gray(self) -> GrayImage {
        self.0
    }
}

/// The 1-pixel-wide medial set of a [`BinaryMask`].
///
/// Every skeleton pixel is a foreground pixel of the mask it was
/// derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton(BinaryMask);

impl Skeleton {
    /// Wrap a mask that already holds a skeleton.
    #[must_use]
    pub const fn new(mask: BinaryMask) -> Self {
        Self(mask)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Returns `true` if `(x, y)` is a skeleton pixel.
    #[must_use]
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.0.is_set(x, y)
    }

    /// Number of skeleton pixels.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        self.0.count_foreground()
    }

    /// Borrow the skeleton as a mask.
    #[must_use]
    pub const fn as_mask(&self) -> &BinaryMask {
        &self.0
    }
}

/// An integer pixel coordinate.
///
/// Field order makes the derived `Ord` row-major: `row` first, then
/// `col`, which is the order the centerline tracer uses to pick its
/// start point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    /// Row index (pixels from top edge).
    pub row: u32,
    /// Column index (pixels from left edge).
    pub col: u32,
}

impl PixelCoord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Squared Euclidean distance to another coordinate.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> u64 {
        let dr = self.row.abs_diff(other.row) as u64;
        let dc = self.col.abs_diff(other.col) as u64;
        dr * dr + dc * dc
    }

    /// The coordinate as a floating-point [`Point`] (`x = col`, `y = row`).
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.col), f64::from(self.row))
    }
}

/// An ordered centerline from one extremity (base) to the other (tip).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterlinePath(Vec<PixelCoord>);

impl CenterlinePath {
    /// Create a new path from ordered coordinates.
    #[must_use]
    pub const fn new(coords: Vec<PixelCoord>) -> Self {
        Self(coords)
    }

    /// Returns `true` if the path has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the base of the path, if any.
    #[must_use]
    pub fn first(&self) -> Option<&PixelCoord> {
        self.0.first()
    }

    /// Returns the tip of the path, if any.
    #[must_use]
    pub fn last(&self) -> Option<&PixelCoord> {
        self.0.last()
    }

    /// Returns a slice of all coordinates.
    #[must_use]
    pub fn coords(&self) -> &[PixelCoord] {
        &self.0
    }

    /// The path as floating-point points (`x = col`, `y = row`).
    #[must_use]
    pub fn to_points(&self) -> Vec<Point> {
        self.0.iter().map(|c| c.to_point()).collect()
    }
}

/// Errors that can occur in the measurement pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image had no data or no pixels.
    #[error("input image data is empty")]
    EmptyInput,

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A raster did not match the frame it was derived from.
    #[error("{what} is {actual}, expected {expected}")]
    DimensionMismatch {
        /// Which raster was checked.
        what: &'static str,
        /// Dimensions of the source frame.
        expected: Dimensions,
        /// Dimensions actually received.
        actual: Dimensions,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_coord_orders_row_major() {
        let mut coords = vec![
            PixelCoord::new(2, 0),
            PixelCoord::new(1, 5),
            PixelCoord::new(1, 2),
        ];
        coords.sort();
        assert_eq!(
            coords,
            vec![
                PixelCoord::new(1, 2),
                PixelCoord::new(1, 5),
                PixelCoord::new(2, 0),
            ]
        );
    }

    #[test]
    fn from_gray_normalizes_nonzero_to_foreground() {
        let gray = GrayImage::from_fn(3, 1, |x, _| image::Luma([[0, 1, 200][x as usize]]));
        let mask = BinaryMask::from_gray(gray);
        assert_eq!(mask.as_gray().as_raw(), &vec![0, FOREGROUND, FOREGROUND]);
        assert_eq!(mask.count_foreground(), 2);
    }

    #[test]
    fn foreground_ratio_of_quarter_mask() {
        let mask = BinaryMask::from_fn(4, 4, |x, y| x < 2 && y < 2);
        assert!((mask.foreground_ratio() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn foreground_ratio_of_empty_raster_is_zero() {
        assert!(BinaryMask::new(0, 0).foreground_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn is_set_outside_bounds_is_false() {
        let mask = BinaryMask::from_fn(2, 2, |_, _| true);
        assert!(mask.is_set(1, 1));
        assert!(!mask.is_set(2, 0));
        assert!(!mask.is_set(0, 2));
    }

    #[test]
    fn diagonal_of_3_4_frame() {
        let dims = Dimensions {
            width: 3,
            height: 4,
        };
        assert!((dims.diagonal() - 5.0).abs() < 1e-12);
        assert_eq!(dims.area(), 12);
        assert_eq!(dims.to_string(), "3x4");
    }

    #[test]
    fn pixel_coord_to_point_swaps_axes() {
        let p = PixelCoord::new(7, 3).to_point();
        assert_eq!(p, Point::new(3.0, 7.0));
    }
}
