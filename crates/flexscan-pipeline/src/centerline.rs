//! Centerline tracing: order skeleton pixels from base to tip.
//!
//! A skeleton is an unordered set of pixels. Curvature analysis needs an
//! ordered path, so the tracer picks a deterministic start pixel and
//! walks the skeleton greedily.
//!
//! # Start point
//!
//! An *endpoint* is a skeleton pixel with exactly one 8-connected
//! skeleton neighbor. If any exist, the walk starts at the smallest one
//! in row-major order (top-most, then left-most). Closed loops have no
//! endpoints; the walk then starts at the first skeleton pixel in
//! row-major order.
//!
//! # Walk
//!
//! From the current pixel, candidates are the unvisited 8-neighbors
//! excluding the pixel we just came from. The nearest candidate wins
//! (orthogonal steps beat diagonal ones). If that set is empty the
//! previous pixel is allowed back in, which in practice only matters
//! for the first step. The walk ends when no unvisited neighbor is left.
//!
//! Ties go to the first neighbor in enumeration order: rows top to
//! bottom, then columns left to right.
//!
//! At a branch point the walk follows one branch and abandons the
//! others. The visited set guarantees termination and that no pixel
//! appears twice.
//!
//! Thick straight bars show both limitations. The skeleton keeps a
//! one-pixel spur at each corner, and the top-left spur is the first
//! endpoint, so the walk starts diagonally off the core row: a 3 px
//! bar reads about 18 degrees of curvature instead of 0. An even
//! thickness leaves two parallel core rows; the walk runs out along one
//! and back along the other, so a 4 px bar has a chord of 3 px, an arc
//! of twice its length, and 90 degrees of curvature.

use std::collections::HashSet;

use crate::types::{CenterlinePath, PixelCoord, Skeleton};

/// The eight neighbor offsets in enumeration order (row-major).
const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Skeleton pixels adjacent to `at`, in enumeration order.
fn neighbors(skeleton: &Skeleton, at: PixelCoord) -> impl Iterator<Item = PixelCoord> + '_ {
    NEIGHBOR_OFFSETS.iter().filter_map(move |&(dr, dc)| {
        let row = u32::try_from(i64::from(at.row) + dr).ok()?;
        let col = u32::try_from(i64::from(at.col) + dc).ok()?;
        skeleton
            .is_set(col, row)
            .then_some(PixelCoord::new(row, col))
    })
}

/// All skeleton pixels in row-major order.
fn skeleton_pixels(skeleton: &Skeleton) -> Vec<PixelCoord> {
    let mut pixels = Vec::new();
    for row in 0..skeleton.height() {
        for col in 0..skeleton.width() {
            if skeleton.is_set(col, row) {
                pixels.push(PixelCoord::new(row, col));
            }
        }
    }
    pixels
}

/// Skeleton pixels with exactly one 8-connected skeleton neighbor, in
/// row-major order.
#[must_use]
pub fn endpoints(skeleton: &Skeleton) -> Vec<PixelCoord> {
    skeleton_pixels(skeleton)
        .into_iter()
        .filter(|&p| neighbors(skeleton, p).count() == 1)
        .collect()
}

/// Trace an ordered centerline through `skeleton`.
///
/// Returns an empty path for an empty skeleton and a single point for a
/// one-pixel skeleton. The path never contains the same pixel twice.
#[must_use = "returns the traced centerline"]
pub fn trace_centerline(skeleton: &Skeleton) -> CenterlinePath {
    let pixels = skeleton_pixels(skeleton);
    let Some(&first) = pixels.first() else {
        return CenterlinePath::default();
    };

    // `pixels` is row-major, so the first endpoint found is the smallest.
    let start = pixels
        .iter()
        .copied()
        .find(|&p| neighbors(skeleton, p).count() == 1)
        .unwrap_or(first);

    let mut path = Vec::with_capacity(pixels.len());
    let mut visited = HashSet::with_capacity(pixels.len());
    let mut previous: Option<PixelCoord> = None;
    let mut current = start;

    loop {
        path.push(current);
        visited.insert(current);

        let nearest = |allow_previous: bool| {
            neighbors(skeleton, current)
                .filter(|n| !visited.contains(n))
                .filter(|n| allow_previous || Some(*n) != previous)
                .min_by_key(|n| n.distance_squared(current))
        };

        let Some(next) = nearest(false).or_else(|| nearest(true)) else {
            break;
        };
        previous = Some(current);
        current = next;
    }

    CenterlinePath::new(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BinaryMask;

    fn skeleton_from(width: u32, height: u32, f: impl FnMut(u32, u32) -> bool) -> Skeleton {
        Skeleton::new(BinaryMask::from_fn(width, height, f))
    }

    fn assert_no_duplicates(path: &CenterlinePath) {
        let unique: HashSet<_> = path.coords().iter().collect();
        assert_eq!(unique.len(), path.len(), "path revisits a pixel");
    }

    fn assert_steps_are_adjacent(path: &CenterlinePath) {
        for pair in path.coords().windows(2) {
            assert!(
                pair[0].distance_squared(pair[1]) <= 2,
                "{:?} -> {:?} is not an 8-neighbor step",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn empty_skeleton_gives_empty_path() {
        let path = trace_centerline(&skeleton_from(10, 10, |_, _| false));
        assert!(path.is_empty());
    }

    #[test]
    fn single_pixel_gives_one_point() {
        let path = trace_centerline(&skeleton_from(5, 5, |x, y| x == 3 && y == 1));
        assert_eq!(path.coords(), &[PixelCoord::new(1, 3)]);
    }

    #[test]
    fn horizontal_line_is_traced_left_to_right() {
        let path = trace_centerline(&skeleton_from(50, 20, |x, y| {
            y == 10 && (5..=45).contains(&x)
        }));
        assert_eq!(path.len(), 41);
        assert_eq!(path.first(), Some(&PixelCoord::new(10, 5)));
        assert_eq!(path.last(), Some(&PixelCoord::new(10, 45)));
        assert_steps_are_adjacent(&path);
    }

    #[test]
    fn vertical_line_starts_at_top() {
        let path = trace_centerline(&skeleton_from(10, 30, |x, y| x == 4 && (3..=20).contains(&y)));
        assert_eq!(path.first(), Some(&PixelCoord::new(3, 4)));
        assert_eq!(path.last(), Some(&PixelCoord::new(20, 4)));
        assert_eq!(path.len(), 18);
    }

    #[test]
    fn start_is_smallest_endpoint_row_major() {
        // Diagonal from bottom-left to top-right: top-right end is row-major first.
        let path = trace_centerline(&skeleton_from(20, 20, |x, y| x + y == 19 && (2..=17).contains(&x)));
        assert_eq!(path.first(), Some(&PixelCoord::new(2, 17)));
        assert_eq!(path.last(), Some(&PixelCoord::new(17, 2)));
        assert_eq!(path.len(), 16);
    }

    #[test]
    fn endpoints_of_a_line_are_its_two_ends() {
        let skeleton = skeleton_from(50, 20, |x, y| y == 10 && (5..=45).contains(&x));
        assert_eq!(
            endpoints(&skeleton),
            vec![PixelCoord::new(10, 5), PixelCoord::new(10, 45)]
        );
    }

    #[test]
    fn closed_ring_starts_at_first_pixel_and_covers_it() {
        // Square ring without endpoints.
        let skeleton = skeleton_from(20, 20, |x, y| {
            let on_x = (5..=14).contains(&x);
            let on_y = (5..=14).contains(&y);
            (on_x && (y == 5 || y == 14)) || (on_y && (x == 5 || x == 14))
        });
        assert!(endpoints(&skeleton).is_empty());

        let path = trace_centerline(&skeleton);
        assert_eq!(path.first(), Some(&PixelCoord::new(5, 5)));
        assert_eq!(path.len(), 36);
        assert_no_duplicates(&path);
        assert_steps_are_adjacent(&path);
    }

    #[test]
    fn stepped_corner_prefers_orthogonal_neighbor() {
        // An L corner: (row 5, cols 2..=6) then (col 6, rows 6..=10).
        let skeleton = skeleton_from(12, 12, |x, y| {
            (y == 5 && (2..=6).contains(&x)) || (x == 6 && (5..=10).contains(&y))
        });
        let path = trace_centerline(&skeleton);
        assert_eq!(path.len(), 10);
        assert_eq!(path.first(), Some(&PixelCoord::new(5, 2)));
        assert_eq!(path.last(), Some(&PixelCoord::new(10, 6)));
        assert!(path.coords().contains(&PixelCoord::new(5, 6)));
        assert_no_duplicates(&path);
    }

    #[test]
    fn branch_is_abandoned_without_revisits() {
        // A "Y": trunk on column 10 (rows 10..=19), two arms going up-left and up-right.
        let skeleton = skeleton_from(21, 21, |x, y| {
            (x == 10 && (10..=19).contains(&y))
                || ((4..10).contains(&y) && x + y == 20)
                || ((4..10).contains(&y) && x == y)
        });
        let path = trace_centerline(&skeleton);
        assert_no_duplicates(&path);
        assert_steps_are_adjacent(&path);
        assert!(
            (path.len() as u64) < skeleton.pixel_count(),
            "one branch should be left untraced"
        );
    }

    #[test]
    fn blob_skeleton_is_traced_without_duplicates() {
        let mask = BinaryMask::from_fn(40, 40, |x, y| (8..32).contains(&x) && (15..25).contains(&y));
        let skeleton = crate::skeleton::skeletonize(&mask);
        let path = trace_centerline(&skeleton);
        assert!(!path.is_empty());
        assert_no_duplicates(&path);
    }
}
