//! Polygon approximation using the Ramer-Douglas-Peucker algorithm.
//!
//! Marker detection reduces every traced border to a polygon and keeps
//! the ones that collapse to four corners. Borders are closed curves, so
//! [`simplify_closed`] splits them at the point farthest from the start
//! and simplifies the two halves as open chains.

use crate::types::Point;

/// Simplify an open chain of points.
///
/// Points within `tolerance` pixels of the line between their kept
/// neighbors are removed; the two end points are always kept. Chains
/// with fewer than 3 points are returned unchanged.
#[must_use = "returns the simplified chain"]
pub fn simplify_open(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Simplify a closed curve given as its boundary points (the closing
/// edge from the last point back to the first is implied).
///
/// The curve is split at the point farthest from the first one; each
/// half is simplified with [`simplify_open`] and the results are joined
/// without repeating the split points.
#[must_use = "returns the simplified polygon"]
pub fn simplify_closed(points: &[Point], tolerance: f64) -> Vec<Point> {
    let Some(&start) = points.first() else {
        return Vec::new();
    };
    if points.len() < 3 {
        return points.to_vec();
    }

    let far = points
        .iter()
        .enumerate()
        .fold((0, 0.0), |(best, best_d), (i, p)| {
            let d = p.distance_squared(start);
            if d > best_d { (i, d) } else { (best, best_d) }
        })
        .0;
    if far == 0 {
        // Every point coincides with the start.
        return vec![start];
    }

    let first_half = simplify_open(&points[..=far], tolerance);

    let mut second: Vec<Point> = points[far..].to_vec();
    second.push(start);
    let second_half = simplify_open(&second, tolerance);

    let mut polygon = first_half;
    // Skip the split point (already present) and the closing start point.
    polygon.extend_from_slice(&second_half[1..second_half.len() - 1]);
    polygon
}

/// Perimeter of a closed point sequence.
#[must_use]
pub fn closed_perimeter(points: &[Point]) -> f64 {
    match points.len() {
        0 | 1 => 0.0,
        n => (0..n).map(|i| points[i].distance(points[(i + 1) % n])).sum(),
    }
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for (i, &p) in points.iter().enumerate().take(end).skip(start + 1) {
        let d = perpendicular_distance(p, points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
