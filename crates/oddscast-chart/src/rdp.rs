//! Polyline simplification (Ramer-Douglas-Peucker).
//!
//! Keeps the subset of points such that no discarded point deviates from
//! the simplified line by more than the tolerance. Iterative with an
//! explicit work stack: series here can run to tens of thousands of points
//! and call-stack recursion would not be depth-bounded.

/// (x, y) with both axes on the same 0-100 scale so the tolerance is
/// dimensionless.
pub type Point = (f64, f64);

/// Indices to keep, ascending. `tolerance <= 0` keeps every point.
pub fn simplify(points: &[Point], tolerance: f64) -> Vec<usize> {
    if points.len() <= 2 || tolerance <= 0.0 {
        return (0..points.len()).collect();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut max_idx = first;
        for i in first + 1..last {
            let d = segment_distance(points[i], points[first], points[last]);
            if d > max_dist {
                max_dist = d;
                max_idx = i;
            }
        }
        if max_dist > tolerance {
            keep[max_idx] = true;
            stack.push((first, max_idx));
            stack.push((max_idx, last));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(i, &kept)| kept.then_some(i))
        .collect()
}

/// Distance from `point` to the segment `start..end`, clamping the
/// projection to the segment. A zero-length chord degenerates to plain
/// distance to the shared point.
fn segment_distance(point: Point, start: Point, end: Point) -> f64 {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    if dx == 0.0 && dy == 0.0 {
        return ((point.0 - start.0).powi(2) + (point.1 - start.1).powi(2)).sqrt();
    }
    let t = ((point.0 - start.0) * dx + (point.1 - start.1) * dy) / (dx * dx + dy * dy);
    let t = t.clamp(0.0, 1.0);
    let proj_x = start.0 + t * dx;
    let proj_y = start.1 + t * dy;
    ((point.0 - proj_x).powi(2) + (point.1 - proj_y).powi(2)).sqrt()
}
