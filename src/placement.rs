//! Placement: maps the unit-square template into meters around the
//! request's start point via scale, rotation and a proximity-biased offset.
//!
//! The output lives in the same meter-space as [`crate::geo_utils::LocalProjection`],
//! with the start point as origin (meter `(0, 0)` always denotes the start).
//! Callers convert to geographic coordinates only when they need to query
//! the road graph.

use crate::config::Options;
use crate::geo_utils::euclid_distance;

/// Center, scale, rotate and offset a unit-square template polyline into
/// meter-space around the start point (implicit origin `(0, 0)`).
///
/// `scale` is the current scaling-loop multiplier; `1.0` means the template
/// occupies exactly `canvas_box_frac * graph_radius_m` meters across its
/// longer axis.
pub fn place(unit_points: &[(f64, f64)], opts: &Options, scale: f64) -> Vec<(f64, f64)> {
    if unit_points.is_empty() {
        return Vec::new();
    }

    let centroid = centroid_of(unit_points);
    let factor = opts.canvas_box_frac * opts.graph_radius_m * scale;

    let scaled: Vec<(f64, f64)> = unit_points
        .iter()
        .map(|&(x, y)| ((x - centroid.0) * factor, (y - centroid.1) * factor))
        .collect();

    let angle = opts.global_rot_deg.to_radians();
    let (sin_a, cos_a) = angle.sin_cos();
    let rotated: Vec<(f64, f64)> = scaled
        .iter()
        .map(|&(x, y)| (x * cos_a - y * sin_a, x * sin_a + y * cos_a))
        .collect();

    let nearest = nearest_to_origin(&rotated);
    let v = (-nearest.0, -nearest.1);
    let mut offset = (opts.proximity_alpha * v.0, opts.proximity_alpha * v.1);
    let mag = (offset.0 * offset.0 + offset.1 * offset.1).sqrt();
    if mag > opts.proximity_max_shift_m && mag > 1e-12 {
        let k = opts.proximity_max_shift_m / mag;
        offset = (offset.0 * k, offset.1 * k);
    }

    rotated
        .into_iter()
        .map(|(x, y)| (x + offset.0, y + offset.1))
        .collect()
}

fn centroid_of(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

fn nearest_to_origin(points: &[(f64, f64)]) -> (f64, f64) {
    points
        .iter()
        .copied()
        .min_by(|a, b| {
            euclid_distance(*a, (0.0, 0.0))
                .partial_cmp(&euclid_distance(*b, (0.0, 0.0)))
                .unwrap()
        })
        .unwrap_or((0.0, 0.0))
}
