//! Geographic utilities shared across the pipeline.
//!
//! All meter-space math in this crate goes through a single local
//! equirectangular projection parameterized by one origin latitude per
//! request (the start point's latitude). Using one projection for the whole
//! pipeline, instead of re-deriving it per call, keeps scale, rotation and
//! distance computations reproducible across a run.

use crate::GpsPoint;

/// Mean earth radius in meters (WGS84 authalic radius, matches the `geo`
/// crate's haversine implementation closely enough for routing purposes).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A local equirectangular (plate carrée) projection around an origin
/// latitude/longitude. `to_meters`/`from_meters` are inverses of each other
/// to floating-point precision; meters are measured as (east, north) offsets
/// from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin_lat: f64,
    origin_lng: f64,
    cos_origin_lat: f64,
}

impl LocalProjection {
    /// Build a projection centered on the given origin.
    pub fn new(origin_lat: f64, origin_lng: f64) -> Self {
        Self {
            origin_lat,
            origin_lng,
            cos_origin_lat: origin_lat.to_radians().cos(),
        }
    }

    /// Project a geographic point to (x = east meters, y = north meters).
    pub fn to_meters(&self, point: GpsPoint) -> (f64, f64) {
        let dlat = (point.lat - self.origin_lat).to_radians();
        let dlng = (point.lng - self.origin_lng).to_radians();
        let y = dlat * EARTH_RADIUS_M;
        let x = dlng * EARTH_RADIUS_M * self.cos_origin_lat;
        (x, y)
    }

    /// Invert a (east, north) meter offset back to a geographic point.
    pub fn from_meters(&self, x: f64, y: f64) -> GpsPoint {
        let dlat = y / EARTH_RADIUS_M;
        let dlng = if self.cos_origin_lat.abs() < 1e-12 {
            0.0
        } else {
            x / (EARTH_RADIUS_M * self.cos_origin_lat)
        };
        GpsPoint {
            lat: self.origin_lat + dlat.to_degrees(),
            lng: self.origin_lng + dlng.to_degrees(),
        }
    }
}

/// Great-circle distance between two GPS points, in meters.
pub fn haversine_distance(a: GpsPoint, b: GpsPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlng = (dlng / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Straight-line (Euclidean) distance between two meter-space points.
pub fn euclid_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Total haversine length of a geographic polyline (sum of consecutive-pair
/// distances).
pub fn haversine_polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Total Euclidean length of a meter-space polyline.
pub fn meter_polyline_length(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| euclid_distance(pair[0], pair[1]))
        .sum()
}

/// Perpendicular distance from point `p` to the segment `(a, b)`, in the
/// same meter-space units as the inputs. Falls back to distance-to-`a` when
/// the segment is degenerate.
pub fn point_segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (ax, ay) = a;
    let (bx, by) = b;
    let (px, py) = p;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    if len_sq < 1e-12 {
        return euclid_distance(p, a);
    }

    let t = (((px - ax) * dx) + ((py - ay) * dy)) / len_sq;
    let t_clamped = t.clamp(0.0, 1.0);
    let closest = (ax + t_clamped * dx, ay + t_clamped * dy);
    euclid_distance(p, closest)
}

/// Resample a meter-space polyline to uniform spacing of roughly
/// `step_m` meters, by linear interpolation along each segment.
///
/// The first and last input points are always preserved. Returns the input
/// unchanged if it has fewer than two points.
pub fn densify(points: &[(f64, f64)], step_m: f64) -> Vec<(f64, f64)> {
    if points.len() < 2 || step_m <= 0.0 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let seg_len = euclid_distance(a, b);
        if seg_len < 1e-9 {
            continue;
        }
        let steps = (seg_len / step_m).floor() as usize;
        for i in 1..=steps {
            let t = (i as f64 * step_m) / seg_len;
            if t >= 1.0 {
                break;
            }
            out.push((a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1)));
        }
        out.push(b);
    }

    out
}

/// Thin a meter-space polyline so consecutive retained points are at least
/// `min_gap_m` apart. The first and last points are always retained.
pub fn thin(points: &[(f64, f64)], min_gap_m: f64) -> Vec<(f64, f64)> {
    if points.len() < 2 || min_gap_m <= 0.0 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);
    let mut last = points[0];

    for &p in &points[1..points.len() - 1] {
        if euclid_distance(last, p) >= min_gap_m {
            out.push(p);
            last = p;
        }
    }

    let tail = points[points.len() - 1];
    if out.last().copied() != Some(tail) {
        out.push(tail);
    }

    out
}

/// Cumulative arclength at each point of a meter-space polyline (same
/// length as `points`, first entry is always `0.0`).
pub fn cumulative_lengths(points: &[(f64, f64)]) -> Vec<f64> {
    let mut cum = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cum.push(0.0);
    for pair in points.windows(2) {
        total += euclid_distance(pair[0], pair[1]);
        cum.push(total);
    }
    cum
}

/// Pick `count` points from a polyline at equal arclength spacing
/// (including both endpoints when `count >= 2`), via linear interpolation.
pub fn equal_arclength_samples(points: &[(f64, f64)], count: usize) -> Vec<(f64, f64)> {
    if points.is_empty() || count == 0 {
        return Vec::new();
    }
    if points.len() == 1 || count == 1 {
        return vec![points[0]];
    }

    let cum = cumulative_lengths(points);
    let total = *cum.last().unwrap();
    if total < 1e-9 {
        return vec![points[0]; count];
    }

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let target = total * (i as f64) / ((count - 1) as f64);
        out.push(interpolate_at_distance(points, &cum, target));
    }
    out
}

/// Interpolate the point on a polyline at the given cumulative arclength
/// `target` (clamped to the polyline's extent). `cum` must be
/// `cumulative_lengths(points)`.
pub fn interpolate_at_distance(points: &[(f64, f64)], cum: &[f64], target: f64) -> (f64, f64) {
    if target <= 0.0 {
        return points[0];
    }
    let total = *cum.last().unwrap();
    if target >= total {
        return points[points.len() - 1];
    }

    let idx = match cum.binary_search_by(|c| c.partial_cmp(&target).unwrap()) {
        Ok(i) => i,
        Err(i) => i,
    };
    let idx = idx.clamp(1, points.len() - 1);
    let (a, b) = (points[idx - 1], points[idx]);
    let seg_len = cum[idx] - cum[idx - 1];
    if seg_len < 1e-9 {
        return a;
    }
    let t = (target - cum[idx - 1]) / seg_len;
    (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1))
}

/// Signed bearing in degrees from `a` to `b`, measured clockwise from
/// geographic north (`0` = north, `90` = east), in `(-180, 180]`.
pub fn bearing_deg(a: GpsPoint, b: GpsPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    normalize_angle_deg(y.atan2(x).to_degrees())
}

/// Normalize an angle in degrees to `(-180, 180]`.
pub fn normalize_angle_deg(mut angle: f64) -> f64 {
    while angle <= -180.0 {
        angle += 360.0;
    }
    while angle > 180.0 {
        angle -= 360.0;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn projection_round_trips() {
        let proj = LocalProjection::new(33.4996, 126.5312);
        let p = GpsPoint {
            lat: 33.51,
            lng: 126.54,
        };
        let (x, y) = proj.to_meters(p);
        let back = proj.from_meters(x, y);
        assert_relative_eq!(back.lat, p.lat, epsilon = 1e-9);
        assert_relative_eq!(back.lng, p.lng, epsilon = 1e-9);
    }

    #[test]
    fn haversine_distance_is_symmetric_and_zero_for_same_point() {
        let a = GpsPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let b = GpsPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        assert_relative_eq!(haversine_distance(a, a), 0.0, epsilon = 1e-6);
        assert_relative_eq!(
            haversine_distance(a, b),
            haversine_distance(b, a),
            epsilon = 1e-6
        );
    }

    #[test]
    fn densify_preserves_endpoints_and_increases_density() {
        let points = vec![(0.0, 0.0), (100.0, 0.0)];
        let dense = densify(&points, 10.0);
        assert_eq!(dense.first().copied(), Some((0.0, 0.0)));
        assert_eq!(dense.last().copied(), Some((100.0, 0.0)));
        assert!(dense.len() > points.len());
    }

    #[test]
    fn thin_respects_minimum_gap() {
        let points: Vec<(f64, f64)> = (0..=100).map(|i| (i as f64, 0.0)).collect();
        let thinned = thin(&points, 15.0);
        for pair in thinned.windows(2) {
            let d = euclid_distance(pair[0], pair[1]);
            assert!(d >= 15.0 - 1e-9 || pair[1] == *thinned.last().unwrap());
        }
        assert_eq!(thinned.first(), points.first());
        assert_eq!(thinned.last(), points.last());
    }

    #[test]
    fn equal_arclength_samples_endpoints_match() {
        let points = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)];
        let samples = equal_arclength_samples(&points, 5);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0], points[0]);
        assert_eq!(samples[4], *points.last().unwrap());
    }

    #[test]
    fn point_segment_distance_perpendicular() {
        let d = point_segment_distance((5.0, 3.0), (0.0, 0.0), (10.0, 0.0));
        assert_relative_eq!(d, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn bearing_rotation_invariance_of_turn_angle() {
        let a = GpsPoint { lat: 0.0, lng: 0.0 };
        let b = GpsPoint { lat: 0.1, lng: 0.0 };
        let c = GpsPoint { lat: 0.1, lng: 0.1 };
        let turn = normalize_angle_deg(bearing_deg(b, c) - bearing_deg(a, b));
        // North then east is a right turn, roughly +90 degrees.
        assert!(turn > 80.0 && turn < 100.0);
    }
}
