//! Guidance extraction: converts the final geographic polyline into an
//! ordered list of turn, kilometer and start/finish guidance points.

use log::debug;

use crate::error::{Result, RouteError};
use crate::geo_utils::{bearing_deg, haversine_distance, normalize_angle_deg};
use crate::GpsPoint;

/// Category of a guidance point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceType {
    Start,
    Turn,
    Km,
    Finish,
    /// Reached an intermediate checkpoint. Not produced by
    /// [`extract_guidance`] today; reserved for future producers.
    Checkpoint,
    /// Out-of-band event (e.g. drifting off the planned route). Not
    /// produced by [`extract_guidance`] today; reserved for future
    /// live-tracking producers.
    Event,
}

/// Turn/heading direction at a guidance point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Straight,
    UTurn,
    SlightLeft,
    SlightRight,
    SharpLeft,
    SharpRight,
}

/// One point in the turn-by-turn guidance sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidancePoint {
    pub sequence: u32,
    pub kind: GuidanceType,
    pub lat: f64,
    pub lng: f64,
    pub direction: Direction,
    /// Signed turn angle in `(-180, 180]`; `0` for non-turn points.
    pub angle_deg: f64,
    pub distance_from_start_m: f64,
    pub distance_to_next_m: f64,
    pub guidance_id: String,
    pub trigger_distance_m: f64,
    pub km_mark: Option<u32>,
    pub show_pace: bool,
}

/// Extract the ordered guidance sequence from a final geographic polyline.
/// `min_wp_gap_m` doubles as the merge-distance threshold for collapsing
/// near-duplicate turns of the same sign.
pub fn extract_guidance(polyline: &[GpsPoint], min_wp_gap_m: f64) -> Result<Vec<GuidancePoint>> {
    if polyline.len() < 2 {
        return Err(RouteError::Internal {
            message: "guidance extraction requires at least two polyline points".to_string(),
        });
    }

    let cum = geo_cumulative_lengths(polyline);
    let total = *cum.last().unwrap();

    let mut points = Vec::new();

    points.push(GuidancePoint {
        sequence: 0,
        kind: GuidanceType::Start,
        lat: polyline[0].lat,
        lng: polyline[0].lng,
        direction: Direction::Straight,
        angle_deg: 0.0,
        distance_from_start_m: 0.0,
        distance_to_next_m: 0.0,
        guidance_id: "RUN_START".to_string(),
        trigger_distance_m: 0.0,
        km_mark: None,
        show_pace: false,
    });

    let mut prev_guidance_distance = 0.0;
    for i in 1..polyline.len() - 1 {
        let bearing_in = bearing_deg(polyline[i - 1], polyline[i]);
        let bearing_out = bearing_deg(polyline[i], polyline[i + 1]);
        let angle = normalize_angle_deg(bearing_out - bearing_in);

        let Some(direction) = classify_turn(angle) else {
            continue;
        };

        let distance_since_prev = cum[i] - prev_guidance_distance;
        let trigger = trigger_distance(direction, distance_since_prev);

        points.push(GuidancePoint {
            sequence: 0,
            kind: GuidanceType::Turn,
            lat: polyline[i].lat,
            lng: polyline[i].lng,
            direction,
            angle_deg: angle,
            distance_from_start_m: cum[i],
            distance_to_next_m: 0.0,
            guidance_id: guidance_id_for(direction, trigger),
            trigger_distance_m: trigger,
            km_mark: None,
            show_pace: false,
        });
        prev_guidance_distance = cum[i];
    }

    let km_count = (total / 1000.0).floor() as u32;
    for mark in 1..=km_count {
        let target = mark as f64 * 1000.0;
        let gp = geo_interpolate_at_distance(polyline, &cum, target);
        points.push(GuidancePoint {
            sequence: 0,
            kind: GuidanceType::Km,
            lat: gp.lat,
            lng: gp.lng,
            direction: Direction::Straight,
            angle_deg: 0.0,
            distance_from_start_m: target,
            distance_to_next_m: 0.0,
            guidance_id: format!("KM_MARK_{mark}"),
            trigger_distance_m: 0.0,
            km_mark: Some(mark),
            show_pace: true,
        });
    }

    let last = *polyline.last().unwrap();
    points.push(GuidancePoint {
        sequence: 0,
        kind: GuidanceType::Finish,
        lat: last.lat,
        lng: last.lng,
        direction: Direction::Straight,
        angle_deg: 0.0,
        distance_from_start_m: total,
        distance_to_next_m: 0.0,
        guidance_id: "ROUTE_COMPLETE".to_string(),
        trigger_distance_m: 0.0,
        km_mark: None,
        show_pace: false,
    });

    points.sort_by(|a, b| {
        a.distance_from_start_m
            .partial_cmp(&b.distance_from_start_m)
            .unwrap()
    });

    merge_close_same_sign_turns(&mut points, min_wp_gap_m);
    resequence(&mut points);

    Ok(points)
}

fn classify_turn(angle: f64) -> Option<Direction> {
    let abs = angle.abs();
    if abs < 15.0 {
        None
    } else if abs < 30.0 {
        Some(if angle < 0.0 {
            Direction::SlightLeft
        } else {
            Direction::SlightRight
        })
    } else if abs < 60.0 {
        Some(if angle < 0.0 {
            Direction::Left
        } else {
            Direction::Right
        })
    } else if abs < 150.0 {
        Some(if angle < 0.0 {
            Direction::SharpLeft
        } else {
            Direction::SharpRight
        })
    } else {
        Some(Direction::UTurn)
    }
}

/// Pick the largest of `{10, 30, 50}` not exceeding `distance_since_prev`,
/// floored at `10`; u-turns always trigger at `15`.
fn trigger_distance(direction: Direction, distance_since_prev: f64) -> f64 {
    if direction == Direction::UTurn {
        return 15.0;
    }
    let mut best = 10.0;
    for candidate in [10.0, 30.0, 50.0] {
        if candidate <= distance_since_prev {
            best = candidate;
        }
    }
    best
}

fn guidance_id_for(direction: Direction, trigger_distance_m: f64) -> String {
    match direction {
        Direction::Left => format!("TURN_LEFT_{}", trigger_distance_m as i64),
        Direction::Right => format!("TURN_RIGHT_{}", trigger_distance_m as i64),
        Direction::SlightLeft => "SLIGHT_LEFT".to_string(),
        Direction::SlightRight => "SLIGHT_RIGHT".to_string(),
        Direction::SharpLeft => "SHARP_LEFT".to_string(),
        Direction::SharpRight => "SHARP_RIGHT".to_string(),
        Direction::UTurn => "U_TURN".to_string(),
        Direction::Straight => "GO_STRAIGHT_LONG".to_string(),
    }
}

/// Collapse near-duplicate turns: if two consecutive turn guidances are
/// within `min_wp_gap_m` of each other and share a sign, keep only the one
/// with the larger `|angle|`.
fn merge_close_same_sign_turns(points: &mut Vec<GuidancePoint>, min_wp_gap_m: f64) {
    let turn_indices: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind == GuidanceType::Turn)
        .map(|(i, _)| i)
        .collect();

    let mut to_remove = std::collections::HashSet::new();
    for pair in turn_indices.windows(2) {
        let (i, j) = (pair[0], pair[1]);
        if to_remove.contains(&i) {
            continue;
        }
        let (a, b) = (&points[i], &points[j]);
        let gap = (b.distance_from_start_m - a.distance_from_start_m).abs();
        if gap <= min_wp_gap_m && a.angle_deg.signum() == b.angle_deg.signum() {
            if a.angle_deg.abs() >= b.angle_deg.abs() {
                debug!("merging turn at {:.0}m into turn at {:.0}m ({gap:.0}m apart)", b.distance_from_start_m, a.distance_from_start_m);
                to_remove.insert(j);
            } else {
                debug!("merging turn at {:.0}m into turn at {:.0}m ({gap:.0}m apart)", a.distance_from_start_m, b.distance_from_start_m);
                to_remove.insert(i);
            }
        }
    }

    let mut idx = 0;
    points.retain(|_| {
        let keep = !to_remove.contains(&idx);
        idx += 1;
        keep
    });
}

fn resequence(points: &mut [GuidancePoint]) {
    for (i, p) in points.iter_mut().enumerate() {
        p.sequence = (i + 1) as u32;
    }
    let len = points.len();
    for i in 0..len {
        points[i].distance_to_next_m = if i + 1 < len {
            points[i + 1].distance_from_start_m - points[i].distance_from_start_m
        } else {
            0.0
        };
    }
}

fn geo_cumulative_lengths(points: &[GpsPoint]) -> Vec<f64> {
    let mut cum = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cum.push(0.0);
    for pair in points.windows(2) {
        total += haversine_distance(pair[0], pair[1]);
        cum.push(total);
    }
    cum
}

fn geo_interpolate_at_distance(points: &[GpsPoint], cum: &[f64], target: f64) -> GpsPoint {
    if target <= 0.0 {
        return points[0];
    }
    let total = *cum.last().unwrap();
    if target >= total {
        return *points.last().unwrap();
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
    GpsPoint {
        lat: a.lat + t * (b.lat - a.lat),
        lng: a.lng + t * (b.lng - a.lng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_loop() -> Vec<GpsPoint> {
        // ~100m-side square loop in a flat local patch, traversed clockwise.
        let step = 0.0009; // ~100m at the equator
        vec![
            GpsPoint { lat: 0.0, lng: 0.0 },
            GpsPoint { lat: 0.0, lng: step },
            GpsPoint { lat: step, lng: step },
            GpsPoint { lat: step, lng: 0.0 },
            GpsPoint { lat: 0.0, lng: 0.0 },
        ]
    }

    #[test]
    fn emits_start_and_finish_at_the_ends() {
        let guidance = extract_guidance(&square_loop(), 40.0).unwrap();
        assert_eq!(guidance.first().unwrap().kind, GuidanceType::Start);
        assert_eq!(guidance.last().unwrap().kind, GuidanceType::Finish);
        assert_eq!(guidance.last().unwrap().distance_to_next_m, 0.0);
    }

    #[test]
    fn sequence_numbers_are_contiguous_from_one() {
        let guidance = extract_guidance(&square_loop(), 40.0).unwrap();
        for (i, p) in guidance.iter().enumerate() {
            assert_eq!(p.sequence, (i + 1) as u32);
        }
    }

    #[test]
    fn distance_from_start_is_non_decreasing() {
        let guidance = extract_guidance(&square_loop(), 40.0).unwrap();
        for pair in guidance.windows(2) {
            assert!(pair[1].distance_from_start_m >= pair[0].distance_from_start_m);
        }
    }

    #[test]
    fn right_angle_corners_classify_as_left_or_right() {
        let guidance = extract_guidance(&square_loop(), 40.0).unwrap();
        let turns: Vec<_> = guidance
            .iter()
            .filter(|p| p.kind == GuidanceType::Turn)
            .collect();
        assert!(!turns.is_empty());
        for t in turns {
            assert!(matches!(t.direction, Direction::Left | Direction::Right));
            assert!((t.angle_deg.abs() - 90.0).abs() < 20.0);
        }
    }

    #[test]
    fn trigger_distance_picks_the_largest_non_exceeding_bucket() {
        assert_eq!(trigger_distance(Direction::Left, 5.0), 10.0);
        assert_eq!(trigger_distance(Direction::Left, 35.0), 30.0);
        assert_eq!(trigger_distance(Direction::Left, 1000.0), 50.0);
        assert_eq!(trigger_distance(Direction::UTurn, 1000.0), 15.0);
    }

    #[test]
    fn merge_rule_collapses_close_same_sign_turns() {
        let mut points = vec![
            GuidancePoint {
                sequence: 0,
                kind: GuidanceType::Turn,
                lat: 0.0,
                lng: 0.0,
                direction: Direction::Left,
                angle_deg: -40.0,
                distance_from_start_m: 100.0,
                distance_to_next_m: 0.0,
                guidance_id: "TURN_LEFT_10".into(),
                trigger_distance_m: 10.0,
                km_mark: None,
                show_pace: false,
            },
            GuidancePoint {
                sequence: 0,
                kind: GuidanceType::Turn,
                lat: 0.0,
                lng: 0.0,
                direction: Direction::Left,
                angle_deg: -55.0,
                distance_from_start_m: 110.0,
                distance_to_next_m: 0.0,
                guidance_id: "TURN_LEFT_10".into(),
                trigger_distance_m: 10.0,
                km_mark: None,
                show_pace: false,
            },
        ];
        merge_close_same_sign_turns(&mut points, 40.0);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].angle_deg, -55.0);
    }

    #[test]
    fn guidance_extraction_is_deterministic() {
        let a = extract_guidance(&square_loop(), 40.0).unwrap();
        let b = extract_guidance(&square_loop(), 40.0).unwrap();
        assert_eq!(a, b);
    }
}
