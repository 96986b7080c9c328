//! Scaling loop: binary search over the template's meter extent until the
//! routed on-road length matches the target within tolerance.

use log::{debug, warn};

use crate::config::Options;
use crate::error::{Result, RouteError};
use crate::graph::Graph;
use crate::placement::place;
use crate::routing::{route_template, RoutingOutput};
use crate::CancellationToken;
use crate::GpsPoint;

/// Initial lower bound of the scaling-loop bracket.
const INITIAL_S_LO: f64 = 0.2;
/// Initial upper bound of the scaling-loop bracket.
const INITIAL_S_HI: f64 = 3.0;

/// Accepted (or best-effort) result of the scaling loop.
pub struct ScalingResult {
    pub scale_used: f64,
    pub matched: bool,
    pub routing: RoutingOutput,
}

/// Binary-search over the placement scale until the routed length falls
/// within `tol_ratio` of `target_km`, or `iters` iterations are exhausted.
pub fn fit_target_distance(
    unit_template: &[(f64, f64)],
    start: GpsPoint,
    opts: &Options,
    target_km: f64,
    graph: &Graph,
    cancel: &CancellationToken,
) -> Result<ScalingResult> {
    let target_m = target_km * 1000.0;
    let mut s_lo = INITIAL_S_LO;
    let mut s_hi = INITIAL_S_HI;

    let mut best: Option<(f64, f64, RoutingOutput)> = None;

    // Bracket-grow step: if even the smallest scale overshoots, or the
    // largest scale undershoots, widen the bound once before bisecting.
    if let Some(routing) = evaluate_scale(unit_template, start, opts, s_lo, graph, cancel)? {
        let length = routing.route_length_m;
        if let Some(result) = consider(&mut best, s_lo, target_m, opts.tol_ratio, routing) {
            return Ok(result);
        }
        if length > target_m {
            s_lo = (s_lo / 2.0).max(1e-3);
        }
    }
    if let Some(routing) = evaluate_scale(unit_template, start, opts, s_hi, graph, cancel)? {
        let length = routing.route_length_m;
        if let Some(result) = consider(&mut best, s_hi, target_m, opts.tol_ratio, routing) {
            return Ok(result);
        }
        if length < target_m {
            s_hi *= 2.0;
        }
    }

    for _ in 0..opts.iters.max(1) {
        if cancel.is_cancelled() {
            return Err(RouteError::Cancelled);
        }

        let s = (s_lo + s_hi) / 2.0;
        match evaluate_scale(unit_template, start, opts, s, graph, cancel)? {
            Some(routing) => {
                let length = routing.route_length_m;
                debug!("scaling iterate s={s:.3} length_m={length:.0} target_m={target_m:.0}");
                if let Some(result) = consider(&mut best, s, target_m, opts.tol_ratio, routing) {
                    return Ok(result);
                }
                if length < target_m {
                    s_lo = s;
                } else {
                    s_hi = s;
                }
            }
            None => {
                // Infeasible iterate (no path, or connector too long): treat
                // as "too large" and search toward smaller scale.
                debug!("scaling iterate s={s:.3} infeasible, narrowing toward smaller scale");
                s_hi = s;
            }
        }
    }

    match best {
        Some((scale_used, _, routing)) => Ok(ScalingResult {
            scale_used,
            matched: false,
            routing,
        }),
        None => {
            warn!("scaling loop exhausted with no feasible iterate for target_m={target_m:.0}");
            Err(RouteError::FitFailed {
                best_length_m: None,
                target_m,
            })
        }
    }
}

/// Run one candidate scale end-to-end. `NoPath`/`ConnectorTooLong` are
/// locally recovered as an infeasible iterate; every other error is fatal
/// for the whole request.
fn evaluate_scale(
    unit_template: &[(f64, f64)],
    start: GpsPoint,
    opts: &Options,
    scale: f64,
    graph: &Graph,
    cancel: &CancellationToken,
) -> Result<Option<RoutingOutput>> {
    if cancel.is_cancelled() {
        return Err(RouteError::Cancelled);
    }
    let meter_template = place(unit_template, opts, scale);
    match route_template(&meter_template, start, opts, graph, cancel) {
        Ok(routing) => Ok(Some(routing)),
        Err(RouteError::NoPath { .. }) | Err(RouteError::ConnectorTooLong { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Accept the iterate outright if it satisfies `tol_ratio`; otherwise track
/// it as the new best-so-far if closer to target than the previous best.
/// Returns `Some` only when the iterate is an outright accept.
fn consider(
    best: &mut Option<(f64, f64, RoutingOutput)>,
    scale: f64,
    target_m: f64,
    tol_ratio: f64,
    routing: RoutingOutput,
) -> Option<ScalingResult> {
    let diff = (routing.route_length_m - target_m).abs();
    if diff <= tol_ratio * target_m {
        return Some(ScalingResult {
            scale_used: scale,
            matched: true,
            routing,
        });
    }
    let replace = best.as_ref().map(|(_, best_diff, _)| diff < *best_diff).unwrap_or(true);
    if replace {
        *best = Some((scale, diff, routing));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::geo_utils::LocalProjection;

    fn long_line_graph(projection: &LocalProjection, hops: i64, hop_len_m: f64) -> Graph {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for i in 0..=hops {
            let gp = projection.from_meters(i as f64 * hop_len_m, 0.0);
            nodes.push((i as u64, gp));
            if i > 0 {
                edges.push(((i - 1) as u64, i as u64, hop_len_m, None));
                edges.push((i as u64, (i - 1) as u64, hop_len_m, None));
            }
        }
        Graph::new(nodes, edges)
    }

    #[test]
    fn converges_within_tolerance_on_a_straight_road() {
        let start = GpsPoint { lat: 10.0, lng: 20.0 };
        let projection = LocalProjection::new(start.lat, start.lng);
        let graph = long_line_graph(&projection, 400, 10.0);
        let opts = Options {
            use_anchors: false,
            connect_from_start: false,
            return_to_start: false,
            canvas_box_frac: 1.0,
            graph_radius_m: 1000.0,
            proximity_alpha: 0.0,
            tol_ratio: 0.1,
            iters: 20,
            ..Options::default()
        };
        let template = vec![(0.0, 0.5), (1.0, 0.5)];
        let cancel = CancellationToken::new();
        let result = fit_target_distance(&template, start, &opts, 1.0, &graph, &cancel).unwrap();
        assert!((result.routing.route_length_m - 1000.0).abs() <= 100.0);
    }

    #[test]
    fn reports_fit_failed_when_every_iterate_is_infeasible() {
        let start = GpsPoint { lat: 10.0, lng: 20.0 };
        let projection = LocalProjection::new(start.lat, start.lng);
        // A graph with a single isolated node can never reach a second anchor.
        let graph = Graph::new(vec![(0, projection.from_meters(0.0, 0.0))], vec![]);
        let opts = Options {
            use_anchors: true,
            anchor_count: 4,
            iters: 4,
            ..Options::default()
        };
        let template = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let cancel = CancellationToken::new();
        let result = fit_target_distance(&template, start, &opts, 5.0, &graph, &cancel);
        assert!(matches!(result, Err(RouteError::FitFailed { .. })));
    }
}
