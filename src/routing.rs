//! Shape-biased routing: stitches a meter-space template trajectory onto
//! the road graph, producing a node sequence whose geographic shape stays
//! close to the template.

use crate::config::Options;
use crate::error::{OptionExt, Result, RouteError};
use crate::geo_utils::{
    densify, equal_arclength_samples, euclid_distance, point_segment_distance, thin,
    LocalProjection,
};
use crate::graph::{Graph, NodeId};
use crate::CancellationToken;
use crate::GpsPoint;

/// Result of stitching a template onto the road graph.
pub struct RoutingOutput {
    pub nodes: Vec<NodeId>,
    pub polyline: Vec<GpsPoint>,
    pub route_length_m: f64,
}

/// Run the full shape-biased routing pipeline for one placed (meter-space)
/// template against `graph`.
pub fn route_template(
    meter_template: &[(f64, f64)],
    start: GpsPoint,
    opts: &Options,
    graph: &Graph,
    cancel: &CancellationToken,
) -> Result<RoutingOutput> {
    let projection = LocalProjection::new(start.lat, start.lng);

    let dense = densify(meter_template, opts.sample_step_m);
    let trajectory = thin(&dense, opts.min_wp_gap_m);
    if trajectory.len() < 2 {
        return Err(RouteError::TemplateTooSparse {
            point_count: trajectory.len(),
        });
    }

    let anchor_meters: Vec<(f64, f64)> = if opts.use_anchors {
        equal_arclength_samples(&trajectory, (opts.anchor_count.max(2)) as usize)
    } else {
        vec![trajectory[0], *trajectory.last().unwrap()]
    };

    let mut anchor_nodes: Vec<NodeId> = Vec::with_capacity(anchor_meters.len());
    for &m in &anchor_meters {
        let gp = projection.from_meters(m.0, m.1);
        let node = graph.nearest_node(gp)?;
        if anchor_nodes.last() != Some(&node) {
            anchor_nodes.push(node);
        }
    }
    if anchor_nodes.is_empty() {
        return Err(RouteError::TemplateTooSparse { point_count: 0 });
    }
    if anchor_nodes.len() == 1 {
        anchor_nodes.push(anchor_nodes[0]);
    }

    let mut nodes: Vec<NodeId> = Vec::new();

    if opts.connect_from_start {
        let start_node = graph.nearest_node(start)?;
        let connector = graph.shortest_path_by_length(start_node, anchor_nodes[0])?;
        let connector_len = path_length(graph, &connector)?;
        if connector_len > opts.max_connector_m {
            return Err(RouteError::ConnectorTooLong {
                length_m: connector_len,
                max_m: opts.max_connector_m,
            });
        }
        nodes.extend(connector);
    } else {
        nodes.push(anchor_nodes[0]);
    }

    for pair in anchor_nodes.windows(2) {
        if cancel.is_cancelled() {
            return Err(RouteError::Cancelled);
        }
        let (a, b) = (pair[0], pair[1]);
        if a == b {
            continue;
        }
        let ref_dist = euclid_distance(
            projection.to_meters(graph.coords(a)?),
            projection.to_meters(graph.coords(b)?),
        )
        .max(1.0);
        let path = graph.shortest_path(a, b, |u, v| {
            shape_biased_cost(
                graph,
                &projection,
                &trajectory,
                ref_dist,
                opts.shape_bias_lambda,
                u,
                v,
            )
        })?;
        append_path(&mut nodes, &path);
    }

    if opts.return_to_start {
        if cancel.is_cancelled() {
            return Err(RouteError::Cancelled);
        }
        let start_node = graph.nearest_node(start)?;
        let last = *nodes.last().ok_or_internal("routed node sequence is empty")?;
        if last != start_node {
            let ref_dist =
                euclid_distance(projection.to_meters(graph.coords(last)?), (0.0, 0.0)).max(1.0);
            let path = graph.shortest_path(last, start_node, |u, v| {
                shape_biased_cost(
                    graph,
                    &projection,
                    &trajectory,
                    ref_dist,
                    opts.shape_bias_lambda,
                    u,
                    v,
                )
            })?;
            append_path(&mut nodes, &path);
        }
    }

    let route_length_m = path_length(graph, &nodes)?;
    let polyline = render_polyline(graph, &nodes)?;

    Ok(RoutingOutput {
        nodes,
        polyline,
        route_length_m,
    })
}

fn path_length(graph: &Graph, nodes: &[NodeId]) -> Result<f64> {
    let mut total = 0.0;
    for pair in nodes.windows(2) {
        total += graph.edge_length(pair[0], pair[1])?;
    }
    Ok(total)
}

fn append_path(nodes: &mut Vec<NodeId>, path: &[NodeId]) {
    if nodes.is_empty() {
        nodes.extend_from_slice(path);
    } else if !path.is_empty() {
        nodes.extend_from_slice(&path[1..]);
    }
}

fn render_polyline(graph: &Graph, nodes: &[NodeId]) -> Result<Vec<GpsPoint>> {
    let mut out: Vec<GpsPoint> = Vec::new();
    for pair in nodes.windows(2) {
        let geom = graph.edge_geometry(pair[0], pair[1])?;
        if out.is_empty() {
            out.extend(geom);
        } else {
            out.extend(geom.into_iter().skip(1));
        }
    }
    if out.is_empty() {
        if let Some(&only) = nodes.first() {
            out.push(graph.coords(only)?);
        }
    }
    Ok(out)
}

/// `cost(u, v) = length_m(u, v) * (1 + lambda * dev(u, v))`, `dev` being the
/// mean perpendicular distance from the edge's endpoints to the ideal
/// trajectory, normalized by the current anchor pair's straight-line
/// distance.
fn shape_biased_cost(
    graph: &Graph,
    projection: &LocalProjection,
    trajectory: &[(f64, f64)],
    ref_dist_m: f64,
    lambda: f64,
    u: NodeId,
    v: NodeId,
) -> f64 {
    let length = match graph.edge_length(u, v) {
        Ok(l) => l,
        Err(_) => return f64::INFINITY,
    };
    if lambda <= 0.0 {
        return length;
    }
    let (pu, pv) = match (graph.coords(u), graph.coords(v)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return f64::INFINITY,
    };
    let mu = projection.to_meters(pu);
    let mv = projection.to_meters(pv);
    let dev = (min_point_to_polyline_distance(mu, trajectory)
        + min_point_to_polyline_distance(mv, trajectory))
        / 2.0;
    length * (1.0 + lambda * (dev / ref_dist_m))
}

fn min_point_to_polyline_distance(p: (f64, f64), polyline: &[(f64, f64)]) -> f64 {
    polyline
        .windows(2)
        .map(|w| point_segment_distance(p, w[0], w[1]))
        .fold(f64::MAX, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    // A 3x3 grid of nodes 100m apart, rows 0..3, cols 0..3, id = row*3+col.
    // Includes a diagonal "shortcut" edge 0->8 that is much shorter in
    // length but strays far from a template tracing the top row then
    // right column (an L shape), so shape bias should avoid it when lambda>0.
    fn grid_graph() -> (Graph, LocalProjection) {
        let origin_lat = 0.0;
        let origin_lng = 0.0;
        let projection = LocalProjection::new(origin_lat, origin_lng);
        let mut nodes = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                let (x, y) = (col as f64 * 100.0, row as f64 * 100.0);
                let gp = projection.from_meters(x, y);
                nodes.push(((row * 3 + col) as u64, gp));
            }
        }
        let mut edges = Vec::new();
        let id = |row: i32, col: i32| (row * 3 + col) as u64;
        for row in 0..3 {
            for col in 0..3 {
                if col + 1 < 3 {
                    edges.push((id(row, col), id(row, col + 1), 100.0, None));
                    edges.push((id(row, col + 1), id(row, col), 100.0, None));
                }
                if row + 1 < 3 {
                    edges.push((id(row, col), id(row + 1, col), 100.0, None));
                    edges.push((id(row + 1, col), id(row, col), 100.0, None));
                }
            }
        }
        // Diagonal shortcut, much shorter than the L-shaped route around it.
        edges.push((id(0, 0), id(2, 2), 50.0, None));
        edges.push((id(2, 2), id(0, 0), 50.0, None));

        (Graph::new(nodes, edges), projection)
    }

    #[test]
    fn too_sparse_template_fails() {
        let (graph, _) = grid_graph();
        let opts = Options::default();
        let cancel = CancellationToken::new();
        let start = GpsPoint { lat: 0.0, lng: 0.0 };
        let result = route_template(&[(0.0, 0.0)], start, &opts, &graph, &cancel);
        assert!(matches!(
            result,
            Err(RouteError::TemplateTooSparse { .. })
        ));
    }

    #[test]
    fn shape_bias_prefers_l_shaped_path_over_diagonal_shortcut() {
        let (graph, projection) = grid_graph();
        let start = projection.from_meters(0.0, 0.0);
        let opts = Options {
            use_anchors: true,
            anchor_count: 3,
            shape_bias_lambda: 5.0,
            sample_step_m: 10.0,
            min_wp_gap_m: 1.0,
            connect_from_start: false,
            return_to_start: false,
            ..Options::default()
        };
        // Template traces the top row then down the right column (an L),
        // deliberately avoiding the diagonal.
        let template = vec![(0.0, 0.0), (200.0, 0.0), (200.0, 200.0)];
        let cancel = CancellationToken::new();
        let out = route_template(&template, start, &opts, &graph, &cancel).unwrap();
        assert!(!out.nodes.contains(&8) || out.nodes.len() > 2);
        assert!(out.route_length_m > 0.0);
    }

    #[test]
    fn connector_too_long_is_rejected() {
        let (graph, projection) = grid_graph();
        let start = projection.from_meters(-10_000.0, -10_000.0);
        let opts = Options {
            connect_from_start: true,
            max_connector_m: 1.0,
            ..Options::default()
        };
        let template = vec![(0.0, 0.0), (200.0, 0.0)];
        let cancel = CancellationToken::new();
        let result = route_template(&template, start, &opts, &graph, &cancel);
        assert!(matches!(
            result,
            Err(RouteError::ConnectorTooLong { .. })
        ));
    }

    #[test]
    fn return_to_start_closes_the_loop() {
        let (graph, projection) = grid_graph();
        let start = projection.from_meters(0.0, 0.0);
        let opts = Options {
            return_to_start: true,
            use_anchors: true,
            anchor_count: 3,
            sample_step_m: 10.0,
            min_wp_gap_m: 1.0,
            ..Options::default()
        };
        let template = vec![(0.0, 0.0), (200.0, 0.0), (200.0, 200.0)];
        let cancel = CancellationToken::new();
        let out = route_template(&template, start, &opts, &graph, &cancel).unwrap();
        assert_eq!(*out.nodes.first().unwrap(), *out.nodes.last().unwrap());
    }
}
