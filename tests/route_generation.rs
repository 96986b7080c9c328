//! End-to-end route-generation tests.
//!
//! Exercises the full pipeline through `RouteContext::generate_route` against a
//! synthetic grid road network, standing in for the on-disk/OSM-backed
//! providers a real deployment would plug in. Covers the scenarios laid
//! out alongside the generation engine: shape fidelity, loop closure,
//! infeasible targets, unknown templates, degenerate anchor counts, and
//! determinism.

use std::collections::HashMap;
use std::sync::Mutex;

use gpsart_router::graph::RoadGraphProvider;
use gpsart_router::{
    CancellationToken, Direction, GpsPoint, Graph, Options, OutputSink, Result, RouteContext,
    RouteError, RouteRequest, TemplateSource,
};

const SQUARE_SVG: &str = "M 0 0 L 100 0 L 100 100 L 0 100 Z";
const LINE_SVG: &str = "M 0 0 L 100 0";

/// Serves a fixed set of in-memory templates by name.
struct FixtureTemplates {
    templates: HashMap<&'static str, &'static str>,
}

impl FixtureTemplates {
    fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert("square", SQUARE_SVG);
        templates.insert("line", LINE_SVG);
        Self { templates }
    }
}

impl TemplateSource for FixtureTemplates {
    fn load_template_bytes(&self, template_name: &str) -> Result<Vec<u8>> {
        self.templates
            .get(template_name)
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| RouteError::TemplateNotFound {
                template_name: template_name.to_string(),
            })
    }
}

/// A square grid of roads, dense enough to route any shape requested in
/// these tests within `radius_m` of the center. Step size scales with the
/// requested radius so each test stays fast regardless of target distance.
struct GridProvider;

impl RoadGraphProvider for GridProvider {
    fn get_graph(&self, center_lat: f64, center_lng: f64, radius_m: f64) -> Result<Graph> {
        let projection = gpsart_router::LocalProjection::new(center_lat, center_lng);
        let step_m = (radius_m / 40.0).max(20.0);
        let span = (radius_m / step_m).ceil() as i64;

        let id = |row: i64, col: i64| -> u64 { ((row + span) * (2 * span + 1) + (col + span)) as u64 };

        let mut nodes = Vec::new();
        for row in -span..=span {
            for col in -span..=span {
                let gp = projection.from_meters(col as f64 * step_m, row as f64 * step_m);
                nodes.push((id(row, col), gp));
            }
        }

        let mut edges = Vec::new();
        for row in -span..=span {
            for col in -span..=span {
                if col + 1 <= span {
                    edges.push((id(row, col), id(row, col + 1), step_m, None));
                    edges.push((id(row, col + 1), id(row, col), step_m, None));
                }
                if row + 1 <= span {
                    edges.push((id(row, col), id(row + 1, col), step_m, None));
                    edges.push((id(row + 1, col), id(row, col), step_m, None));
                }
            }
        }

        Ok(Graph::new(nodes, edges))
    }
}

/// Collects saved GeoJSON payloads in memory, returning a synthetic path.
struct InMemorySink {
    saved: Mutex<Vec<String>>,
}

impl InMemorySink {
    fn new() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
        }
    }
}

impl OutputSink for InMemorySink {
    fn save_geojson(&self, feature_collection: &geojson::FeatureCollection) -> Result<String> {
        let mut saved = self.saved.lock().unwrap();
        let path = format!("memory://route-{}.geojson", saved.len());
        saved.push(serde_json::to_string(feature_collection).unwrap());
        Ok(path)
    }
}

fn default_context() -> (FixtureTemplates, GridProvider, InMemorySink) {
    let _ = env_logger::try_init();
    (FixtureTemplates::new(), GridProvider, InMemorySink::new())
}

// ============================================================================
// Scenario 1: a square template fits close to the target distance, with
// roughly right-angled turns.
// ============================================================================

#[test]
fn square_template_fits_within_tolerance_with_right_angle_turns() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let options = Options {
        graph_radius_m: 3000.0,
        tol_ratio: 0.1,
        anchor_count: 8,
        sample_step_m: 20.0,
        min_wp_gap_m: 25.0,
        iters: 24,
        ..Options::default()
    };

    let request = RouteRequest {
        template_name: "square".to_string(),
        start_point: GpsPoint::new(33.4996, 126.5312),
        target_km: 2.0,
        options,
        save_geojson: false,
    };

    let response = ctx.generate_route(&request).expect("route generation should succeed");

    assert!(
        (1800.0..=2200.0).contains(&response.metrics.route_length_m),
        "route_length_m {} outside [1800, 2200]",
        response.metrics.route_length_m
    );

    let near_right_angle = response
        .guidance
        .guidance_points
        .iter()
        .filter(|g| matches!(g.direction, Direction::Left | Direction::Right))
        .filter(|g| (g.angle_deg.abs() - 90.0).abs() < 30.0)
        .count();
    assert!(
        near_right_angle >= 4,
        "expected at least 4 near-right-angle turns, found {near_right_angle}"
    );
}

// ============================================================================
// Scenario 2: a straight-line template with return_to_start closes the
// loop and turns back near the far end.
// ============================================================================

#[test]
fn line_template_with_return_to_start_closes_the_loop() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let options = Options {
        graph_radius_m: 2000.0,
        tol_ratio: 0.15,
        return_to_start: true,
        use_anchors: true,
        anchor_count: 4,
        sample_step_m: 20.0,
        min_wp_gap_m: 25.0,
        iters: 24,
        ..Options::default()
    };

    let request = RouteRequest {
        template_name: "line".to_string(),
        start_point: GpsPoint::new(10.0, 20.0),
        target_km: 1.0,
        options,
        save_geojson: false,
    };

    let response = ctx.generate_route(&request).expect("route generation should succeed");

    let has_sharp_reversal = response
        .guidance
        .guidance_points
        .iter()
        .any(|g| matches!(g.direction, Direction::UTurn | Direction::SharpLeft | Direction::SharpRight));
    assert!(has_sharp_reversal, "expected a u-turn or sharp reversal near the far end");

    let coords = &response.geojson.features[0].geometry.as_ref().unwrap();
    if let geojson::Value::LineString(line) = &coords.value {
        let first = line.first().unwrap();
        let last = line.last().unwrap();
        let first_point = GpsPoint::new(first[1], first[0]);
        let last_point = GpsPoint::new(last[1], last[0]);
        let gap = gpsart_router::geo_utils::haversine_distance(first_point, last_point);
        assert!(gap < 200.0, "start/end gap {gap}m too large for a closed loop");
    } else {
        panic!("expected a LineString geometry");
    }
}

// ============================================================================
// Scenario 3: an unreachable target distance on a small graph falls back
// to a best-effort, unmatched result or an explicit fit failure.
// ============================================================================

#[test]
fn unreachable_target_distance_is_reported_as_unmatched_or_failed() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let options = Options {
        graph_radius_m: 1000.0,
        anchor_count: 4,
        iters: 12,
        ..Options::default()
    };

    let request = RouteRequest {
        template_name: "square".to_string(),
        start_point: GpsPoint::new(10.0, 20.0),
        target_km: 100.0,
        options,
        save_geojson: false,
    };

    match ctx.generate_route(&request) {
        Ok(response) => assert!(!response.metrics.route_length_m.is_nan()),
        Err(RouteError::FitFailed { .. }) => {}
        Err(other) => panic!("unexpected error for an unreachable target: {other:?}"),
    }
}

// ============================================================================
// Scenario 4: an unknown template name fails with TemplateNotFound.
// ============================================================================

#[test]
fn unknown_template_name_fails_with_template_not_found() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let request = RouteRequest {
        template_name: "nonexistent".to_string(),
        start_point: GpsPoint::new(10.0, 20.0),
        target_km: 1.0,
        options: Options::default(),
        save_geojson: false,
    };

    let result = ctx.generate_route(&request);
    assert!(matches!(result, Err(RouteError::TemplateNotFound { .. })));
}

// ============================================================================
// Scenario 5: anchor_count=1 degenerates to a simple start/anchor/start
// shuttle when return_to_start is set.
// ============================================================================

#[test]
fn single_anchor_with_return_to_start_degenerates_to_a_shuttle() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let options = Options {
        graph_radius_m: 1500.0,
        anchor_count: 1,
        use_anchors: true,
        return_to_start: true,
        sample_step_m: 20.0,
        min_wp_gap_m: 25.0,
        iters: 16,
        ..Options::default()
    };

    let request = RouteRequest {
        template_name: "square".to_string(),
        start_point: GpsPoint::new(10.0, 20.0),
        target_km: 0.5,
        options,
        save_geojson: false,
    };

    let response = ctx.generate_route(&request).expect("degenerate shuttle should still route");
    assert!(response.metrics.route_length_m > 0.0);
}

// ============================================================================
// Scenario 6: identical requests against identical cache state produce
// byte-identical polylines.
// ============================================================================

#[test]
fn identical_requests_produce_identical_polylines() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let options = Options {
        graph_radius_m: 2000.0,
        anchor_count: 6,
        sample_step_m: 20.0,
        min_wp_gap_m: 25.0,
        iters: 16,
        ..Options::default()
    };

    let request = RouteRequest {
        template_name: "square".to_string(),
        start_point: GpsPoint::new(10.0, 20.0),
        target_km: 1.0,
        options,
        save_geojson: false,
    };

    let a = ctx.generate_route(&request).unwrap();
    let b = ctx.generate_route(&request).unwrap();
    assert_eq!(
        serde_json::to_string(&a.geojson).unwrap(),
        serde_json::to_string(&b.geojson).unwrap()
    );
}

// ============================================================================
// Request validation at the orchestration boundary.
// ============================================================================

#[test]
fn out_of_range_option_is_rejected_before_any_pipeline_work() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let options = Options {
        tol_ratio: 2.0,
        ..Options::default()
    };

    let request = RouteRequest {
        template_name: "square".to_string(),
        start_point: GpsPoint::new(10.0, 20.0),
        target_km: 1.0,
        options,
        save_geojson: false,
    };

    assert!(matches!(ctx.generate_route(&request), Err(RouteError::BadRequest { .. })));
}

#[test]
fn save_geojson_persists_through_the_output_sink() {
    let (templates, roads, output) = default_context();
    let ctx = RouteContext::new(&templates, &roads, &output, CancellationToken::new());

    let options = Options {
        graph_radius_m: 1500.0,
        anchor_count: 6,
        sample_step_m: 20.0,
        min_wp_gap_m: 25.0,
        iters: 16,
        ..Options::default()
    };

    let request = RouteRequest {
        template_name: "square".to_string(),
        start_point: GpsPoint::new(10.0, 20.0),
        target_km: 0.8,
        options,
        save_geojson: true,
    };

    let response = ctx.generate_route(&request).unwrap();
    assert!(response.saved.as_ref().unwrap().starts_with("memory://"));
}
