//! Assembly: packages the routed polyline, metrics and guidance into the
//! response record, and hands it to the output sink when persistence was
//! requested.

use geo::LineString;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{json, Map};

use crate::error::Result;
use crate::guidance::GuidancePoint;
use crate::GpsPoint;
use crate::OutputSink;

/// Numeric summary of the accepted route.
#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub nodes: usize,
    pub route_length_m: f64,
    pub target_km: f64,
}

/// Guidance section of the response.
#[derive(Debug, Clone)]
pub struct GuidanceBundle {
    pub guidance_points: Vec<GuidancePoint>,
}

/// Final response record for a route-generation request.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    pub metrics: Metrics,
    pub geojson: FeatureCollection,
    pub guidance: GuidanceBundle,
    pub saved: Option<String>,
}

/// Build the response record for an accepted route.
#[allow(clippy::too_many_arguments)]
pub fn build_response(
    nodes: usize,
    route_length_m: f64,
    target_km: f64,
    polyline: &[GpsPoint],
    guidance_points: Vec<GuidancePoint>,
    template_name: &str,
    align_mode: &str,
    matched: bool,
    scale_used: f64,
) -> RouteResponse {
    let line_string: LineString<f64> = polyline.iter().map(|p| (p.lng, p.lat)).collect();
    let geometry = Geometry::new(Value::from(&line_string));

    let mut properties = Map::new();
    properties.insert("template".to_string(), json!(template_name));
    properties.insert("align_mode".to_string(), json!(align_mode));
    properties.insert("matched".to_string(), json!(matched));
    properties.insert("scale_used".to_string(), json!(scale_used));
    properties.insert("name".to_string(), json!(format!("{template_name} route")));

    let feature = Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };

    let geojson = FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: None,
    };

    RouteResponse {
        metrics: Metrics {
            nodes,
            route_length_m,
            target_km,
        },
        geojson,
        guidance: GuidanceBundle { guidance_points },
        saved: None,
    }
}

/// Persist the response's GeoJSON via the output sink, recording the saved
/// path on the response.
pub fn persist(response: &mut RouteResponse, sink: &dyn OutputSink) -> Result<()> {
    let path = sink.save_geojson(&response.geojson)?;
    response.saved = Some(path);
    Ok(())
}
