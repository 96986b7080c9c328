//! # gpsart-router
//!
//! Generates runnable GPS-art routes: given a 2-D vector template (e.g. a
//! star), a start point and a target distance, this crate places the
//! template in meter-space, stitches it onto a real road graph under a
//! shape-biased routing cost, binary-searches a scale that hits the target
//! distance, and extracts turn-by-turn guidance from the result.
//!
//! The HTTP entry point, on-disk template/graph storage, and logging
//! configuration are deliberately external to this crate (see
//! [`TemplateSource`], [`graph::RoadGraphProvider`] and [`OutputSink`]);
//! [`RouteContext`] is the orchestration seam a caller plugs them into.
//!
//! ## Quick start
//!
//! ```no_run
//! use gpsart_router::{CancellationToken, GpsPoint, Options, RouteContext, RouteRequest};
//!
//! # fn example(
//! #     templates: &dyn gpsart_router::TemplateSource,
//! #     roads: &dyn gpsart_router::graph::RoadGraphProvider,
//! #     output: &dyn gpsart_router::OutputSink,
//! # ) -> gpsart_router::Result<()> {
//! let ctx = RouteContext::new(templates, roads, output, CancellationToken::new());
//! let request = RouteRequest {
//!     template_name: "star".to_string(),
//!     start_point: GpsPoint { lat: 33.4996, lng: 126.5312 },
//!     target_km: 2.0,
//!     options: Options::default(),
//!     save_geojson: false,
//! };
//! let response = ctx.generate_route(&request)?;
//! println!("matched={} length={:.0}m", response.geojson.features.len() > 0, response.metrics.route_length_m);
//! # Ok(())
//! # }
//! ```

use log::{debug, info};
use rstar::{RTreeObject, AABB};
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{OptionExt, Result, RouteError};

pub mod config;
pub use config::{Options, Settings};

pub mod geo_utils;
pub use geo_utils::LocalProjection;

pub mod lru_cache;
pub use lru_cache::LruCache;

pub mod graph;
pub use graph::{Graph, RoadGraphProvider};

pub mod cache;

pub mod template;

pub mod placement;

pub mod routing;

pub mod scaling;

pub mod guidance;
pub use guidance::{Direction, GuidancePoint, GuidanceType};

pub mod assembly;
pub use assembly::{GuidanceBundle, Metrics, RouteResponse};

// ============================================================================
// Core types
// ============================================================================

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GpsPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }
}

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Used only for spatial indexing of bounding boxes with `rstar`, should a
/// caller want to index many previously generated routes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedBounds {
    pub id: String,
    pub bounds: Bounds,
}

impl RTreeObject for IndexedBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag checked between scaling-loop iterations and
/// between anchor stitching pairs. Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

// ============================================================================
// External interfaces
// ============================================================================

/// Loads a template's raw path-description bytes by name.
pub trait TemplateSource: Send + Sync {
    fn load_template_bytes(&self, template_name: &str) -> Result<Vec<u8>>;
}

/// Persists a generated route's `FeatureCollection` and returns its saved
/// location.
pub trait OutputSink: Send + Sync {
    fn save_geojson(&self, feature_collection: &geojson::FeatureCollection) -> Result<String>;
}

// ============================================================================
// Request/response DTOs
// ============================================================================

/// Request body for route generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub template_name: String,
    pub start_point: GpsPoint,
    pub target_km: f64,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub save_geojson: bool,
}

// ============================================================================
// Orchestration
// ============================================================================

/// Ties together template loading, placement, shape-biased routing, the
/// scaling loop, guidance extraction and assembly for one request.
///
/// One `RouteContext` processes one request on the calling thread;
/// components execute strictly sequentially within it.
/// Multiple requests may run concurrently, each with its own context and
/// cancellation token, sharing only the process-wide graph cache.
pub struct RouteContext<'a> {
    template_source: &'a dyn TemplateSource,
    road_graph_provider: &'a dyn RoadGraphProvider,
    output_sink: &'a dyn OutputSink,
    cancel: CancellationToken,
}

impl<'a> RouteContext<'a> {
    pub fn new(
        template_source: &'a dyn TemplateSource,
        road_graph_provider: &'a dyn RoadGraphProvider,
        output_sink: &'a dyn OutputSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            template_source,
            road_graph_provider,
            output_sink,
            cancel,
        }
    }

    /// Run the full pipeline for one request.
    pub fn generate_route(&self, request: &RouteRequest) -> Result<RouteResponse> {
        if !(request.target_km > 0.0) {
            return Err(RouteError::BadRequest {
                message: "target_km must be positive".to_string(),
            });
        }
        if !request.start_point.is_valid() {
            return Err(RouteError::BadRequest {
                message: "start_point has invalid lat/lng".to_string(),
            });
        }

        let opts = request.options.clone().validate()?;
        info!(
            "generating route: template={} target_km={} start=({:.5},{:.5})",
            request.template_name, request.target_km, request.start_point.lat, request.start_point.lng
        );

        let bytes = self
            .template_source
            .load_template_bytes(&request.template_name)?;
        let unit_points = template::load_template(&bytes, &opts)?;
        debug!("template loaded: {} unit points", unit_points.len());

        let graph = cache::get_or_load_graph(
            self.road_graph_provider,
            request.start_point.lat,
            request.start_point.lng,
            opts.graph_radius_m,
        )?;
        debug!("graph ready: {} nodes", graph.node_count());

        let scaling_result = scaling::fit_target_distance(
            &unit_points,
            request.start_point,
            &opts,
            request.target_km,
            &graph,
            &self.cancel,
        )?;
        info!(
            "scaling loop done: scale={:.3} matched={} length_m={:.0}",
            scaling_result.scale_used, scaling_result.matched, scaling_result.routing.route_length_m
        );

        let guidance_points =
            guidance::extract_guidance(&scaling_result.routing.polyline, opts.min_wp_gap_m)?;

        let align_mode = if opts.proximity_alpha > 0.0 {
            "proximity"
        } else {
            "centroid"
        };

        let mut response = assembly::build_response(
            scaling_result.routing.nodes.len(),
            scaling_result.routing.route_length_m,
            request.target_km,
            &scaling_result.routing.polyline,
            guidance_points,
            &request.template_name,
            align_mode,
            scaling_result.matched,
            scaling_result.scale_used,
        );

        if request.save_geojson {
            assembly::persist(&mut response, self.output_sink)?;
            debug!("saved geojson to {:?}", response.saved);
        }

        Ok(response)
    }
}
