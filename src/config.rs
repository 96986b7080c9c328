//! Request-scoped configuration (`Options`) and process-scoped configuration
//! (`Settings`).
//!
//! `Options` is a plain struct with a `Default` impl matching the documented
//! defaults, validated once at construction rather than read as a loose key
//! bag.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteError};

/// Sentinel for `svg_path_index` meaning "merge all sub-paths by endpoint
/// proximity into one polyline".
pub const SVG_PATH_INDEX_AUTO: i64 = -1;

/// Per-request configuration bundle. Every field has a validated range;
/// construction through [`Options::validate`] is the only way callers build
/// one from untrusted input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    /// Sub-path index, or [`SVG_PATH_INDEX_AUTO`] to merge all sub-paths.
    #[serde(default = "default_svg_path_index")]
    pub svg_path_index: i64,
    #[serde(default = "default_svg_samples_per_seg")]
    pub svg_samples_per_seg: u32,
    #[serde(default)]
    pub svg_simplify: f64,
    #[serde(default)]
    pub svg_flip_y: bool,
    #[serde(default = "default_canvas_box_frac")]
    pub canvas_box_frac: f64,
    #[serde(default)]
    pub global_rot_deg: f64,
    #[serde(default = "default_sample_step_m")]
    pub sample_step_m: f64,
    #[serde(default = "default_min_wp_gap_m")]
    pub min_wp_gap_m: f64,
    #[serde(default = "default_graph_radius_m")]
    pub graph_radius_m: f64,
    #[serde(default)]
    pub return_to_start: bool,
    #[serde(default = "default_tol_ratio")]
    pub tol_ratio: f64,
    #[serde(default = "default_iters")]
    pub iters: u32,
    #[serde(default = "default_shape_bias_lambda")]
    pub shape_bias_lambda: f64,
    #[serde(default = "default_anchor_count")]
    pub anchor_count: u32,
    #[serde(default = "default_use_anchors")]
    pub use_anchors: bool,
    #[serde(default)]
    pub connect_from_start: bool,
    #[serde(default = "default_max_connector_m")]
    pub max_connector_m: f64,
    #[serde(default = "default_proximity_alpha")]
    pub proximity_alpha: f64,
    #[serde(default = "default_proximity_max_shift_m")]
    pub proximity_max_shift_m: f64,
}

fn default_svg_path_index() -> i64 {
    SVG_PATH_INDEX_AUTO
}
fn default_svg_samples_per_seg() -> u32 {
    8
}
fn default_canvas_box_frac() -> f64 {
    0.8
}
fn default_sample_step_m() -> f64 {
    25.0
}
fn default_min_wp_gap_m() -> f64 {
    40.0
}
fn default_graph_radius_m() -> f64 {
    3000.0
}
fn default_tol_ratio() -> f64 {
    0.1
}
fn default_iters() -> u32 {
    16
}
fn default_shape_bias_lambda() -> f64 {
    2.0
}
fn default_anchor_count() -> u32 {
    12
}
fn default_use_anchors() -> bool {
    true
}
fn default_max_connector_m() -> f64 {
    500.0
}
fn default_proximity_alpha() -> f64 {
    0.3
}
fn default_proximity_max_shift_m() -> f64 {
    150.0
}

impl Default for Options {
    fn default() -> Self {
        Self {
            svg_path_index: default_svg_path_index(),
            svg_samples_per_seg: default_svg_samples_per_seg(),
            svg_simplify: 0.0,
            svg_flip_y: false,
            canvas_box_frac: default_canvas_box_frac(),
            global_rot_deg: 0.0,
            sample_step_m: default_sample_step_m(),
            min_wp_gap_m: default_min_wp_gap_m(),
            graph_radius_m: default_graph_radius_m(),
            return_to_start: false,
            tol_ratio: default_tol_ratio(),
            iters: default_iters(),
            shape_bias_lambda: default_shape_bias_lambda(),
            anchor_count: default_anchor_count(),
            use_anchors: default_use_anchors(),
            connect_from_start: false,
            max_connector_m: default_max_connector_m(),
            proximity_alpha: default_proximity_alpha(),
            proximity_max_shift_m: default_proximity_max_shift_m(),
        }
    }
}

impl Options {
    /// Validate each field's range constraints. Returns
    /// `RouteError::BadRequest` on the first violation found.
    pub fn validate(self) -> Result<Self> {
        fn check(cond: bool, message: impl Into<String>) -> Result<()> {
            if cond {
                Ok(())
            } else {
                Err(RouteError::BadRequest {
                    message: message.into(),
                })
            }
        }

        check(
            self.svg_path_index >= SVG_PATH_INDEX_AUTO,
            "svg_path_index must be a non-negative index or the auto sentinel",
        )?;
        check(
            self.svg_samples_per_seg > 0,
            "svg_samples_per_seg must be positive",
        )?;
        check(self.svg_simplify >= 0.0, "svg_simplify must be >= 0")?;
        check(
            self.canvas_box_frac > 0.0 && self.canvas_box_frac <= 1.0,
            "canvas_box_frac must be in (0, 1]",
        )?;
        check(self.sample_step_m > 0.0, "sample_step_m must be positive")?;
        check(self.min_wp_gap_m > 0.0, "min_wp_gap_m must be positive")?;
        check(
            self.graph_radius_m > 0.0,
            "graph_radius_m must be positive",
        )?;
        check(
            self.tol_ratio > 0.0 && self.tol_ratio <= 1.0,
            "tol_ratio must be in (0, 1]",
        )?;
        check(self.iters > 0, "iters must be positive")?;
        check(
            self.shape_bias_lambda >= 0.0,
            "shape_bias_lambda must be >= 0",
        )?;
        check(self.anchor_count > 0, "anchor_count must be positive")?;
        check(
            self.max_connector_m > 0.0,
            "max_connector_m must be positive",
        )?;
        check(
            self.proximity_alpha >= 0.0 && self.proximity_alpha <= 1.0,
            "proximity_alpha must be in [0, 1]",
        )?;
        check(
            self.proximity_max_shift_m > 0.0,
            "proximity_max_shift_m must be positive",
        )?;

        Ok(self)
    }
}

/// Process-wide static configuration, constructed once at startup and read
/// only thereafter.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_host: String,
    pub bind_port: u16,
    pub data_root: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Settings {
    /// Build settings from environment variables, falling back to sane
    /// local-development defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            bind_host: std::env::var("GPSART_BIND_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            bind_port: std::env::var("GPSART_BIND_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            data_root: std::env::var("GPSART_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            cache_dir: std::env::var("GPSART_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./cache")),
            output_dir: std::env::var("GPSART_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./output")),
        }
    }
}
