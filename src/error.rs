//! Unified error handling for the route generation pipeline.
//!
//! Every fallible operation in this crate returns [`RouteError`], replacing
//! mixed `Option`/panic-based failure signaling with a single typed surface
//! that the (unspecified) HTTP boundary can map directly to a status code.

use std::fmt;

/// Unified error type for route-generation operations.
///
/// Variant names mirror the error taxonomy: everything but `Internal` is
/// meant to be converted at the HTTP boundary into `{ok:false, error:{kind,
/// message}}`; `Internal` is the catch-all for invariant violations that
/// should never surface to a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteError {
    /// Request failed schema or range validation.
    BadRequest { message: String },
    /// The named template does not exist in the template source.
    TemplateNotFound { template_name: String },
    /// Template bytes parsed to zero points or a degenerate bounding box.
    TemplateInvalid { message: String },
    /// The densified/thinned template has fewer than two points.
    TemplateTooSparse { point_count: usize },
    /// The road-graph provider could not produce a graph.
    GraphUnavailable { message: String },
    /// Dijkstra found no path between the requested nodes.
    NoPath { from: u64, to: u64 },
    /// A connector from start to the first anchor exceeded `max_connector_m`.
    ConnectorTooLong { length_m: f64, max_m: f64 },
    /// No scaling-loop iterate satisfied `tol_ratio`, and none were feasible.
    FitFailed {
        best_length_m: Option<f64>,
        target_m: f64,
    },
    /// The output sink could not persist the generated GeoJSON.
    OutputUnavailable { message: String },
    /// The request was cancelled between scaling-loop iterations.
    Cancelled,
    /// Any other invariant violation.
    Internal { message: String },
}

impl RouteError {
    /// Short machine-readable kind, used as the `error.kind` field at the
    /// HTTP boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteError::BadRequest { .. } => "BadRequest",
            RouteError::TemplateNotFound { .. } => "TemplateNotFound",
            RouteError::TemplateInvalid { .. } => "TemplateInvalid",
            RouteError::TemplateTooSparse { .. } => "TemplateTooSparse",
            RouteError::GraphUnavailable { .. } => "GraphUnavailable",
            RouteError::NoPath { .. } => "NoPath",
            RouteError::ConnectorTooLong { .. } => "ConnectorTooLong",
            RouteError::FitFailed { .. } => "FitFailed",
            RouteError::OutputUnavailable { .. } => "OutputUnavailable",
            RouteError::Cancelled => "Cancelled",
            RouteError::Internal { .. } => "Internal",
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::BadRequest { message } => write!(f, "bad request: {}", message),
            RouteError::TemplateNotFound { template_name } => {
                write!(f, "template '{}' not found", template_name)
            }
            RouteError::TemplateInvalid { message } => write!(f, "invalid template: {}", message),
            RouteError::TemplateTooSparse { point_count } => write!(
                f,
                "template has only {} point(s) after densify/thin, need at least 2",
                point_count
            ),
            RouteError::GraphUnavailable { message } => {
                write!(f, "road graph unavailable: {}", message)
            }
            RouteError::NoPath { from, to } => {
                write!(f, "no path from node {} to node {}", from, to)
            }
            RouteError::ConnectorTooLong { length_m, max_m } => write!(
                f,
                "connector length {:.0}m exceeds max_connector_m {:.0}m",
                length_m, max_m
            ),
            RouteError::FitFailed {
                best_length_m,
                target_m,
            } => match best_length_m {
                Some(best) => write!(
                    f,
                    "could not fit target {:.0}m, best infeasible iterate was {:.0}m",
                    target_m, best
                ),
                None => write!(
                    f,
                    "could not fit target {:.0}m, no iterate was feasible",
                    target_m
                ),
            },
            RouteError::OutputUnavailable { message } => {
                write!(f, "output sink unavailable: {}", message)
            }
            RouteError::Cancelled => write!(f, "request cancelled"),
            RouteError::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for RouteError {}

/// Result type alias for route-generation operations.
pub type Result<T> = std::result::Result<T, RouteError>;

/// Extension trait for converting `Option` into a [`RouteError`] `Result`.
pub trait OptionExt<T> {
    /// Convert `None` into `RouteError::Internal` with the given message.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| RouteError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = RouteError::TemplateNotFound {
            template_name: "star".to_string(),
        };
        assert_eq!(err.kind(), "TemplateNotFound");
        assert!(err.to_string().contains("star"));
    }

    #[test]
    fn option_ext_wraps_none() {
        let none: Option<i32> = None;
        let result = none.ok_or_internal("missing anchor");
        assert!(matches!(result, Err(RouteError::Internal { .. })));
    }
}
