//! Template loader.
//!
//! Parses a 2-D path-description string (SVG path-data syntax: `M`, `L`,
//! `H`, `V`, `C`, `S`, `Q`, `A`, `Z` and their lowercase/relative forms),
//! selects or merges sub-paths, samples each segment uniformly, and
//! normalizes the result into the unit square.
//!
//! Curve segments are evaluated directly at `svg_samples_per_seg` parameter
//! steps (not flattened to a fixed tolerance), so that every segment of the
//! original path (straight or curved) contributes exactly
//! `svg_samples_per_seg + 1` points to the output.

use lyon_geom::euclid::{Angle, Point2D};
use lyon_geom::{ArcFlags, CubicBezierSegment, QuadraticBezierSegment, SvgArc};
use svgtypes::{PathParser, PathSegment};

use crate::config::{Options, SVG_PATH_INDEX_AUTO};
use crate::error::{Result, RouteError};
use crate::geo_utils::euclid_distance;

/// A point in unit/path coordinates (not yet meter-space).
pub type Point = (f64, f64);

/// Parse template bytes into a single unit-square polyline, per the
/// `Options` sub-path selection, sampling, flip and simplify settings.
pub fn load_template(bytes: &[u8], opts: &Options) -> Result<Vec<Point>> {
    let text = std::str::from_utf8(bytes).map_err(|e| RouteError::TemplateInvalid {
        message: format!("template is not valid UTF-8: {e}"),
    })?;

    let subpaths = parse_subpaths(text, opts.svg_samples_per_seg)?;
    if subpaths.is_empty() {
        return Err(RouteError::TemplateInvalid {
            message: "template parsed to zero sub-paths".to_string(),
        });
    }

    let mut chosen = if opts.svg_path_index == SVG_PATH_INDEX_AUTO {
        merge_subpaths(subpaths)
    } else {
        let idx = opts.svg_path_index as usize;
        let count = subpaths.len();
        subpaths
            .into_iter()
            .nth(idx)
            .ok_or_else(|| RouteError::TemplateInvalid {
                message: format!("svg_path_index {idx} out of range (have {count} sub-paths)"),
            })?
    };

    if chosen.len() < 2 {
        return Err(RouteError::TemplateInvalid {
            message: "template has fewer than two points".to_string(),
        });
    }

    let mut unit = normalize_to_unit_square(&chosen)?;
    chosen.clear();

    if opts.svg_flip_y {
        for p in unit.iter_mut() {
            p.1 = 1.0 - p.1;
        }
    }

    if opts.svg_simplify > 0.0 {
        unit = douglas_peucker(&unit, opts.svg_simplify);
        if unit.len() < 2 {
            return Err(RouteError::TemplateInvalid {
                message: "svg_simplify left fewer than two points".to_string(),
            });
        }
    }

    Ok(unit)
}

/// Parse the raw path-description text into a list of sub-paths, each
/// sampled to `samples_per_seg + 1` points per drawing segment.
fn parse_subpaths(text: &str, samples_per_seg: u32) -> Result<Vec<Vec<Point>>> {
    let mut subpaths: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut subpath_start: Point = (0.0, 0.0);
    let mut cur: Point = (0.0, 0.0);
    // Reflected control point for S/T smooth-curve shortcuts; cleared by any
    // non-curve segment.
    let mut prev_cubic_ctrl2: Option<Point> = None;
    let mut prev_quad_ctrl: Option<Point> = None;

    for segment in PathParser::from(text) {
        let segment = segment.map_err(|e| RouteError::TemplateInvalid {
            message: format!("could not parse path segment: {e}"),
        })?;

        match segment {
            PathSegment::MoveTo { abs, x, y } => {
                if current.len() > 1 {
                    subpaths.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                cur = resolve(abs, cur, x, y);
                subpath_start = cur;
                current.push(cur);
                prev_cubic_ctrl2 = None;
                prev_quad_ctrl = None;
            }
            PathSegment::LineTo { abs, x, y } => {
                let target = resolve(abs, cur, x, y);
                append_line(&mut current, cur, target, samples_per_seg);
                cur = target;
                prev_cubic_ctrl2 = None;
                prev_quad_ctrl = None;
            }
            PathSegment::HorizontalLineTo { abs, x } => {
                let target = if abs { (x, cur.1) } else { (cur.0 + x, cur.1) };
                append_line(&mut current, cur, target, samples_per_seg);
                cur = target;
                prev_cubic_ctrl2 = None;
                prev_quad_ctrl = None;
            }
            PathSegment::VerticalLineTo { abs, y } => {
                let target = if abs { (cur.0, y) } else { (cur.0, cur.1 + y) };
                append_line(&mut current, cur, target, samples_per_seg);
                cur = target;
                prev_cubic_ctrl2 = None;
                prev_quad_ctrl = None;
            }
            PathSegment::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let c1 = resolve(abs, cur, x1, y1);
                let c2 = resolve(abs, cur, x2, y2);
                let target = resolve(abs, cur, x, y);
                append_cubic(&mut current, cur, c1, c2, target, samples_per_seg);
                prev_cubic_ctrl2 = Some(c2);
                prev_quad_ctrl = None;
                cur = target;
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                let c1 = prev_cubic_ctrl2
                    .map(|c2| (2.0 * cur.0 - c2.0, 2.0 * cur.1 - c2.1))
                    .unwrap_or(cur);
                let c2 = resolve(abs, cur, x2, y2);
                let target = resolve(abs, cur, x, y);
                append_cubic(&mut current, cur, c1, c2, target, samples_per_seg);
                prev_cubic_ctrl2 = Some(c2);
                prev_quad_ctrl = None;
                cur = target;
            }
            PathSegment::Quadratic { abs, x1, y1, x, y } => {
                let c1 = resolve(abs, cur, x1, y1);
                let target = resolve(abs, cur, x, y);
                append_quadratic(&mut current, cur, c1, target, samples_per_seg);
                prev_quad_ctrl = Some(c1);
                prev_cubic_ctrl2 = None;
                cur = target;
            }
            PathSegment::SmoothQuadratic { abs, x, y } => {
                let c1 = prev_quad_ctrl
                    .map(|c| (2.0 * cur.0 - c.0, 2.0 * cur.1 - c.1))
                    .unwrap_or(cur);
                let target = resolve(abs, cur, x, y);
                append_quadratic(&mut current, cur, c1, target, samples_per_seg);
                prev_quad_ctrl = Some(c1);
                prev_cubic_ctrl2 = None;
                cur = target;
            }
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let target = resolve(abs, cur, x, y);
                append_arc(
                    &mut current,
                    cur,
                    target,
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    samples_per_seg,
                );
                cur = target;
                prev_cubic_ctrl2 = None;
                prev_quad_ctrl = None;
            }
            PathSegment::ClosePath { .. } => {
                if cur != subpath_start {
                    append_line(&mut current, cur, subpath_start, samples_per_seg);
                    cur = subpath_start;
                }
                prev_cubic_ctrl2 = None;
                prev_quad_ctrl = None;
            }
        }
    }

    if current.len() > 1 {
        subpaths.push(current);
    }

    Ok(subpaths)
}

fn resolve(abs: bool, cur: Point, x: f64, y: f64) -> Point {
    if abs {
        (x, y)
    } else {
        (cur.0 + x, cur.1 + y)
    }
}

fn append_line(points: &mut Vec<Point>, from: Point, to: Point, n: u32) {
    let n = n.max(1);
    for i in 1..=n {
        let t = i as f64 / n as f64;
        points.push((from.0 + t * (to.0 - from.0), from.1 + t * (to.1 - from.1)));
    }
}

fn append_cubic(points: &mut Vec<Point>, from: Point, c1: Point, c2: Point, to: Point, n: u32) {
    let n = n.max(1);
    let curve = CubicBezierSegment {
        from: Point2D::new(from.0, from.1),
        ctrl1: Point2D::new(c1.0, c1.1),
        ctrl2: Point2D::new(c2.0, c2.1),
        to: Point2D::new(to.0, to.1),
    };
    for i in 1..=n {
        let t = i as f64 / n as f64;
        let p = curve.sample(t);
        points.push((p.x, p.y));
    }
}

fn append_quadratic(points: &mut Vec<Point>, from: Point, ctrl: Point, to: Point, n: u32) {
    let n = n.max(1);
    let curve = QuadraticBezierSegment {
        from: Point2D::new(from.0, from.1),
        ctrl: Point2D::new(ctrl.0, ctrl.1),
        to: Point2D::new(to.0, to.1),
    };
    for i in 1..=n {
        let t = i as f64 / n as f64;
        let p = curve.sample(t);
        points.push((p.x, p.y));
    }
}

#[allow(clippy::too_many_arguments)]
fn append_arc(
    points: &mut Vec<Point>,
    from: Point,
    to: Point,
    rx: f64,
    ry: f64,
    x_axis_rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
    n: u32,
) {
    let n = n.max(1);
    if euclid_distance(from, to) < 1e-12 || rx.abs() < 1e-12 || ry.abs() < 1e-12 {
        append_line(points, from, to, n);
        return;
    }

    let svg_arc = SvgArc {
        from: Point2D::new(from.0, from.1),
        to: Point2D::new(to.0, to.1),
        radii: lyon_geom::euclid::Vector2D::new(rx, ry),
        x_rotation: Angle::degrees(x_axis_rotation_deg),
        flags: ArcFlags { large_arc, sweep },
    };
    let arc = svg_arc.to_arc();
    for i in 1..=n {
        let t = i as f64 / n as f64;
        let p = arc.sample(t);
        points.push((p.x, p.y));
    }
}

/// Greedy endpoint-chaining merge of sub-paths, used for the `auto`
/// selection: start from sub-path 0, then repeatedly append whichever
/// remaining sub-path's nearer endpoint is closest to the current tail
/// (reversing it if its *end* is closer than its start), ties broken by
/// insertion order.
fn merge_subpaths(mut subpaths: Vec<Vec<Point>>) -> Vec<Point> {
    if subpaths.is_empty() {
        return Vec::new();
    }

    let mut result = subpaths.remove(0);

    while !subpaths.is_empty() {
        let tail = *result.last().unwrap();
        let mut best_idx = 0;
        let mut best_dist = f64::MAX;
        let mut best_reversed = false;

        for (i, sp) in subpaths.iter().enumerate() {
            let d_start = euclid_distance(tail, sp[0]);
            if d_start < best_dist {
                best_dist = d_start;
                best_idx = i;
                best_reversed = false;
            }
            let d_end = euclid_distance(tail, *sp.last().unwrap());
            if d_end < best_dist {
                best_dist = d_end;
                best_idx = i;
                best_reversed = true;
            }
        }

        let mut next = subpaths.remove(best_idx);
        if best_reversed {
            next.reverse();
        }
        result.extend(next);
    }

    result
}

/// Affine-map a polyline's bounding box into `[0,1]x[0,1]`, preserving
/// aspect ratio by letterboxing the shorter axis, centered.
fn normalize_to_unit_square(points: &[Point]) -> Result<Vec<Point>> {
    let (mut min_x, mut max_x) = (f64::MAX, f64::MIN);
    let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
    for &(x, y) in points {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    let width = max_x - min_x;
    let height = max_y - min_y;
    let span = width.max(height);

    if !span.is_finite() || span < 1e-9 {
        return Err(RouteError::TemplateInvalid {
            message: "template bounding box is degenerate".to_string(),
        });
    }

    let scale = 1.0 / span;
    let pad_x = (1.0 - width * scale) / 2.0;
    let pad_y = (1.0 - height * scale) / 2.0;

    Ok(points
        .iter()
        .map(|&(x, y)| ((x - min_x) * scale + pad_x, (y - min_y) * scale + pad_y))
        .collect())
}

/// Douglas-Peucker simplification in unit coordinates, delegated to `geo`'s
/// implementation.
fn douglas_peucker(points: &[Point], tolerance: f64) -> Vec<Point> {
    use geo::{algorithm::simplify::Simplify, Coord, LineString};

    let coords: Vec<Coord<f64>> = points.iter().map(|&(x, y)| Coord { x, y }).collect();
    let line = LineString::new(coords);
    let simplified = line.simplify(&tolerance);
    simplified.coords().map(|c| (c.x, c.y)).collect()
}
