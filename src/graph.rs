//! Graph adapter: wraps a loaded road graph and exposes the four primitives
//! the routing core needs, decoupled from whatever on-disk or
//! network-backed source produced it.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::{Result, RouteError};
use crate::GpsPoint;

/// Opaque road-graph node identifier.
pub type NodeId = u64;

#[derive(Debug, Clone)]
struct Edge {
    to: NodeId,
    length_m: f64,
    /// Geographic polyline for this edge, endpoints inclusive. `None` means
    /// "render as a straight segment between the two node coordinates."
    geometry: Option<Vec<GpsPoint>>,
}

#[derive(Clone, Copy, Debug)]
struct IndexedNode {
    id: NodeId,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

impl PointDistance for IndexedNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.lng - point[0];
        let dy = self.lat - point[1];
        dx * dx + dy * dy
    }
}

/// A loaded road graph: node coordinates plus a directed adjacency list.
/// Immutable after construction, per the process-wide cache's contract.
#[derive(Debug)]
pub struct Graph {
    nodes: HashMap<NodeId, GpsPoint>,
    adjacency: HashMap<NodeId, Vec<Edge>>,
    index: RTree<IndexedNode>,
}

impl Graph {
    /// Build a graph from its nodes and directed edges. `edges` entries are
    /// `(from, to, length_m, geometry)`; callers supplying an undirected
    /// source should pass both directions explicitly.
    pub fn new(
        nodes: Vec<(NodeId, GpsPoint)>,
        edges: Vec<(NodeId, NodeId, f64, Option<Vec<GpsPoint>>)>,
    ) -> Self {
        let index = RTree::bulk_load(
            nodes
                .iter()
                .map(|&(id, p)| IndexedNode {
                    id,
                    lng: p.lng,
                    lat: p.lat,
                })
                .collect(),
        );

        let mut adjacency: HashMap<NodeId, Vec<Edge>> = HashMap::new();
        for (from, to, length_m, geometry) in edges {
            adjacency.entry(from).or_default().push(Edge {
                to,
                length_m,
                geometry,
            });
        }

        Self {
            nodes: nodes.into_iter().collect(),
            adjacency,
            index,
        }
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find the nearest node to a geographic point.
    pub fn nearest_node(&self, point: GpsPoint) -> Result<NodeId> {
        self.index
            .nearest_neighbor(&[point.lng, point.lat])
            .map(|n| n.id)
            .ok_or_else(|| RouteError::GraphUnavailable {
                message: "graph has no nodes".to_string(),
            })
    }

    /// Coordinates of a node.
    pub fn coords(&self, node: NodeId) -> Result<GpsPoint> {
        self.nodes.get(&node).copied().ok_or(RouteError::Internal {
            message: format!("unknown node id {node}"),
        })
    }

    /// Length in meters of the directed edge `u -> v`, if it exists.
    pub fn edge_length(&self, u: NodeId, v: NodeId) -> Result<f64> {
        self.adjacency
            .get(&u)
            .and_then(|edges| edges.iter().find(|e| e.to == v))
            .map(|e| e.length_m)
            .ok_or_else(|| RouteError::Internal {
                message: format!("no edge {u} -> {v}"),
            })
    }

    /// Stored geometry for the directed edge `u -> v`, if any. Falls back
    /// to the straight segment between the two node coordinates when the
    /// graph carries no per-edge geometry.
    pub fn edge_geometry(&self, u: NodeId, v: NodeId) -> Result<Vec<GpsPoint>> {
        let edges = self
            .adjacency
            .get(&u)
            .ok_or_else(|| RouteError::Internal {
                message: format!("no outgoing edges from node {u}"),
            })?;
        let edge = edges
            .iter()
            .find(|e| e.to == v)
            .ok_or_else(|| RouteError::Internal {
                message: format!("no edge {u} -> {v}"),
            })?;

        match &edge.geometry {
            Some(geom) => Ok(geom.clone()),
            None => Ok(vec![self.coords(u)?, self.coords(v)?]),
        }
    }

    /// Median edge length across the graph, used to bound acceptable
    /// endpoint drift when a route is supposed to loop back to its start.
    pub fn median_edge_length_m(&self) -> f64 {
        let mut lengths: Vec<f64> = self
            .adjacency
            .values()
            .flat_map(|edges| edges.iter().map(|e| e.length_m))
            .collect();
        if lengths.is_empty() {
            return 0.0;
        }
        lengths.sort_by(|a, b| a.partial_cmp(b).unwrap());
        lengths[lengths.len() / 2]
    }

    /// Dijkstra shortest path from `from` to `to` under a caller-supplied
    /// non-negative edge cost. Ties on path cost break toward the smaller
    /// neighbor node id, to keep results deterministic.
    pub fn shortest_path<F>(&self, from: NodeId, to: NodeId, cost_fn: F) -> Result<Vec<NodeId>>
    where
        F: Fn(NodeId, NodeId) -> f64,
    {
        if from == to {
            return Ok(vec![from]);
        }
        if !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return Err(RouteError::NoPath { from, to });
        }

        let mut dist: HashMap<NodeId, f64> = HashMap::new();
        let mut prev: HashMap<NodeId, NodeId> = HashMap::new();
        let mut heap: BinaryHeap<std::cmp::Reverse<(HeapCost, NodeId)>> = BinaryHeap::new();

        dist.insert(from, 0.0);
        heap.push(std::cmp::Reverse((HeapCost(0.0), from)));

        while let Some(std::cmp::Reverse((HeapCost(d), u))) = heap.pop() {
            if u == to {
                return Ok(reconstruct(&prev, from, to));
            }
            if d > *dist.get(&u).unwrap_or(&f64::INFINITY) {
                continue;
            }
            let Some(edges) = self.adjacency.get(&u) else {
                continue;
            };
            for edge in edges {
                let w = cost_fn(u, edge.to).max(0.0);
                let nd = d + w;
                if nd < *dist.get(&edge.to).unwrap_or(&f64::INFINITY) {
                    dist.insert(edge.to, nd);
                    prev.insert(edge.to, u);
                    heap.push(std::cmp::Reverse((HeapCost(nd), edge.to)));
                }
            }
        }

        Err(RouteError::NoPath { from, to })
    }

    /// Shortest path under the unweighted `edge_length` cost, the default
    /// `cost_fn` when the caller has no shape bias to apply.
    pub fn shortest_path_by_length(&self, from: NodeId, to: NodeId) -> Result<Vec<NodeId>> {
        self.shortest_path(from, to, |u, v| self.edge_length(u, v).unwrap_or(f64::INFINITY))
    }
}

fn reconstruct(prev: &HashMap<NodeId, NodeId>, from: NodeId, to: NodeId) -> Vec<NodeId> {
    let mut path = vec![to];
    let mut current = to;
    while current != from {
        current = prev[&current];
        path.push(current);
    }
    path.reverse();
    path
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct HeapCost(f64);

impl Eq for HeapCost {}

impl PartialOrd for HeapCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapCost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// External collaborator: loads a road graph covering a disc of the given
/// radius around a center point.
pub trait RoadGraphProvider: Send + Sync {
    fn get_graph(&self, center_lat: f64, center_lng: f64, radius_m: f64) -> Result<Graph>;
}
