//! Static road network: interned nodes, planar coordinates and a symmetric adjacency list.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::spatial::Point;

/// Dense index of a node within one [`RoadGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One undirected edge as it appears in a map file row.
///
/// Column order: `start_id,start_x,start_y,end_id,end_x,end_y,weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub start_id: String,
    pub start_x: f64,
    pub start_y: f64,
    pub end_id: String,
    pub end_x: f64,
    pub end_y: f64,
    /// Travel time in seconds.
    pub weight: f64,
}

impl Edge {
    pub fn new(start: (&str, Point), end: (&str, Point), weight: f64) -> Self {
        Self {
            start_id: start.0.to_string(),
            start_x: start.1.x,
            start_y: start.1.y,
            end_id: end.0.to_string(),
            end_x: end.1.x,
            end_y: end.1.y,
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Weights must be finite and nonnegative for shortest paths to be correct.
    InvalidWeight {
        start: String,
        end: String,
        weight: f64,
    },
    /// Coordinates must be finite so every node fits in the spatial index.
    InvalidCoordinate { node: String, x: f64, y: f64 },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidWeight { start, end, weight } => write!(
                f,
                "edge {start} <-> {end} has weight {weight}; weights must be finite and >= 0"
            ),
            GraphError::InvalidCoordinate { node, x, y } => {
                write!(f, "node {node} has non-finite coordinate ({x}, {y})")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Immutable weighted road graph.
///
/// Every edge is stored in both directions with the same weight.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    index: HashMap<String, NodeId>,
    names: Vec<String>,
    coordinates: Vec<Point>,
    adjacency: Vec<Vec<(NodeId, f64)>>,
    edge_count: usize,
}

impl RoadGraph {
    /// Builds the graph from undirected edges, rejecting negative or non-finite
    /// weights and non-finite coordinates.
    ///
    /// A node that appears again with different coordinates keeps the last ones seen.
    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Result<Self, GraphError> {
        let mut graph = RoadGraph::default();
        for edge in edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }

    /// Adds one undirected edge. On error the graph is left unchanged.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        for (node, x, y) in [
            (&edge.start_id, edge.start_x, edge.start_y),
            (&edge.end_id, edge.end_x, edge.end_y),
        ] {
            if !x.is_finite() || !y.is_finite() {
                return Err(GraphError::InvalidCoordinate {
                    node: node.clone(),
                    x,
                    y,
                });
            }
        }
        if !edge.weight.is_finite() || edge.weight < 0.0 {
            return Err(GraphError::InvalidWeight {
                start: edge.start_id,
                end: edge.end_id,
                weight: edge.weight,
            });
        }
        let start = self.intern(edge.start_id, Point::new(edge.start_x, edge.start_y));
        let end = self.intern(edge.end_id, Point::new(edge.end_x, edge.end_y));
        self.adjacency[start.index()].push((end, edge.weight));
        self.adjacency[end.index()].push((start, edge.weight));
        self.edge_count += 1;
        Ok(())
    }

    fn intern(&mut self, name: String, point: Point) -> NodeId {
        if let Some(&id) = self.index.get(&name) {
            self.coordinates[id.index()] = point;
            return id;
        }
        let id = NodeId(self.names.len() as u32);
        self.index.insert(name.clone(), id);
        self.names.push(name);
        self.coordinates.push(point);
        self.adjacency.push(Vec::new());
        id
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Number of undirected edges loaded.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.names.get(node.index()).map(String::as_str)
    }

    pub fn coordinate(&self, node: NodeId) -> Option<Point> {
        self.coordinates.get(node.index()).copied()
    }

    pub fn neighbors(&self, node: NodeId) -> &[(NodeId, f64)] {
        self.adjacency
            .get(node.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.names.len() as u32).map(NodeId)
    }

    pub fn coordinates(&self) -> impl Iterator<Item = Point> + '_ {
        self.coordinates.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_stored_symmetrically() {
        let graph = RoadGraph::from_edges([
            Edge::new(("A", Point::new(0.0, 0.0)), ("B", Point::new(1.0, 0.0)), 4.0),
            Edge::new(("B", Point::new(1.0, 0.0)), ("C", Point::new(2.0, 0.0)), 2.5),
        ])
        .expect("valid graph");

        let a = graph.node_id("A").expect("A");
        let b = graph.node_id("B").expect("B");
        let c = graph.node_id("C").expect("C");
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.neighbors(a), &[(b, 4.0)]);
        assert_eq!(graph.neighbors(b), &[(a, 4.0), (c, 2.5)]);
        assert_eq!(graph.neighbors(c), &[(b, 2.5)]);
        assert_eq!(graph.name(c), Some("C"));
        assert_eq!(graph.coordinate(b), Some(Point::new(1.0, 0.0)));
    }

    #[test]
    fn rejects_negative_and_non_finite_weights() {
        let origin = Point::new(0.0, 0.0);
        for weight in [-1.0, f64::NAN, f64::INFINITY] {
            let err = RoadGraph::from_edges([Edge::new(("A", origin), ("B", origin), weight)])
                .expect_err("invalid weight");
            assert!(matches!(err, GraphError::InvalidWeight { .. }));
        }
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let origin = Point::new(0.0, 0.0);
        for bad in [Point::new(f64::NAN, 0.0), Point::new(0.0, f64::NEG_INFINITY)] {
            let err = RoadGraph::from_edges([Edge::new(("A", origin), ("B", bad), 1.0)])
                .expect_err("invalid coordinate");
            assert!(matches!(err, GraphError::InvalidCoordinate { ref node, .. } if node == "B"));
        }

        let mut graph = RoadGraph::default();
        assert!(graph
            .add_edge(Edge::new(("A", Point::new(f64::INFINITY, 0.0)), ("B", origin), 1.0))
            .is_err());
        assert!(graph.is_empty());
    }

    #[test]
    fn later_coordinates_win() {
        let graph = RoadGraph::from_edges([
            Edge::new(("A", Point::new(0.0, 0.0)), ("B", Point::new(1.0, 1.0)), 1.0),
            Edge::new(("A", Point::new(5.0, 5.0)), ("C", Point::new(2.0, 2.0)), 1.0),
        ])
        .expect("valid graph");
        let a = graph.node_id("A").expect("A");
        assert_eq!(graph.coordinate(a), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn unknown_nodes_have_no_neighbors() {
        let graph = RoadGraph::default();
        assert!(graph.is_empty());
        assert!(graph.neighbors(NodeId(3)).is_empty());
        assert_eq!(graph.coordinate(NodeId(3)), None);
    }
}
