//! Routing engine: shortest travel times over the road graph.
//!
//! [`RoutingEngine`] owns the immutable [`RoadGraph`] and answers point-to-point
//! queries with Dijkstra's algorithm. A bounded query gives up as soon as every
//! remaining candidate is slower than the bound, which lets the dispatcher skip
//! exact work for cars already known to lose against the current best.
//!
//! Completed searches are kept in an LRU cache keyed by `(source, destination)`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use bevy_ecs::prelude::Resource;
use lru::LruCache;
use ordered_float::OrderedFloat;

pub mod graph;

pub use graph::{Edge, GraphError, NodeId, RoadGraph};

/// Default number of cached point-to-point results.
pub const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// A shortest path and its total travel time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Nodes from source to destination inclusive; empty when source equals destination.
    pub path: Vec<NodeId>,
    pub travel_time: f64,
}

/// Outcome of a (possibly bounded) shortest-path search.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSearch {
    Found(Route),
    /// The search stopped early; the true travel time is at least `at_least`,
    /// which is greater than the bound that was passed in.
    ExceedsBound { at_least: f64 },
    Unreachable,
}

impl PathSearch {
    /// Exact travel time for `Found`, a lower bound for `ExceedsBound`, infinity otherwise.
    pub fn travel_time(&self) -> f64 {
        match self {
            PathSearch::Found(route) => route.travel_time,
            PathSearch::ExceedsBound { at_least } => *at_least,
            PathSearch::Unreachable => f64::INFINITY,
        }
    }

    pub fn route(&self) -> Option<&Route> {
        match self {
            PathSearch::Found(route) => Some(route),
            _ => None,
        }
    }

    pub fn into_route(self) -> Option<Route> {
        match self {
            PathSearch::Found(route) => Some(route),
            _ => None,
        }
    }

    /// Only complete answers are cached; an early exit depends on the bound.
    fn is_cacheable(&self) -> bool {
        !matches!(self, PathSearch::ExceedsBound { .. })
    }
}

/// ECS resource owning the road graph and the route cache.
#[derive(Resource)]
pub struct RoutingEngine {
    graph: RoadGraph,
    cache: Option<Mutex<LruCache<(NodeId, NodeId), PathSearch>>>,
}

impl RoutingEngine {
    pub fn new(graph: RoadGraph) -> Self {
        Self::with_cache_capacity(graph, DEFAULT_ROUTE_CACHE_CAPACITY)
    }

    /// A capacity of 0 disables caching.
    pub fn with_cache_capacity(graph: RoadGraph, capacity: usize) -> Self {
        Self {
            graph,
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Builds the engine from undirected edges.
    pub fn load(edges: impl IntoIterator<Item = Edge>) -> Result<Self, GraphError> {
        Ok(Self::new(RoadGraph::from_edges(edges)?))
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    /// Unbounded shortest path.
    pub fn shortest_path(&self, source: NodeId, destination: NodeId) -> PathSearch {
        self.shortest_path_bounded(source, destination, f64::INFINITY)
    }

    /// Shortest path that stops once the cheapest frontier entry exceeds `bound`.
    ///
    /// When `bound` is at least the true travel time the result equals the
    /// unbounded one. Otherwise the reported travel time is never below `bound`.
    pub fn shortest_path_bounded(
        &self,
        source: NodeId,
        destination: NodeId,
        bound: f64,
    ) -> PathSearch {
        if source == destination {
            return PathSearch::Found(Route {
                path: Vec::new(),
                travel_time: 0.0,
            });
        }

        let key = (source, destination);
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                if let Some(hit) = cache.get(&key) {
                    return hit.clone();
                }
            }
        }

        let result = dijkstra(&self.graph, source, destination, bound);

        if result.is_cacheable() {
            if let Some(cache) = &self.cache {
                if let Ok(mut cache) = cache.lock() {
                    cache.put(key, result.clone());
                }
            }
        }
        result
    }

    /// Travel time in seconds, or `None` when the destination is unreachable.
    pub fn travel_time(&self, source: NodeId, destination: NodeId) -> Option<f64> {
        self.shortest_path(source, destination)
            .route()
            .map(|route| route.travel_time)
    }

    pub fn is_reachable(&self, source: NodeId, destination: NodeId) -> bool {
        self.travel_time(source, destination).is_some()
    }
}

fn dijkstra(graph: &RoadGraph, source: NodeId, destination: NodeId, bound: f64) -> PathSearch {
    let node_count = graph.node_count();
    if source.index() >= node_count || destination.index() >= node_count {
        return PathSearch::Unreachable;
    }

    let mut best = vec![f64::INFINITY; node_count];
    let mut previous: Vec<Option<NodeId>> = vec![None; node_count];
    let mut frontier = BinaryHeap::new();

    best[source.index()] = 0.0;
    frontier.push(Reverse((OrderedFloat(0.0), source)));

    while let Some(Reverse((OrderedFloat(distance), node))) = frontier.pop() {
        if distance > best[node.index()] {
            continue;
        }
        if distance > bound {
            return PathSearch::ExceedsBound { at_least: distance };
        }
        if node == destination {
            return PathSearch::Found(Route {
                path: reconstruct_path(&previous, source, destination),
                travel_time: distance,
            });
        }
        for &(next, weight) in graph.neighbors(node) {
            let candidate = distance + weight;
            if candidate < best[next.index()] {
                best[next.index()] = candidate;
                previous[next.index()] = Some(node);
                frontier.push(Reverse((OrderedFloat(candidate), next)));
            }
        }
    }

    PathSearch::Unreachable
}

fn reconstruct_path(previous: &[Option<NodeId>], source: NodeId, destination: NodeId) -> Vec<NodeId> {
    let mut path = vec![destination];
    let mut current = destination;
    while current != source {
        match previous[current.index()] {
            Some(prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
