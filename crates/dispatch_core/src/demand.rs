//! Synthetic demand: random trips and the gaps between their requests.

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::distributions::InterArrivalDistribution;
use crate::ecs::Location;
use crate::routing::{NodeId, RoadGraph, RoutingEngine};

/// Destinations tried before a rider is given a zero-length trip.
const MAX_DESTINATION_ATTEMPTS: usize = 32;

#[derive(Debug, Resource)]
pub struct DemandGenerator {
    rng: StdRng,
    inter_arrival: Box<dyn InterArrivalDistribution>,
    samples_drawn: u64,
}

impl DemandGenerator {
    pub fn new(seed: u64, inter_arrival: Box<dyn InterArrivalDistribution>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            inter_arrival,
            samples_drawn: 0,
        }
    }

    /// A uniformly random node, or `None` for an empty graph.
    pub fn random_node(&mut self, graph: &RoadGraph) -> Option<NodeId> {
        random_node(&mut self.rng, graph)
    }

    /// A random location on the graph.
    pub fn random_location(&mut self, graph: &RoadGraph) -> Option<Location> {
        let node = self.random_node(graph)?;
        Some(Location::new(node, graph.coordinate(node)?))
    }

    /// A random `(start, destination)` pair where the destination is reachable
    /// from the start and differs from it whenever the graph allows.
    pub fn next_trip(&mut self, routing: &RoutingEngine) -> Option<(Location, Location)> {
        let graph = routing.graph();
        let start = self.random_location(graph)?;
        if graph.node_count() > 1 {
            for _ in 0..MAX_DESTINATION_ATTEMPTS {
                let Some(candidate) = self.random_location(graph) else {
                    break;
                };
                if candidate.node != start.node && routing.is_reachable(start.node, candidate.node)
                {
                    return Some((start, candidate));
                }
            }
            warn!(
                start = %start.node,
                attempts = MAX_DESTINATION_ATTEMPTS,
                "no reachable destination found, using a zero-length trip"
            );
        }
        Some((start, start))
    }

    /// Delay until the next request, or `None` when the distribution never fires.
    pub fn next_delay_ms(&mut self) -> Option<u64> {
        let sample = self.inter_arrival.sample_ms(self.samples_drawn);
        self.samples_drawn += 1;
        if sample.is_finite() {
            Some(sample.max(0.0).round() as u64)
        } else {
            None
        }
    }
}

fn random_node(rng: &mut StdRng, graph: &RoadGraph) -> Option<NodeId> {
    let count = graph.node_count();
    if count == 0 {
        return None;
    }
    Some(NodeId(rng.gen_range(0..count) as u32))
}
