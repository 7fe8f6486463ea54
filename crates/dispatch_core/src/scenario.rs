//! Scenario setup: turn parameters and a road graph into a populated world.
//!
//! Cars are parked on uniformly random nodes and a batch of initial rider
//! requests is scheduled at time zero. Every successful match then feeds one
//! more synthetic request into the clock, so demand keeps flowing until a stop
//! condition ends the run.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use bevy_ecs::prelude::{Resource, World};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::{EventKind, SimulationClock, ONE_SEC_MS};
use crate::demand::DemandGenerator;
use crate::distributions::ExponentialInterArrival;
use crate::ecs::{Car, Rider};
use crate::map::{load_map, MapLoadError};
use crate::routing::{NodeId, RoadGraph, RoutingEngine, DEFAULT_ROUTE_CACHE_CAPACITY};
use crate::spatial::{Point, Rect, SpatialIndex, DEFAULT_NODE_CAPACITY};
use crate::telemetry::{EventLog, SimTelemetry};

/// Straight-line candidates routed per request.
pub const DEFAULT_CANDIDATE_COUNT: usize = 5;
/// Delay before an unmatched request is retried.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5 * ONE_SEC_MS;

/// Extra room around the map when sizing the quadtree root.
const BOUNDARY_MARGIN: f64 = 1.0;
/// Mixed into the seed so inter-arrival sampling does not share a stream with node selection.
const INTER_ARRIVAL_SEED_SALT: u64 = 0x5eed_cafe;

/// Stop before handling any event at or after this time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Resource)]
pub struct SimulationEndTimeMs(pub u64);

/// Stop once this many trips have been logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Resource)]
pub struct MaxCompletedTrips(pub usize);

/// Tuning for the request handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Resource)]
pub struct DispatchConfig {
    /// How many straight-line nearest cars are routed (K).
    pub candidate_count: usize,
    pub retry_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug)]
pub enum ScenarioError {
    /// The road graph has no nodes to place cars or riders on.
    EmptyGraph,
    /// `candidate_count` must be at least 1.
    NoCandidates,
    /// A car was parked on a node the spatial index could not hold.
    CarOutsideIndex { node: NodeId, point: Point },
    Map(MapLoadError),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::EmptyGraph => write!(f, "road graph has no nodes"),
            ScenarioError::NoCandidates => write!(f, "candidate_count must be at least 1"),
            ScenarioError::CarOutsideIndex { node, point } => write!(
                f,
                "car at node {node} ({}, {}) lies outside the spatial index",
                point.x, point.y
            ),
            ScenarioError::Map(err) => write!(f, "{err}"),
            ScenarioError::Io(err) => write!(f, "failed to read scenario: {err}"),
            ScenarioError::Json(err) => write!(f, "invalid scenario file: {err}"),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Map(err) => Some(err),
            ScenarioError::Io(err) => Some(err),
            ScenarioError::Json(err) => Some(err),
            ScenarioError::EmptyGraph
            | ScenarioError::NoCandidates
            | ScenarioError::CarOutsideIndex { .. } => None,
        }
    }
}

impl From<MapLoadError> for ScenarioError {
    fn from(err: MapLoadError) -> Self {
        ScenarioError::Map(err)
    }
}

impl From<io::Error> for ScenarioError {
    fn from(err: io::Error) -> Self {
        ScenarioError::Io(err)
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        ScenarioError::Json(err)
    }
}

/// Parameters for building a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    pub num_cars: usize,
    /// Riders requesting at time zero.
    pub initial_requests: usize,
    /// Seed for car placement, trip selection and inter-arrival sampling.
    pub seed: u64,
    /// Mean gap between a match and the next synthetic request.
    pub mean_request_interval_secs: f64,
    pub candidate_count: usize,
    pub retry_delay_ms: u64,
    /// 0 disables the route cache.
    pub route_cache_capacity: usize,
    pub quadtree_node_capacity: usize,
    pub simulation_end_time_ms: Option<u64>,
    pub max_completed_trips: Option<usize>,
    /// Keep every handled event in an [`EventLog`] resource.
    pub record_events: bool,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            num_cars: 20,
            initial_requests: 10,
            seed: 42,
            mean_request_interval_secs: 30.0,
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            route_cache_capacity: DEFAULT_ROUTE_CACHE_CAPACITY,
            quadtree_node_capacity: DEFAULT_NODE_CAPACITY,
            simulation_end_time_ms: Some(60 * 60 * ONE_SEC_MS),
            max_completed_trips: None,
            record_events: false,
        }
    }
}

impl ScenarioParams {
    /// Reads parameters from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cars(mut self, num_cars: usize) -> Self {
        self.num_cars = num_cars;
        self
    }

    pub fn with_initial_requests(mut self, count: usize) -> Self {
        self.initial_requests = count;
        self
    }

    pub fn with_mean_request_interval_secs(mut self, secs: f64) -> Self {
        self.mean_request_interval_secs = secs;
        self
    }

    pub fn with_candidate_count(mut self, k: usize) -> Self {
        self.candidate_count = k;
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_route_cache_capacity(mut self, capacity: usize) -> Self {
        self.route_cache_capacity = capacity;
        self
    }

    pub fn with_end_time_ms(mut self, end_ms: u64) -> Self {
        self.simulation_end_time_ms = Some(end_ms);
        self
    }

    pub fn without_end_time(mut self) -> Self {
        self.simulation_end_time_ms = None;
        self
    }

    pub fn with_max_completed_trips(mut self, trips: usize) -> Self {
        self.max_completed_trips = Some(trips);
        self
    }

    pub fn with_event_log(mut self) -> Self {
        self.record_events = true;
        self
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            candidate_count: self.candidate_count,
            retry_delay_ms: self.retry_delay_ms,
        }
    }
}

/// Loads the map at `map_path` and populates `world` from it.
pub fn load_scenario(
    world: &mut World,
    map_path: impl AsRef<Path>,
    params: &ScenarioParams,
) -> Result<(), ScenarioError> {
    let graph = load_map(map_path)?;
    build_scenario(world, graph, params)
}

/// Populates `world` with every resource the runner needs, spawns the cars
/// and schedules the initial rider requests.
pub fn build_scenario(
    world: &mut World,
    graph: RoadGraph,
    params: &ScenarioParams,
) -> Result<(), ScenarioError> {
    if params.candidate_count == 0 {
        return Err(ScenarioError::NoCandidates);
    }
    let boundary =
        Rect::enclosing(graph.coordinates(), BOUNDARY_MARGIN).ok_or(ScenarioError::EmptyGraph)?;

    let routing = RoutingEngine::with_cache_capacity(graph, params.route_cache_capacity);
    let mut index = SpatialIndex::with_capacity(boundary, params.quadtree_node_capacity);
    let mut clock = SimulationClock::default();
    let mut demand = DemandGenerator::new(
        params.seed,
        Box::new(ExponentialInterArrival::new(
            params.mean_request_interval_secs * ONE_SEC_MS as f64,
            params.seed ^ INTER_ARRIVAL_SEED_SALT,
        )),
    );

    for _ in 0..params.num_cars {
        let location = demand
            .random_location(routing.graph())
            .ok_or(ScenarioError::EmptyGraph)?;
        let car = world.spawn(Car::new(location)).id();
        if !index.insert_car(car, location.point) {
            return Err(ScenarioError::CarOutsideIndex {
                node: location.node,
                point: location.point,
            });
        }
    }

    for _ in 0..params.initial_requests {
        let (start, destination) = demand.next_trip(&routing).ok_or(ScenarioError::EmptyGraph)?;
        let rider = world.spawn(Rider::new(start, destination, 0)).id();
        clock.schedule_at(0, EventKind::RiderRequest(rider));
    }

    info!(
        nodes = routing.graph().node_count(),
        edges = routing.graph().edge_count(),
        cars = params.num_cars,
        initial_requests = params.initial_requests,
        seed = params.seed,
        "scenario built"
    );

    world.insert_resource(clock);
    world.insert_resource(routing);
    world.insert_resource(index);
    world.insert_resource(demand);
    world.insert_resource(params.dispatch_config());
    world.insert_resource(SimTelemetry::default());
    if let Some(end_ms) = params.simulation_end_time_ms {
        world.insert_resource(SimulationEndTimeMs(end_ms));
    }
    if let Some(trips) = params.max_completed_trips {
        world.insert_resource(MaxCompletedTrips(trips));
    }
    if params.record_events {
        world.insert_resource(EventLog::default());
    }
    Ok(())
}
