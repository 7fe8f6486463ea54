//! Test helpers for common test setup and utilities.
//!
//! Small road graphs with known travel times plus a minimal world that the
//! runner can drive without a full scenario.

use bevy_ecs::prelude::{Entity, World};

use crate::clock::{EventKind, SimulationClock};
use crate::ecs::{Car, Location, Rider};
use crate::routing::{Edge, RoadGraph, RoutingEngine};
use crate::scenario::DispatchConfig;
use crate::spatial::{Point, Rect, SpatialIndex};
use crate::telemetry::SimTelemetry;

/// Two nodes, `A` at the origin and `B` at `(10, 0)`, joined by one edge.
///
/// # Panics
///
/// Panics if `weight` is negative or not finite.
pub fn two_node_graph(weight: f64) -> RoadGraph {
    RoadGraph::from_edges([Edge::new(
        ("A", Point::new(0.0, 0.0)),
        ("B", Point::new(10.0, 0.0)),
        weight,
    )])
    .expect("two-node graph weight must be valid")
}

/// A `width × height` grid with nodes named `"x,y"` at integer coordinates and
/// every horizontal or vertical neighbour joined with `weight`.
///
/// # Panics
///
/// Panics if `weight` is negative or not finite.
pub fn grid_graph(width: usize, height: usize, weight: f64) -> RoadGraph {
    let name = |x: usize, y: usize| format!("{x},{y}");
    let point = |x: usize, y: usize| Point::new(x as f64, y as f64);
    let mut edges = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if x + 1 < width {
                edges.push(Edge::new(
                    (&name(x, y), point(x, y)),
                    (&name(x + 1, y), point(x + 1, y)),
                    weight,
                ));
            }
            if y + 1 < height {
                edges.push(Edge::new(
                    (&name(x, y), point(x, y)),
                    (&name(x, y + 1), point(x, y + 1)),
                    weight,
                ));
            }
        }
    }
    RoadGraph::from_edges(edges).expect("grid weight must be valid")
}

/// Create a basic world around `graph` with the resources the handlers need.
///
/// No demand generator is inserted, so matches do not queue extra riders.
/// For full runs, use [`crate::scenario::build_scenario`].
///
/// # Panics
///
/// Panics if `graph` has no nodes.
pub fn create_test_world(graph: RoadGraph) -> World {
    let boundary = Rect::enclosing(graph.coordinates(), 1.0).expect("graph must have nodes");
    let mut world = World::new();
    world.insert_resource(SimulationClock::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(SpatialIndex::new(boundary));
    world.insert_resource(RoutingEngine::new(graph));
    world.insert_resource(DispatchConfig::default());
    world
}

/// The location of the node called `name`.
///
/// # Panics
///
/// Panics if the world has no routing engine or the node does not exist.
pub fn location(world: &World, name: &str) -> Location {
    let graph = world.resource::<RoutingEngine>().graph();
    let node = graph
        .node_id(name)
        .unwrap_or_else(|| panic!("unknown node {name}"));
    let point = graph.coordinate(node).expect("interned node has a coordinate");
    Location::new(node, point)
}

/// Spawns an available car parked at `node` and registers it in the spatial index.
pub fn spawn_car(world: &mut World, node: &str) -> Entity {
    let at = location(world, node);
    let car = world.spawn(Car::new(at)).id();
    assert!(
        world.resource_mut::<SpatialIndex>().insert_car(car, at.point),
        "car parked outside the spatial index"
    );
    car
}

/// Spawns a rider travelling `from → to` and schedules its request at `at_ms`.
pub fn spawn_rider_request(world: &mut World, from: &str, to: &str, at_ms: u64) -> Entity {
    let start = location(world, from);
    let destination = location(world, to);
    let rider = world.spawn(Rider::new(start, destination, at_ms)).id();
    world
        .resource_mut::<SimulationClock>()
        .schedule_at(at_ms, EventKind::RiderRequest(rider));
    rider
}
