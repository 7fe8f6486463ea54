#![allow(dead_code)]

use bevy_ecs::prelude::{Entity, World};
use dispatch_core::ecs::{Car, Rider};
use dispatch_core::routing::RoadGraph;
use dispatch_core::scenario::{DispatchConfig, MaxCompletedTrips, SimulationEndTimeMs};
use dispatch_core::telemetry::{EventLog, SimTelemetry, TripRecord};
use dispatch_core::test_helpers::{create_test_world, spawn_car, spawn_rider_request};

/// Builder for small hand-placed worlds: named cars and timed rider requests.
pub struct TestWorldBuilder {
    graph: RoadGraph,
    cars: Vec<String>,
    requests: Vec<(String, String, u64)>,
    config: DispatchConfig,
    end_time_ms: Option<u64>,
    max_trips: Option<usize>,
    event_log: bool,
}

impl TestWorldBuilder {
    pub fn new(graph: RoadGraph) -> Self {
        Self {
            graph,
            cars: Vec::new(),
            requests: Vec::new(),
            config: DispatchConfig::default(),
            end_time_ms: None,
            max_trips: None,
            event_log: false,
        }
    }

    pub fn with_car_at(mut self, node: &str) -> Self {
        self.cars.push(node.to_string());
        self
    }

    pub fn with_request(mut self, from: &str, to: &str, at_ms: u64) -> Self {
        self.requests.push((from.to_string(), to.to_string(), at_ms));
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_candidate_count(mut self, k: usize) -> Self {
        self.config.candidate_count = k;
        self
    }

    pub fn with_end_time_ms(mut self, end_ms: u64) -> Self {
        self.end_time_ms = Some(end_ms);
        self
    }

    pub fn with_max_trips(mut self, trips: usize) -> Self {
        self.max_trips = Some(trips);
        self
    }

    pub fn with_event_log(mut self) -> Self {
        self.event_log = true;
        self
    }

    pub fn build(self) -> TestWorld {
        let mut world = create_test_world(self.graph);
        world.insert_resource(self.config);
        if let Some(end_ms) = self.end_time_ms {
            world.insert_resource(SimulationEndTimeMs(end_ms));
        }
        if let Some(trips) = self.max_trips {
            world.insert_resource(MaxCompletedTrips(trips));
        }
        if self.event_log {
            world.insert_resource(EventLog::default());
        }
        let cars = self
            .cars
            .iter()
            .map(|node| spawn_car(&mut world, node))
            .collect();
        let riders = self
            .requests
            .iter()
            .map(|(from, to, at)| spawn_rider_request(&mut world, from, to, *at))
            .collect();
        TestWorld { world, cars, riders }
    }
}

pub struct TestWorld {
    pub world: World,
    pub cars: Vec<Entity>,
    pub riders: Vec<Entity>,
}

impl TestWorld {
    pub fn car(&self, entity: Entity) -> &Car {
        self.world.get::<Car>(entity).expect("car exists")
    }

    pub fn rider(&self, entity: Entity) -> Option<&Rider> {
        self.world.get::<Rider>(entity)
    }

    pub fn trips(&self) -> &[TripRecord] {
        &self.world.resource::<SimTelemetry>().completed_trips
    }
}
