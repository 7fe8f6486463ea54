//! Telemetry / KPIs: completed trips and end-of-run aggregates.

use bevy_ecs::prelude::{Entity, Resource, World};
use serde::Serialize;

use crate::clock::{Event, SimulationClock};
use crate::ecs::{Car, Rider};

/// One completed trip, recorded when the car reaches the rider's destination.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub rider: Entity,
    pub car: Entity,
    pub requested_at: u64,
    pub picked_up_at: u64,
    pub dropped_off_at: u64,
    /// Straight-line distance from start to destination.
    pub trip_distance: f64,
}

impl TripRecord {
    /// Builds the record for a rider that has been dropped off.
    ///
    /// Returns `None` while either the pickup or dropoff time is still unset.
    pub fn from_rider(rider_entity: Entity, car: Entity, rider: &Rider) -> Option<Self> {
        Some(Self {
            rider: rider_entity,
            car,
            requested_at: rider.requested_at,
            picked_up_at: rider.picked_up_at?,
            dropped_off_at: rider.dropped_off_at?,
            trip_distance: rider.trip_distance(),
        })
    }

    /// Time from request to pickup.
    pub fn wait_ms(&self) -> u64 {
        self.picked_up_at.saturating_sub(self.requested_at)
    }

    /// Time from pickup to dropoff.
    pub fn trip_duration_ms(&self) -> u64 {
        self.dropped_off_at.saturating_sub(self.picked_up_at)
    }
}

/// Collects simulation telemetry. Insert as a resource to record completed trips.
#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub completed_trips: Vec<TripRecord>,
}

impl SimTelemetry {
    pub fn record_trip(&mut self, record: TripRecord) {
        self.completed_trips.push(record);
    }

    pub fn completed_count(&self) -> usize {
        self.completed_trips.len()
    }
}

/// Every handled event in order. Present only when a run asks for it.
#[derive(Debug, Default, Resource)]
pub struct EventLog {
    pub events: Vec<Event>,
}

/// Aggregate results of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    pub completed_trips: usize,
    pub average_wait_ms: f64,
    pub average_trip_duration_ms: f64,
    pub elapsed_ms: u64,
    /// Mean over cars of busy time divided by elapsed time.
    pub driver_utilization: f64,
    pub cars: usize,
}

impl RunMetrics {
    /// Aggregates the trip log and every car in `world` at the current clock time.
    pub fn collect(world: &mut World) -> Self {
        let elapsed_ms = world
            .get_resource::<SimulationClock>()
            .map(|clock| clock.now())
            .unwrap_or(0);
        let busy_times: Vec<u64> = world
            .query::<&Car>()
            .iter(world)
            .map(|car| car.busy_time_at(elapsed_ms))
            .collect();
        let trips = world
            .get_resource::<SimTelemetry>()
            .map(|telemetry| telemetry.completed_trips.as_slice())
            .unwrap_or(&[]);
        Self::from_parts(trips, &busy_times, elapsed_ms)
    }

    pub fn from_parts(trips: &[TripRecord], busy_times_ms: &[u64], elapsed_ms: u64) -> Self {
        let average_wait_ms = mean(trips.iter().map(|t| t.wait_ms() as f64), trips.len());
        let average_trip_duration_ms =
            mean(trips.iter().map(|t| t.trip_duration_ms() as f64), trips.len());
        let driver_utilization = if elapsed_ms == 0 {
            0.0
        } else {
            mean(
                busy_times_ms
                    .iter()
                    .map(|&busy| busy as f64 / elapsed_ms as f64),
                busy_times_ms.len(),
            )
        };
        Self {
            completed_trips: trips.len(),
            average_wait_ms,
            average_trip_duration_ms,
            elapsed_ms,
            driver_utilization,
            cars: busy_times_ms.len(),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}
