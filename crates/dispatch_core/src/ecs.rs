//! ECS components for cars and riders.
//!
//! A car moves `Available → EnRouteToPickup → EnRouteToDestination → Available`.
//! The only way to change its status is through [`Car::assign`], [`Car::pickup`]
//! and [`Car::dropoff`], each of which checks the state it starts from.

use std::fmt;

use bevy_ecs::prelude::{Component, Entity};

use crate::routing::NodeId;
use crate::spatial::Point;

/// A graph node together with its planar coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub node: NodeId,
    pub point: Point,
}

impl Location {
    pub fn new(node: NodeId, point: Point) -> Self {
        Self { node, point }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarStatus {
    Available,
    EnRouteToPickup,
    EnRouteToDestination,
}

impl fmt::Display for CarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CarStatus::Available => "available",
            CarStatus::EnRouteToPickup => "en route to pickup",
            CarStatus::EnRouteToDestination => "en route to destination",
        };
        f.write_str(name)
    }
}

/// A transition was requested from a status that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub action: &'static str,
    pub status: CarStatus,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot {} a car that is {}", self.action, self.status)
    }
}

impl std::error::Error for InvalidTransition {}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Car {
    pub location: Location,
    /// Present iff the car is not available.
    pub destination: Option<Location>,
    pub status: CarStatus,
    /// Travel time of the current leg in milliseconds.
    pub eta_ms: u64,
    /// Completed busy time in milliseconds.
    pub busy_ms: u64,
    /// Start of the in-progress busy period.
    pub busy_since: Option<u64>,
    pub rider: Option<Entity>,
}

impl Car {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            destination: None,
            status: CarStatus::Available,
            eta_ms: 0,
            busy_ms: 0,
            busy_since: None,
            rider: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == CarStatus::Available
    }

    /// Sends an available car to `pickup` for `rider`.
    pub fn assign(
        &mut self,
        rider: Entity,
        pickup: Location,
        eta_ms: u64,
        now: u64,
    ) -> Result<(), InvalidTransition> {
        self.expect_status(CarStatus::Available, "assign")?;
        self.status = CarStatus::EnRouteToPickup;
        self.destination = Some(pickup);
        self.eta_ms = eta_ms;
        self.busy_since = Some(now);
        self.rider = Some(rider);
        Ok(())
    }

    /// Arrives at the pickup point and heads for `dropoff`.
    pub fn pickup(&mut self, dropoff: Location, eta_ms: u64) -> Result<(), InvalidTransition> {
        self.expect_status(CarStatus::EnRouteToPickup, "pick up with")?;
        if let Some(pickup) = self.destination {
            self.location = pickup;
        }
        self.destination = Some(dropoff);
        self.status = CarStatus::EnRouteToDestination;
        self.eta_ms = eta_ms;
        Ok(())
    }

    /// Arrives at the rider's destination and becomes available again.
    ///
    /// Returns the rider that was on board.
    pub fn dropoff(&mut self, now: u64) -> Result<Option<Entity>, InvalidTransition> {
        self.expect_status(CarStatus::EnRouteToDestination, "drop off with")?;
        if let Some(destination) = self.destination.take() {
            self.location = destination;
        }
        self.status = CarStatus::Available;
        self.eta_ms = 0;
        if let Some(since) = self.busy_since.take() {
            self.busy_ms += now.saturating_sub(since);
        }
        Ok(self.rider.take())
    }

    /// Busy time up to `now`, counting an unfinished busy period.
    pub fn busy_time_at(&self, now: u64) -> u64 {
        let ongoing = self
            .busy_since
            .map(|since| now.saturating_sub(since))
            .unwrap_or(0);
        self.busy_ms + ongoing
    }

    fn expect_status(
        &self,
        expected: CarStatus,
        action: &'static str,
    ) -> Result<(), InvalidTransition> {
        if self.status == expected {
            Ok(())
        } else {
            Err(InvalidTransition {
                action,
                status: self.status,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiderState {
    Requesting,
    WaitingForPickup,
    InTransit,
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Rider {
    pub state: RiderState,
    pub start: Location,
    pub destination: Location,
    /// Simulation time of the first request.
    pub requested_at: u64,
    pub picked_up_at: Option<u64>,
    pub dropped_off_at: Option<u64>,
    pub assigned_car: Option<Entity>,
}

impl Rider {
    pub fn new(start: Location, destination: Location, requested_at: u64) -> Self {
        Self {
            state: RiderState::Requesting,
            start,
            destination,
            requested_at,
            picked_up_at: None,
            dropped_off_at: None,
            assigned_car: None,
        }
    }

    /// Straight-line distance between start and destination.
    pub fn trip_distance(&self) -> f64 {
        self.start.point.distance(self.destination.point)
    }
}
