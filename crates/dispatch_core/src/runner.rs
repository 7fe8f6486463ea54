//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each step
//! pops the next event from [SimulationClock], inserts it as [CurrentEvent],
//! then runs the schedule registered for that event kind.

use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::{apply_deferred, ExecutorKind, IntoSystemConfigs};
use tracing::trace;

use crate::clock::{CurrentEvent, Event, EventKind, SimulationClock};
use crate::scenario::{MaxCompletedTrips, SimulationEndTimeMs};
use crate::systems::{arrival::arrival_system, rider_request::rider_request_system};
use crate::telemetry::{EventLog, SimTelemetry};

/// One schedule per event kind.
pub struct DispatchSchedules {
    rider_request: Schedule,
    arrival: Schedule,
}

impl DispatchSchedules {
    pub fn new() -> Self {
        let mut rider_request = single_threaded();
        rider_request.add_systems((rider_request_system, apply_deferred).chain());

        let mut arrival = single_threaded();
        arrival.add_systems((arrival_system, apply_deferred).chain());

        Self {
            rider_request,
            arrival,
        }
    }

    fn for_kind(&mut self, kind: EventKind) -> &mut Schedule {
        match kind {
            EventKind::RiderRequest(_) => &mut self.rider_request,
            EventKind::Arrival(_) => &mut self.arrival,
        }
    }
}

impl Default for DispatchSchedules {
    fn default() -> Self {
        Self::new()
    }
}

fn single_threaded() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule
}

/// Whether a stop condition holds before the next event is handled.
///
/// True when the trip target in [MaxCompletedTrips] is reached, or when the
/// next event is at or past [SimulationEndTimeMs].
pub fn should_stop(world: &World) -> bool {
    if let Some(max_trips) = world.get_resource::<MaxCompletedTrips>() {
        let completed = world
            .get_resource::<SimTelemetry>()
            .map(SimTelemetry::completed_count)
            .unwrap_or(0);
        if completed >= max_trips.0 {
            return true;
        }
    }

    let stop_at = world.get_resource::<SimulationEndTimeMs>().map(|e| e.0);
    let next_ts = world
        .get_resource::<SimulationClock>()
        .and_then(|c| c.next_event_time());
    matches!((stop_at, next_ts), (Some(end_ms), Some(ts)) if ts >= end_ms)
}

/// Runs one simulation step: pops the next event, inserts it as [CurrentEvent], then runs
/// the schedule for its kind.
/// Returns `true` if an event was processed, `false` if the clock was empty or a stop
/// condition holds.
pub fn run_next_event(world: &mut World, schedules: &mut DispatchSchedules) -> bool {
    run_next_event_with_hook(world, schedules, |_, _| {})
}

/// Runs one simulation step and invokes `hook` after the schedule completes.
pub fn run_next_event_with_hook<F>(
    world: &mut World,
    schedules: &mut DispatchSchedules,
    mut hook: F,
) -> bool
where
    F: FnMut(&World, &Event),
{
    if should_stop(world) {
        return false;
    }

    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    trace!(
        timestamp = event.timestamp,
        sequence = event.sequence,
        kind = event.kind.label(),
        entity = ?event.kind.subject(),
        "handling event"
    );
    world.insert_resource(CurrentEvent(event));

    if let Some(mut log) = world.get_resource_mut::<EventLog>() {
        log.events.push(event);
    }

    schedules.for_kind(event.kind).run(world);
    hook(world, &event);
    true
}

/// Runs simulation steps until the queue is empty, a stop condition holds, or `max_steps`
/// is reached. Returns the number of steps executed.
pub fn run_until_stopped(
    world: &mut World,
    schedules: &mut DispatchSchedules,
    max_steps: usize,
) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedules) {
        steps += 1;
    }
    steps
}

/// Runs simulation steps until stopped and invokes `hook` after each step.
pub fn run_until_stopped_with_hook<F>(
    world: &mut World,
    schedules: &mut DispatchSchedules,
    max_steps: usize,
    mut hook: F,
) -> usize
where
    F: FnMut(&World, &Event),
{
    let mut steps = 0;
    while steps < max_steps && run_next_event_with_hook(world, schedules, &mut hook) {
        steps += 1;
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::Entity;

    use crate::ecs::{Car, CarStatus, Location, Rider};
    use crate::routing::{NodeId, RoutingEngine};
    use crate::scenario::DispatchConfig;
    use crate::spatial::{Point, Rect, SpatialIndex};
    use crate::telemetry::TripRecord;

    fn bare_world() -> World {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        world.insert_resource(SimTelemetry::default());
        world
    }

    #[test]
    fn empty_clock_runs_nothing() {
        let mut world = bare_world();
        let mut schedules = DispatchSchedules::new();
        assert!(!run_next_event(&mut world, &mut schedules));
        assert_eq!(run_until_stopped(&mut world, &mut schedules, 10), 0);
    }

    #[test]
    fn end_time_stops_before_late_events() {
        let mut world = bare_world();
        world.insert_resource(SimulationEndTimeMs(1_000));
        world
            .resource_mut::<SimulationClock>()
            .schedule_at(1_000, EventKind::RiderRequest(Entity::from_raw(1)));
        assert!(should_stop(&world));

        let mut schedules = DispatchSchedules::new();
        assert!(!run_next_event(&mut world, &mut schedules));
        assert_eq!(world.resource::<SimulationClock>().pending_event_count(), 1);
        assert_eq!(world.resource::<SimulationClock>().now(), 0);
    }

    #[test]
    fn trip_target_stops_the_run() {
        let mut world = bare_world();
        world.insert_resource(MaxCompletedTrips(1));
        assert!(!should_stop(&world));
        world.resource_mut::<SimTelemetry>().record_trip(TripRecord {
            rider: Entity::from_raw(1),
            car: Entity::from_raw(2),
            requested_at: 0,
            picked_up_at: 0,
            dropped_off_at: 0,
            trip_distance: 0.0,
        });
        assert!(should_stop(&world));
    }

    #[test]
    fn handled_events_are_logged_in_order() {
        let mut world = bare_world();
        let routing = RoutingEngine::load([crate::routing::Edge::new(
            ("A", Point::new(0.0, 0.0)),
            ("B", Point::new(5.0, 0.0)),
            5.0,
        )])
        .expect("valid graph");
        world.insert_resource(routing);
        world.insert_resource(SpatialIndex::new(Rect::from_origin_size(
            -1.0, -1.0, 10.0, 10.0,
        )));
        world.insert_resource(DispatchConfig::default());
        world.insert_resource(EventLog::default());

        let a = Location::new(NodeId(0), Point::new(0.0, 0.0));
        let b = Location::new(NodeId(1), Point::new(5.0, 0.0));
        let car = world.spawn(Car::new(a)).id();
        world.resource_mut::<SpatialIndex>().insert_car(car, a.point);
        let rider = world.spawn(Rider::new(a, b, 0)).id();
        world
            .resource_mut::<SimulationClock>()
            .schedule_at(0, EventKind::RiderRequest(rider));

        let mut schedules = DispatchSchedules::new();
        let mut seen = Vec::new();
        let steps = run_until_stopped_with_hook(&mut world, &mut schedules, 100, |_, event| {
            seen.push(event.kind)
        });

        assert_eq!(steps, 3);
        assert_eq!(
            seen,
            vec![
                EventKind::RiderRequest(rider),
                EventKind::Arrival(car),
                EventKind::Arrival(car),
            ]
        );
        let logged: Vec<u64> = world
            .resource::<EventLog>()
            .events
            .iter()
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(logged, vec![0, 0, 5_000]);
        assert_eq!(
            world.get::<Car>(car).map(|c| c.status),
            Some(CarStatus::Available)
        );
    }
}
