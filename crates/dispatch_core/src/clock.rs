//! Virtual clock and the time-ordered event queue.
//!
//! Time is a `u64` count of milliseconds since the start of the run. Events
//! with the same timestamp are popped in insertion order via a sequence number
//! assigned by [`SimulationClock`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

pub const ONE_SEC_MS: u64 = 1000;

/// Converts a travel time in seconds to whole milliseconds, rounding to nearest.
pub fn secs_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * ONE_SEC_MS as f64).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A rider asks for a car.
    RiderRequest(Entity),
    /// A car reaches the end of its current leg.
    Arrival(Entity),
}

impl EventKind {
    /// The entity this event is about.
    pub fn subject(&self) -> Entity {
        match self {
            EventKind::RiderRequest(rider) => *rider,
            EventKind::Arrival(car) => *car,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::RiderRequest(_) => "rider_request",
            EventKind::Arrival(_) => "arrival",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub sequence: u64,
    pub kind: EventKind,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by (timestamp, sequence).
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event currently being handled. Inserted by the runner before each step.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: u64,
    next_sequence: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Schedules `kind` at an absolute time. Times in the past are moved up to `now`.
    pub fn schedule_at(&mut self, timestamp: u64, kind: EventKind) -> Event {
        debug_assert!(
            timestamp >= self.now,
            "event timestamp must be >= current time"
        );
        let event = Event {
            timestamp: timestamp.max(self.now),
            sequence: self.next_sequence,
            kind,
        };
        self.next_sequence += 1;
        self.events.push(event);
        event
    }

    pub fn schedule_in(&mut self, delay_ms: u64, kind: EventKind) -> Event {
        self.schedule_at(self.now.saturating_add(delay_ms), kind)
    }

    /// Schedules after a delay given in seconds, rounded to the nearest millisecond.
    pub fn schedule_in_secs(&mut self, delay_secs: f64, kind: EventKind) -> Event {
        self.schedule_in(secs_to_ms(delay_secs), kind)
    }

    /// Removes the earliest event and advances the clock to its timestamp.
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|event| event.timestamp)
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rider(n: u32) -> EventKind {
        EventKind::RiderRequest(Entity::from_raw(n))
    }

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(10, rider(1));
        clock.schedule_at(5, rider(2));
        clock.schedule_at(20, rider(3));
        assert_eq!(clock.next_event_time(), Some(5));
        assert_eq!(clock.pending_event_count(), 3);

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.timestamp, 10);
        assert_eq!(clock.now(), 10);

        let third = clock.pop_next().expect("third event");
        assert_eq!(third.timestamp, 20);
        assert_eq!(clock.now(), 20);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
        assert_eq!(clock.now(), 20);
    }

    #[test]
    fn equal_timestamps_pop_in_insertion_order() {
        let mut clock = SimulationClock::default();
        let kinds = [
            EventKind::Arrival(Entity::from_raw(9)),
            rider(1),
            EventKind::Arrival(Entity::from_raw(2)),
            rider(7),
        ];
        for kind in kinds {
            clock.schedule_at(100, kind);
        }
        let popped: Vec<EventKind> = std::iter::from_fn(|| clock.pop_next())
            .map(|event| event.kind)
            .collect();
        assert_eq!(popped, kinds);
    }

    #[test]
    fn schedule_in_is_relative_to_now() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(1_000, rider(1));
        clock.pop_next();

        let event = clock.schedule_in(250, rider(2));
        assert_eq!(event.timestamp, 1_250);
        let event = clock.schedule_in_secs(1.25, rider(3));
        assert_eq!(event.timestamp, 2_250);
        assert!(event.sequence > 0);
    }

    #[test]
    fn seconds_round_to_nearest_millisecond() {
        assert_eq!(secs_to_ms(10.0), 10_000);
        assert_eq!(secs_to_ms(0.0004), 0);
        assert_eq!(secs_to_ms(2.5), 2_500);
        assert_eq!(secs_to_ms(-3.0), 0);
        assert_eq!(secs_to_ms(f64::INFINITY), 0);
    }
}
