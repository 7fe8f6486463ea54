#![allow(dead_code)]

use bevy_ecs::prelude::World;
use dispatch_core::clock::Event;
use dispatch_core::runner::{
    run_next_event, run_until_stopped, run_until_stopped_with_hook, DispatchSchedules,
};

/// Helper that owns reusable schedules so tests can step or drain the event queue.
pub struct ScheduleRunner {
    schedules: DispatchSchedules,
}

impl Default for ScheduleRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleRunner {
    pub fn new() -> Self {
        Self {
            schedules: DispatchSchedules::new(),
        }
    }

    /// Run a single event (returns `true` if an event was processed).
    pub fn run_one(&mut self, world: &mut World) -> bool {
        run_next_event(world, &mut self.schedules)
    }

    /// Run events until stopped or `max_steps` were handled.
    pub fn run_until_stopped(&mut self, world: &mut World, max_steps: usize) -> usize {
        run_until_stopped(world, &mut self.schedules, max_steps)
    }

    /// Run until stopped, returning every handled event.
    pub fn run_collecting(&mut self, world: &mut World, max_steps: usize) -> Vec<Event> {
        let mut events = Vec::new();
        run_until_stopped_with_hook(world, &mut self.schedules, max_steps, |_, event| {
            events.push(*event)
        });
        events
    }
}
