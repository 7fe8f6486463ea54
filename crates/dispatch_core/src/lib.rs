pub mod clock;
pub mod demand;
pub mod distributions;
pub mod ecs;
pub mod map;
pub mod matching;
pub mod routing;
pub mod runner;
pub mod scenario;
pub mod spatial;
pub mod systems;
pub mod telemetry;
pub mod telemetry_export;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
