//! Run a dispatch scenario and print the run summary.
//!
//! Run with: cargo run -p dispatch_core --example scenario_run [map.csv] [params.json]
//!
//! Without arguments the bundled `data/city_map.csv` is used; set `RUST_LOG=debug`
//! to watch individual matches and trips.

use std::env;
use std::path::PathBuf;

use bevy_ecs::prelude::World;
use dispatch_core::clock::ONE_SEC_MS;
use dispatch_core::runner::{run_until_stopped, DispatchSchedules};
use dispatch_core::scenario::{load_scenario, ScenarioParams};
use dispatch_core::telemetry::{RunMetrics, SimTelemetry};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let map_path = args.next().map(PathBuf::from).unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/city_map.csv")
    });
    let params = match args.next() {
        Some(path) => ScenarioParams::from_json_file(path)?,
        None => ScenarioParams::default().with_seed(123).with_cars(12),
    };

    let mut world = World::new();
    load_scenario(&mut world, &map_path, &params)?;

    let mut schedules = DispatchSchedules::new();
    let steps = run_until_stopped(&mut world, &mut schedules, 2_000_000);

    let metrics = RunMetrics::collect(&mut world);
    println!("--- Scenario run ({} cars, seed {}) ---", metrics.cars, params.seed);
    println!("Steps executed: {steps}");
    println!(
        "Simulation time: {} s ({:.1} min)",
        metrics.elapsed_ms / ONE_SEC_MS,
        metrics.elapsed_ms as f64 / 60_000.0
    );
    println!("Completed trips: {}", metrics.completed_trips);
    println!("Average wait: {:.1} s", metrics.average_wait_ms / 1000.0);
    println!("Average trip: {:.1} s", metrics.average_trip_duration_ms / 1000.0);
    println!("Driver utilization: {:.1}%", metrics.driver_utilization * 100.0);

    let telemetry = world.resource::<SimTelemetry>();
    const SAMPLE: usize = 10;
    for (i, trip) in telemetry.completed_trips.iter().take(SAMPLE).enumerate() {
        println!(
            "  {}  rider={:?} car={:?}  wait={} s  trip={} s  distance={:.1}",
            i + 1,
            trip.rider,
            trip.car,
            trip.wait_ms() / ONE_SEC_MS,
            trip.trip_duration_ms() / ONE_SEC_MS,
            trip.trip_distance,
        );
    }
    Ok(())
}
