use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::telemetry::{RunMetrics, SimTelemetry, TripRecord};

/// Flat row shape shared by the CSV writer.
#[derive(Debug, Serialize)]
struct TripRow {
    rider_entity: u64,
    car_entity: u64,
    requested_at: u64,
    picked_up_at: u64,
    dropped_off_at: u64,
    wait_ms: u64,
    trip_duration_ms: u64,
    trip_distance: f64,
}

impl From<&TripRecord> for TripRow {
    fn from(record: &TripRecord) -> Self {
        Self {
            rider_entity: record.rider.to_bits(),
            car_entity: record.car.to_bits(),
            requested_at: record.requested_at,
            picked_up_at: record.picked_up_at,
            dropped_off_at: record.dropped_off_at,
            wait_ms: record.wait_ms(),
            trip_duration_ms: record.trip_duration_ms(),
            trip_distance: record.trip_distance,
        }
    }
}

pub fn write_trip_log_parquet<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), Box<dyn Error>> {
    let trips = &telemetry.completed_trips;
    let mut rider_entities = Vec::with_capacity(trips.len());
    let mut car_entities = Vec::with_capacity(trips.len());
    let mut requested_at = Vec::with_capacity(trips.len());
    let mut picked_up_at = Vec::with_capacity(trips.len());
    let mut dropped_off_at = Vec::with_capacity(trips.len());
    let mut wait_ms = Vec::with_capacity(trips.len());
    let mut trip_duration_ms = Vec::with_capacity(trips.len());
    let mut trip_distance = Vec::with_capacity(trips.len());

    for record in trips {
        rider_entities.push(record.rider.to_bits());
        car_entities.push(record.car.to_bits());
        requested_at.push(record.requested_at);
        picked_up_at.push(record.picked_up_at);
        dropped_off_at.push(record.dropped_off_at);
        wait_ms.push(record.wait_ms());
        trip_duration_ms.push(record.trip_duration_ms());
        trip_distance.push(record.trip_distance);
    }

    let schema = Schema::new(vec![
        Field::new("rider_entity", DataType::UInt64, false),
        Field::new("car_entity", DataType::UInt64, false),
        Field::new("requested_at", DataType::UInt64, false),
        Field::new("picked_up_at", DataType::UInt64, false),
        Field::new("dropped_off_at", DataType::UInt64, false),
        Field::new("wait_ms", DataType::UInt64, false),
        Field::new("trip_duration_ms", DataType::UInt64, false),
        Field::new("trip_distance", DataType::Float64, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(rider_entities)),
        Arc::new(UInt64Array::from(car_entities)),
        Arc::new(UInt64Array::from(requested_at)),
        Arc::new(UInt64Array::from(picked_up_at)),
        Arc::new(UInt64Array::from(dropped_off_at)),
        Arc::new(UInt64Array::from(wait_ms)),
        Arc::new(UInt64Array::from(trip_duration_ms)),
        Arc::new(Float64Array::from(trip_distance)),
    ];

    write_record_batch(path, schema, arrays)
}

/// Writes the trip log as CSV with a header row.
pub fn write_trip_log_csv<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in &telemetry.completed_trips {
        writer.serialize(TripRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the run summary as pretty-printed JSON.
pub fn write_run_metrics_json<P: AsRef<Path>>(
    path: P,
    metrics: &RunMetrics,
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, metrics)?;
    Ok(())
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
