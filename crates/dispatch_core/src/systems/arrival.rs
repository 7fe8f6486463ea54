use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use tracing::debug;

use crate::clock::{secs_to_ms, CurrentEvent, EventKind, SimulationClock};
use crate::ecs::{Car, CarStatus, Rider, RiderState};
use crate::routing::{PathSearch, RoutingEngine};
use crate::spatial::SpatialIndex;
use crate::telemetry::{SimTelemetry, TripRecord};

/// Handles `Arrival`: a car finished its current leg.
///
/// At the pickup the rider boards and the drive to the destination is
/// scheduled. At the destination the car frees up, goes back into the spatial
/// index, the trip is logged and the rider entity is despawned.
pub fn arrival_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut index: ResMut<SpatialIndex>,
    routing: Res<RoutingEngine>,
    mut telemetry: ResMut<SimTelemetry>,
    mut cars: Query<&mut Car>,
    mut riders: Query<&mut Rider>,
) {
    let EventKind::Arrival(car_entity) = event.0.kind else {
        return;
    };
    let Ok(mut car) = cars.get_mut(car_entity) else {
        panic!("arrival for unknown car {car_entity:?}");
    };
    if car.status == CarStatus::Available {
        panic!("arrival for car {car_entity:?} which has no leg in progress");
    }
    let Some(rider_entity) = car.rider else {
        panic!("car {car_entity:?} is {} without a rider", car.status);
    };
    let Ok(mut rider) = riders.get_mut(rider_entity) else {
        panic!("car {car_entity:?} carries unknown rider {rider_entity:?}");
    };
    let now = clock.now();

    match car.status {
        CarStatus::Available => unreachable!("checked above"),
        CarStatus::EnRouteToPickup => {
            let route = match routing.shortest_path(rider.start.node, rider.destination.node) {
                PathSearch::Found(route) => route,
                other => panic!(
                    "destination of rider {rider_entity:?} is unreachable from its start: {other:?}"
                ),
            };
            let eta_ms = secs_to_ms(route.travel_time);
            if let Err(err) = car.pickup(rider.destination, eta_ms) {
                panic!("car {car_entity:?}: {err}");
            }
            rider.state = RiderState::InTransit;
            rider.picked_up_at = Some(now);
            clock.schedule_in(eta_ms, EventKind::Arrival(car_entity));
            debug!(car = ?car_entity, rider = ?rider_entity, eta_ms, "rider picked up");
        }
        CarStatus::EnRouteToDestination => {
            if let Err(err) = car.dropoff(now) {
                panic!("car {car_entity:?}: {err}");
            }
            if !index.insert_car(car_entity, car.location.point) {
                panic!(
                    "car {car_entity:?} dropped off outside the spatial index at {:?}",
                    car.location.point
                );
            }
            rider.dropped_off_at = Some(now);
            let Some(record) = TripRecord::from_rider(rider_entity, car_entity, &rider) else {
                panic!("rider {rider_entity:?} reached its destination without a pickup time");
            };
            debug!(
                car = ?car_entity,
                rider = ?rider_entity,
                wait_ms = record.wait_ms(),
                trip_duration_ms = record.trip_duration_ms(),
                "trip completed"
            );
            telemetry.record_trip(record);
            commands.entity(rider_entity).despawn();
        }
    }
}
