use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use tracing::debug;

use crate::clock::{secs_to_ms, CurrentEvent, EventKind, SimulationClock};
use crate::demand::DemandGenerator;
use crate::ecs::{Car, Rider, RiderState};
use crate::matching::find_best_car;
use crate::routing::RoutingEngine;
use crate::scenario::DispatchConfig;
use crate::spatial::SpatialIndex;

/// Handles `RiderRequest`: match the rider to a car or try again later.
///
/// On a match the car is taken out of the spatial index, its arrival at the
/// pickup is scheduled and one new synthetic rider is queued. Without a match
/// the same request is retried after [`DispatchConfig::retry_delay_ms`].
#[allow(clippy::too_many_arguments)]
pub fn rider_request_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut index: ResMut<SpatialIndex>,
    routing: Res<RoutingEngine>,
    config: Res<DispatchConfig>,
    demand: Option<ResMut<DemandGenerator>>,
    mut riders: Query<&mut Rider>,
    mut cars: Query<&mut Car>,
) {
    let EventKind::RiderRequest(rider_entity) = event.0.kind else {
        return;
    };
    let Ok(mut rider) = riders.get_mut(rider_entity) else {
        panic!("rider request for unknown rider {rider_entity:?}");
    };
    assert_eq!(
        rider.state,
        RiderState::Requesting,
        "rider {rider_entity:?} requested a car twice"
    );

    let now = clock.now();
    let pickup = rider.start;
    let best = find_best_car(
        &index,
        &routing,
        pickup.node,
        pickup.point,
        config.candidate_count,
        |car| cars.get(car).ok().map(|car| car.location.node),
    );

    let Some(best) = best else {
        debug!(
            rider = ?rider_entity,
            retry_in_ms = config.retry_delay_ms,
            "no car available, retrying request"
        );
        clock.schedule_in(config.retry_delay_ms, EventKind::RiderRequest(rider_entity));
        return;
    };

    let Ok(mut car) = cars.get_mut(best.car) else {
        panic!("matched car {:?} does not exist", best.car);
    };
    let parked_at = car.location.point;
    let eta_ms = secs_to_ms(best.pickup_eta_secs);
    if let Err(err) = car.assign(rider_entity, pickup, eta_ms, now) {
        panic!("car {:?}: {err}", best.car);
    }
    if !index.remove_car(best.car, parked_at) {
        panic!(
            "car {:?} was matched but is missing from the spatial index",
            best.car
        );
    }

    rider.state = RiderState::WaitingForPickup;
    rider.assigned_car = Some(best.car);
    clock.schedule_in(eta_ms, EventKind::Arrival(best.car));

    debug!(
        rider = ?rider_entity,
        car = ?best.car,
        eta_ms,
        "rider matched"
    );

    let Some(mut demand) = demand else {
        return;
    };
    let Some(delay_ms) = demand.next_delay_ms() else {
        return;
    };
    if let Some((start, destination)) = demand.next_trip(&routing) {
        let requested_at = now.saturating_add(delay_ms);
        let next = commands
            .spawn(Rider::new(start, destination, requested_at))
            .id();
        clock.schedule_at(requested_at, EventKind::RiderRequest(next));
    }
}
