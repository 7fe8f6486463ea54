//! Two-phase car selection.
//!
//! Phase one asks the spatial index for the `k` available cars closest to the
//! pickup point in a straight line. Phase two routes each of them to the
//! pickup, passing the best travel time found so far as the search bound so
//! hopeless candidates are abandoned early.
//!
//! The fastest car overall may lie outside the straight-line short list; that
//! car is never considered.

use bevy_ecs::prelude::Entity;

use crate::routing::{NodeId, PathSearch, RoutingEngine};
use crate::spatial::{Point, SpatialIndex};

/// The car chosen for a pickup and how long it needs to get there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarMatch {
    pub car: Entity,
    /// Road travel time to the pickup in seconds.
    pub pickup_eta_secs: f64,
    /// Squared straight-line distance used in the prefilter.
    pub straight_line_sq: f64,
}

/// Picks the car with the smallest road travel time to `pickup` among the `k`
/// straight-line nearest available cars.
///
/// `car_node` resolves a candidate to the graph node it is parked at;
/// candidates it cannot resolve are skipped, as are cars that cannot reach the
/// pickup. Ties keep the car closer in a straight line.
pub fn find_best_car(
    index: &SpatialIndex,
    routing: &RoutingEngine,
    pickup_node: NodeId,
    pickup_point: Point,
    k: usize,
    car_node: impl Fn(Entity) -> Option<NodeId>,
) -> Option<CarMatch> {
    let mut best: Option<CarMatch> = None;

    for (car, straight_line_sq) in index.nearest_cars(pickup_point, k) {
        let Some(node) = car_node(car) else {
            continue;
        };
        let bound = best.map_or(f64::INFINITY, |b| b.pickup_eta_secs);
        let PathSearch::Found(route) = routing.shortest_path_bounded(node, pickup_node, bound)
        else {
            continue;
        };
        if route.travel_time < bound {
            best = Some(CarMatch {
                car,
                pickup_eta_secs: route.travel_time,
                straight_line_sq,
            });
            if route.travel_time == 0.0 {
                break;
            }
        }
    }

    best
}
