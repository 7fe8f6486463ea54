//! Spatial operations: planar geometry and the available-car index.
//!
//! This module provides:
//!
//! - **Point / Rect**: planar coordinates and half-open axis-aligned rectangles
//! - **Quadtree**: owning point-region quadtree with k-nearest queries
//! - **SpatialIndex**: ECS resource holding the coordinates of available cars
//!
//! Map coordinates are unitless planar values taken verbatim from the map file.

use bevy_ecs::prelude::{Entity, Resource};
use serde::{Deserialize, Serialize};

pub mod quadtree;

pub use quadtree::{Quadtree, DEFAULT_MAX_DEPTH, DEFAULT_NODE_CAPACITY};

/// A planar coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Straight-line (Euclidean) distance.
    pub fn distance(&self, other: Point) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

/// Axis-aligned rectangle covering `[min_x, max_x) × [min_y, max_y)`.
///
/// The half-open convention guarantees that a point on a shared edge between
/// two quadrants belongs to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Rectangle with its minimum corner at `(x, y)`.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Smallest rectangle strictly containing every point, grown by `margin` on each side.
    ///
    /// Returns `None` for an empty iterator. A non-positive margin still yields a
    /// rectangle whose maximum edges lie beyond the largest coordinates, so the
    /// half-open boundary contains them. The margin is widened for large
    /// coordinates, where a small one would be lost to rounding.
    pub fn enclosing(points: impl IntoIterator<Item = Point>, margin: f64) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Self::new(first.x, first.y, first.x, first.y);
        for p in iter {
            rect.min_x = rect.min_x.min(p.x);
            rect.min_y = rect.min_y.min(p.y);
            rect.max_x = rect.max_x.max(p.x);
            rect.max_y = rect.max_y.max(p.y);
        }
        let margin = if margin > 0.0 { margin } else { 1.0 };
        let magnitude = [rect.min_x, rect.min_y, rect.max_x, rect.max_y]
            .into_iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let margin = margin.max(magnitude * f64::EPSILON * 4.0);
        Some(Self::new(
            rect.min_x - margin,
            rect.min_y - margin,
            rect.max_x + margin,
            rect.max_y + margin,
        ))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, p: Point) -> bool {
        self.min_x <= p.x && p.x < self.max_x && self.min_y <= p.y && p.y < self.max_y
    }

    /// Squared distance from `p` to the closest point of the rectangle (0 when inside).
    pub fn distance_sq_to_point(&self, p: Point) -> f64 {
        let dx = (self.min_x - p.x).max(p.x - self.max_x).max(0.0);
        let dy = (self.min_y - p.y).max(p.y - self.max_y).max(0.0);
        dx * dx + dy * dy
    }

    /// Splits into `[NW, NE, SW, SE]`, where north-west holds the low x / low y corner.
    ///
    /// The midpoint is shared between neighbours so the quadrants tile the
    /// parent exactly.
    pub fn quadrants(&self) -> [Rect; 4] {
        let mid_x = self.min_x + (self.max_x - self.min_x) / 2.0;
        let mid_y = self.min_y + (self.max_y - self.min_y) / 2.0;
        [
            Rect::new(self.min_x, self.min_y, mid_x, mid_y),
            Rect::new(mid_x, self.min_y, self.max_x, mid_y),
            Rect::new(self.min_x, mid_y, mid_x, self.max_y),
            Rect::new(mid_x, mid_y, self.max_x, self.max_y),
        ]
    }
}

/// Coordinates of every available car, keyed by car entity.
///
/// Cars enter the index when they become available and leave it when they are
/// assigned. Removal must use the coordinate the car was inserted with.
#[derive(Debug, Clone, Resource)]
pub struct SpatialIndex {
    cars: Quadtree<Entity>,
}

impl SpatialIndex {
    pub fn new(boundary: Rect) -> Self {
        Self {
            cars: Quadtree::new(boundary),
        }
    }

    pub fn with_capacity(boundary: Rect, node_capacity: usize) -> Self {
        Self {
            cars: Quadtree::with_capacity(boundary, node_capacity),
        }
    }

    /// Indexes an available car. A car that moved must be removed at its old
    /// position first.
    pub fn insert_car(&mut self, car: Entity, point: Point) -> bool {
        self.cars.insert(car, point)
    }

    pub fn remove_car(&mut self, car: Entity, point: Point) -> bool {
        self.cars.remove(&car, point)
    }

    pub fn contains_car(&self, car: Entity, point: Point) -> bool {
        self.cars.contains(&car, point)
    }

    /// Up to `k` available cars ordered by squared straight-line distance.
    pub fn nearest_cars(&self, point: Point, k: usize) -> Vec<(Entity, f64)> {
        self.cars.k_nearest(point, k)
    }

    pub fn boundary(&self) -> Rect {
        self.cars.boundary()
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }
}
