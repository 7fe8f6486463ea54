//! Point-region quadtree keyed by point identity.
//!
//! Each internal node owns its four children; traversal is strictly top-down.
//! Leaves hold at most `capacity` points, except at `max_depth` where points
//! sharing a coordinate can no longer be separated by subdividing.

use std::collections::{BTreeMap, BinaryHeap};

use ordered_float::OrderedFloat;

use super::{Point, Rect};

/// Default number of points a leaf holds before subdividing.
pub const DEFAULT_NODE_CAPACITY: usize = 4;

/// Default depth at which leaves stop subdividing.
pub const DEFAULT_MAX_DEPTH: usize = 24;

#[derive(Debug, Clone, Copy)]
struct Limits {
    capacity: usize,
    max_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Rejected,
    Added,
    Replaced,
}

#[derive(Debug, Clone)]
struct QuadtreeNode<K> {
    boundary: Rect,
    depth: usize,
    points: BTreeMap<K, Point>,
    /// `[NW, NE, SW, SE]`; a subdivided node keeps no points of its own.
    children: Option<Box<[QuadtreeNode<K>; 4]>>,
}

/// Dynamic set of identified points supporting k-nearest-neighbour queries.
#[derive(Debug, Clone)]
pub struct Quadtree<K> {
    root: QuadtreeNode<K>,
    limits: Limits,
    len: usize,
}

impl<K: Copy + Ord> Quadtree<K> {
    pub fn new(boundary: Rect) -> Self {
        Self::with_limits(boundary, DEFAULT_NODE_CAPACITY, DEFAULT_MAX_DEPTH)
    }

    pub fn with_capacity(boundary: Rect, capacity: usize) -> Self {
        Self::with_limits(boundary, capacity, DEFAULT_MAX_DEPTH)
    }

    /// `capacity` is clamped to at least 1.
    pub fn with_limits(boundary: Rect, capacity: usize, max_depth: usize) -> Self {
        Self {
            root: QuadtreeNode::leaf(boundary, 0),
            limits: Limits {
                capacity: capacity.max(1),
                max_depth,
            },
            len: 0,
        }
    }

    pub fn boundary(&self) -> Rect {
        self.root.boundary
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `point` under `id`. Returns `false` when the point lies outside the root boundary.
    ///
    /// Re-inserting an identity at the same coordinate replaces the entry.
    /// Identities are only matched within one leaf, so moving an entry takes a
    /// [`remove`](Self::remove) at the old coordinate first. Inserting it at a
    /// new coordinate without that leaves two entries and `len` counts both.
    pub fn insert(&mut self, id: K, point: Point) -> bool {
        match self.root.insert(id, point, self.limits) {
            Placement::Rejected => false,
            Placement::Added => {
                self.len += 1;
                true
            }
            Placement::Replaced => true,
        }
    }

    /// Deletes `id` from the leaf owning `point`.
    ///
    /// Returns `false` if the point is outside the tree or `id` is not stored
    /// in that leaf.
    pub fn remove(&mut self, id: &K, point: Point) -> bool {
        let removed = self.root.remove(id, point, self.limits);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Whether `id` is stored in the leaf owning `point`.
    pub fn contains(&self, id: &K, point: Point) -> bool {
        self.root.contains(id, point)
    }

    /// Up to `k` `(identity, squared distance)` pairs closest to `query`,
    /// ascending by distance then identity.
    pub fn k_nearest(&self, query: Point, k: usize) -> Vec<(K, f64)> {
        if k == 0 || self.len == 0 {
            return Vec::new();
        }
        let mut best = BestK::new(k);
        self.root.nearest(query, &mut best);
        best.into_sorted_vec()
    }

    #[cfg(test)]
    fn root_is_leaf(&self) -> bool {
        self.root.children.is_none()
    }

    #[cfg(test)]
    fn internal_nodes_hold_no_points(&self) -> bool {
        self.root.internal_nodes_hold_no_points()
    }
}

impl<K: Copy + Ord> QuadtreeNode<K> {
    fn leaf(boundary: Rect, depth: usize) -> Self {
        Self {
            boundary,
            depth,
            points: BTreeMap::new(),
            children: None,
        }
    }

    fn insert(&mut self, id: K, point: Point, limits: Limits) -> Placement {
        if !self.boundary.contains(point) {
            return Placement::Rejected;
        }

        if self.children.is_none() {
            let has_room = self.points.len() < limits.capacity
                || self.depth >= limits.max_depth
                || self.points.contains_key(&id);
            if has_room {
                return match self.points.insert(id, point) {
                    Some(_) => Placement::Replaced,
                    None => Placement::Added,
                };
            }
            self.subdivide(limits);
        }

        let Some(children) = self.children.as_deref_mut() else {
            return Placement::Rejected;
        };
        for child in children.iter_mut() {
            let placement = child.insert(id, point, limits);
            if placement != Placement::Rejected {
                return placement;
            }
        }
        Placement::Rejected
    }

    fn subdivide(&mut self, limits: Limits) {
        let depth = self.depth + 1;
        let mut children = Box::new(
            self.boundary
                .quadrants()
                .map(|quadrant| QuadtreeNode::leaf(quadrant, depth)),
        );
        for (id, point) in std::mem::take(&mut self.points) {
            let placed = children
                .iter_mut()
                .any(|child| child.insert(id, point, limits) != Placement::Rejected);
            debug_assert!(placed, "quadrants must tile their parent");
        }
        self.children = Some(children);
    }

    fn remove(&mut self, id: &K, point: Point, limits: Limits) -> bool {
        if !self.boundary.contains(point) {
            return false;
        }
        let Some(children) = self.children.as_deref_mut() else {
            return self.points.remove(id).is_some();
        };
        let removed = children
            .iter_mut()
            .find(|child| child.boundary.contains(point))
            .is_some_and(|child| child.remove(id, point, limits));
        if removed {
            self.collapse_if_sparse(limits);
        }
        removed
    }

    fn contains(&self, id: &K, point: Point) -> bool {
        if !self.boundary.contains(point) {
            return false;
        }
        match self.children.as_deref() {
            None => self.points.get(id) == Some(&point),
            Some(children) => children
                .iter()
                .find(|child| child.boundary.contains(point))
                .is_some_and(|child| child.contains(id, point)),
        }
    }

    /// Folds leaf children back into this node once they fit in one leaf.
    fn collapse_if_sparse(&mut self, limits: Limits) {
        let Some(children) = self.children.as_deref() else {
            return;
        };
        if children.iter().any(|child| child.children.is_some()) {
            return;
        }
        let total: usize = children.iter().map(|child| child.points.len()).sum();
        if total > limits.capacity {
            return;
        }
        if let Some(children) = self.children.take() {
            let children: [QuadtreeNode<K>; 4] = *children;
            for child in children {
                self.points.extend(child.points);
            }
        }
    }

    fn nearest(&self, query: Point, best: &mut BestK<K>) {
        if self.boundary.distance_sq_to_point(query) > best.worst() {
            return;
        }

        let Some(children) = self.children.as_deref() else {
            for (id, point) in &self.points {
                best.offer(*id, point.distance_sq(query));
            }
            return;
        };

        let bounds: [f64; 4] =
            std::array::from_fn(|i| children[i].boundary.distance_sq_to_point(query));
        let mut order = [0usize, 1, 2, 3];
        order.sort_by(|a, b| bounds[*a].total_cmp(&bounds[*b]));
        for i in order {
            if bounds[i] > best.worst() {
                // Children are sorted by bound; the rest are at least as far.
                break;
            }
            children[i].nearest(query, best);
        }
    }

    #[cfg(test)]
    fn internal_nodes_hold_no_points(&self) -> bool {
        match self.children.as_deref() {
            None => true,
            Some(children) => {
                self.points.is_empty()
                    && children
                        .iter()
                        .all(|child| child.internal_nodes_hold_no_points())
            }
        }
    }
}

/// The `k` smallest `(distance, identity)` pairs seen so far.
struct BestK<K> {
    k: usize,
    heap: BinaryHeap<(OrderedFloat<f64>, K)>,
}

impl<K: Copy + Ord> BestK<K> {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    /// Current k-th best squared distance, or infinity while fewer than `k` are known.
    fn worst(&self) -> f64 {
        if self.heap.len() < self.k {
            return f64::INFINITY;
        }
        self.heap
            .peek()
            .map(|(distance, _)| distance.0)
            .unwrap_or(f64::INFINITY)
    }

    fn offer(&mut self, id: K, distance_sq: f64) {
        let candidate = (OrderedFloat(distance_sq), id);
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    fn into_sorted_vec(self) -> Vec<(K, f64)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|(distance, id)| (id, distance.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_square() -> Rect {
        Rect::from_origin_size(0.0, 0.0, 1000.0, 1000.0)
    }

    fn brute_force(points: &[(u32, Point)], query: Point, k: usize) -> Vec<(u32, f64)> {
        let mut all: Vec<(u32, f64)> = points
            .iter()
            .map(|(id, p)| (*id, p.distance_sq(query)))
            .collect();
        all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        all.truncate(k);
        all
    }

    #[test]
    fn rejects_points_outside_boundary() {
        let mut tree = Quadtree::new(unit_square());
        assert!(!tree.insert(1u32, Point::new(1000.0, 10.0)));
        assert!(!tree.insert(2u32, Point::new(-1.0, 10.0)));
        assert!(!tree.insert(3u32, Point::new(f64::NAN, 10.0)));
        assert!(tree.is_empty());
    }

    #[test]
    fn subdivides_when_leaf_is_full() {
        let mut tree = Quadtree::with_capacity(unit_square(), 2);
        assert!(tree.insert(1u32, Point::new(10.0, 10.0)));
        assert!(tree.insert(2u32, Point::new(900.0, 10.0)));
        assert!(tree.root_is_leaf());

        assert!(tree.insert(3u32, Point::new(10.0, 900.0)));
        assert!(!tree.root_is_leaf());
        assert!(tree.internal_nodes_hold_no_points());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn coincident_points_stop_subdividing_at_max_depth() {
        let mut tree = Quadtree::with_limits(unit_square(), 1, 6);
        for id in 0..20u32 {
            assert!(tree.insert(id, Point::new(500.0, 500.0)));
        }
        assert_eq!(tree.len(), 20);
        let nearest = tree.k_nearest(Point::new(500.0, 500.0), 3);
        assert_eq!(nearest, vec![(0, 0.0), (1, 0.0), (2, 0.0)]);
    }

    #[test]
    fn reinserting_same_identity_replaces_entry() {
        let mut tree = Quadtree::new(unit_square());
        assert!(tree.insert(7u32, Point::new(1.0, 1.0)));
        assert!(tree.insert(7u32, Point::new(1.0, 1.0)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn remove_requires_matching_point_and_identity() {
        let mut tree = Quadtree::with_capacity(unit_square(), 1);
        tree.insert(1u32, Point::new(100.0, 100.0));
        tree.insert(2u32, Point::new(800.0, 800.0));

        assert!(!tree.remove(&1, Point::new(800.0, 800.0)));
        assert!(!tree.remove(&3, Point::new(100.0, 100.0)));
        assert!(!tree.remove(&1, Point::new(2000.0, 100.0)));
        assert!(tree.contains(&1, Point::new(100.0, 100.0)));
        assert!(tree.remove(&1, Point::new(100.0, 100.0)));
        assert!(!tree.contains(&1, Point::new(100.0, 100.0)));
        assert!(tree.contains(&2, Point::new(800.0, 800.0)));
        assert_eq!(tree.len(), 1);
        assert!(tree.root_is_leaf(), "sparse children collapse back into the root");
    }

    #[test]
    fn moving_an_entry_is_remove_then_insert() {
        let mut tree = Quadtree::with_capacity(unit_square(), 1);
        let old = Point::new(100.0, 100.0);
        let new = Point::new(900.0, 50.0);
        tree.insert(1u32, old);
        tree.insert(2u32, Point::new(500.0, 500.0));

        assert!(tree.remove(&1, old));
        assert!(tree.insert(1, new));
        assert_eq!(tree.len(), 2);
        assert!(tree.contains(&1, new));
        assert!(!tree.contains(&1, old));
        assert_eq!(tree.k_nearest(old, 1), vec![(2, 320_000.0)]);
    }

    #[test]
    fn k_nearest_on_empty_tree_is_empty() {
        let tree: Quadtree<u32> = Quadtree::new(unit_square());
        assert!(tree.k_nearest(Point::new(5.0, 5.0), 3).is_empty());

        let mut tree = Quadtree::new(unit_square());
        tree.insert(1u32, Point::new(5.0, 5.0));
        assert!(tree.k_nearest(Point::new(5.0, 5.0), 0).is_empty());
    }

    #[test]
    fn k_nearest_returns_all_points_when_fewer_than_k() {
        let mut tree = Quadtree::new(unit_square());
        tree.insert(1u32, Point::new(3.0, 4.0));
        tree.insert(2u32, Point::new(6.0, 8.0));
        let nearest = tree.k_nearest(Point::new(0.0, 0.0), 5);
        assert_eq!(nearest, vec![(1, 25.0), (2, 100.0)]);
    }

    #[test]
    fn k_nearest_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        for round in 0..20 {
            let capacity = 1 + round % 5;
            let mut tree = Quadtree::with_capacity(unit_square(), capacity);
            let count = rng.gen_range(0..300);
            let mut points = Vec::with_capacity(count);
            for id in 0..count as u32 {
                // Snap half the points to a coarse grid so ties in distance occur.
                let point = if id % 2 == 0 {
                    Point::new(
                        rng.gen_range(0..10) as f64 * 100.0,
                        rng.gen_range(0..10) as f64 * 100.0,
                    )
                } else {
                    Point::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0))
                };
                assert!(tree.insert(id, point));
                points.push((id, point));
            }

            for _ in 0..20 {
                let query = Point::new(rng.gen_range(-200.0..1200.0), rng.gen_range(-200.0..1200.0));
                let k = rng.gen_range(1..12);
                assert_eq!(
                    tree.k_nearest(query, k),
                    brute_force(&points, query, k),
                    "round {round}, query {query:?}, k {k}"
                );
            }
        }
    }

    #[test]
    fn insert_then_remove_is_invisible_to_queries() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tree = Quadtree::with_capacity(unit_square(), 3);
        let mut points = Vec::new();
        for id in 0..200u32 {
            let point = Point::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0));
            tree.insert(id, point);
            points.push((id, point));
        }
        let queries: Vec<Point> = (0..30)
            .map(|_| Point::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)))
            .collect();
        let before: Vec<_> = queries.iter().map(|q| tree.k_nearest(*q, 6)).collect();

        let extra = Point::new(500.0, 500.0);
        assert!(tree.insert(10_000, extra));
        assert!(tree.remove(&10_000, extra));

        let after: Vec<_> = queries.iter().map(|q| tree.k_nearest(*q, 6)).collect();
        assert_eq!(before, after);
        assert_eq!(tree.len(), 200);
        assert!(tree.internal_nodes_hold_no_points());
    }

    #[test]
    fn removing_everything_leaves_an_empty_leaf() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree = Quadtree::with_capacity(unit_square(), 2);
        let points: Vec<(u32, Point)> = (0..64)
            .map(|id| {
                (
                    id,
                    Point::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)),
                )
            })
            .collect();
        for (id, point) in &points {
            tree.insert(*id, *point);
        }
        for (id, point) in &points {
            assert!(tree.remove(id, *point));
        }
        assert!(tree.is_empty());
        assert!(tree.root_is_leaf());
        assert!(tree.k_nearest(Point::new(1.0, 1.0), 4).is_empty());
    }
}
