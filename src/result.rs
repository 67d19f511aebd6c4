//! Collectors for search results.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A point found by a search and its distance to the query, in metric units.
///
/// Neighbors order by distance, then by point index, so that equidistant points have a
/// deterministic order.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    /// The index of the point in its [`PointSource`][crate::PointSource].
    pub index: usize,
    /// The distance from the query point.
    pub distance: f64,
}

impl Neighbor {
    /// A neighbor at `distance` (in metric units) from the query.
    pub fn new(index: usize, distance: f64) -> Self {
        Self { index, distance }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Receives candidate points during a search.
///
/// Implement this to plug custom collection logic into
/// [`KdTreeIndex::find_neighbors`][crate::kdtree::KdTreeIndex::find_neighbors].
pub trait ResultSet {
    /// The largest distance that can still be accepted. Subtrees whose lower bound exceeds it are
    /// pruned.
    fn worst_dist(&self) -> f64;

    /// Offer a point to the set. Returning `false` stops the search.
    fn add_point(&mut self, distance: f64, index: usize) -> bool;
}

/// Keeps the `k` closest points seen so far.
#[derive(Debug, Clone)]
pub struct KnnResultSet {
    capacity: usize,
    max_dist: f64,
    heap: BinaryHeap<Neighbor>,
}

impl KnnResultSet {
    /// Collect up to `k` neighbors at any distance.
    pub fn new(k: usize) -> Self {
        Self::with_max_dist(k, f64::INFINITY)
    }

    /// Collect up to `k` neighbors whose distance is at most `max_dist` (in metric units).
    pub fn with_max_dist(k: usize, max_dist: f64) -> Self {
        Self {
            capacity: k,
            max_dist,
            heap: BinaryHeap::with_capacity(k.min(1024)),
        }
    }

    /// The maximum number of neighbors kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of neighbors collected so far.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no neighbor has been accepted.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns `true` once `k` neighbors have been collected.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// The neighbors in no particular order.
    pub fn into_vec(self) -> Vec<Neighbor> {
        self.heap.into_vec()
    }

    /// The neighbors in ascending order of distance.
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }

    pub(crate) fn finish(self, sorted: bool) -> Vec<Neighbor> {
        if sorted {
            self.into_sorted_vec()
        } else {
            self.into_vec()
        }
    }
}

impl ResultSet for KnnResultSet {
    #[inline]
    fn worst_dist(&self) -> f64 {
        if self.heap.len() < self.capacity {
            self.max_dist
        } else {
            self.heap
                .peek()
                .map_or(f64::NEG_INFINITY, |worst| worst.distance)
        }
    }

    #[inline]
    fn add_point(&mut self, distance: f64, index: usize) -> bool {
        if distance > self.max_dist || self.capacity == 0 {
            return true;
        }
        let candidate = Neighbor::new(index, distance);
        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if candidate < *worst {
                *worst = candidate;
            }
        }
        true
    }
}

/// Keeps every point within a fixed distance.
#[derive(Debug, Clone)]
pub struct RadiusResultSet {
    radius: f64,
    items: Vec<Neighbor>,
}

impl RadiusResultSet {
    /// Collect every point at distance `<= radius` (in metric units).
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            items: vec![],
        }
    }

    /// The search radius in metric units.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The number of points found within the radius.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no point lies within the radius.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The neighbors in the order they were found.
    pub fn into_vec(self) -> Vec<Neighbor> {
        self.items
    }

    /// The neighbors in ascending order of distance.
    pub fn into_sorted_vec(mut self) -> Vec<Neighbor> {
        self.items.sort_unstable();
        self.items
    }

    pub(crate) fn finish(self, sorted: bool) -> Vec<Neighbor> {
        if sorted {
            self.into_sorted_vec()
        } else {
            self.into_vec()
        }
    }
}

impl ResultSet for RadiusResultSet {
    #[inline]
    fn worst_dist(&self) -> f64 {
        self.radius
    }

    #[inline]
    fn add_point(&mut self, distance: f64, index: usize) -> bool {
        if distance <= self.radius {
            self.items.push(Neighbor::new(index, distance));
        }
        true
    }
}
