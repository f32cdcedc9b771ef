//! k-NN and range queries.
//!
//! A query binds a space, a query object and its ranking state. Indexes feed
//! candidate objects into the query; the query owns the result bookkeeping
//! so every index shares the same ranking rules. Queries are reusable:
//! [`Query::reset`] clears results and counters so the same query can be
//! run again, on the same or a different index.

use std::fmt;

use crate::object::Object;
use crate::ranking::{KnnQueue, Neighbor, RangeResults};
use crate::space::Space;

/// The two query flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Knn,
    Range,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Knn => write!(f, "k-NN"),
            QueryKind::Range => write!(f, "range"),
        }
    }
}

/// A mutable view of a query's concrete kind, used by indexes to dispatch.
pub enum SearchTarget<'q, 'a> {
    Knn(&'q mut KnnQuery<'a>),
    Range(&'q mut RangeQuery<'a>),
}

/// Behavior shared by both query kinds.
pub trait Query<'a> {
    fn kind(&self) -> QueryKind;

    /// Borrow the concrete query so an index can run the matching search.
    fn target(&mut self) -> SearchTarget<'_, 'a>;

    /// Number of results currently held.
    fn result_size(&self) -> usize;

    /// Results sorted by ascending distance.
    fn sorted_results(&self) -> Vec<Neighbor>;

    /// Distances computed against the query object since the last reset.
    fn distance_computations(&self) -> u64;

    /// Clear results and counters.
    fn reset(&mut self);
}

/// The side of a query an index talks to while searching.
///
/// Lets an index write one search routine for both query kinds: the
/// `radius` is the k-th best distance for k-NN and the fixed radius for
/// range queries.
pub trait ResultCollector {
    fn distance_to(&mut self, obj: &Object) -> f32;

    fn check_and_add(&mut self, obj: &Object, distance: f32) -> bool;

    fn radius(&self) -> f32;

    /// Compute the distance to `obj`, offer it, and return the distance.
    fn add_object(&mut self, obj: &Object) -> f32 {
        let distance = self.distance_to(obj);
        self.check_and_add(obj, distance);
        distance
    }
}

/// Find the `k` objects closest to a query object.
#[derive(Debug)]
pub struct KnnQuery<'a> {
    space: &'a dyn Space,
    object: &'a Object,
    eps: f32,
    result: KnnQueue,
    distance_computations: u64,
}

impl<'a> KnnQuery<'a> {
    pub fn new(space: &'a dyn Space, object: &'a Object, k: usize) -> Self {
        Self {
            space,
            object,
            eps: 0.0,
            result: KnnQueue::new(k),
            distance_computations: 0,
        }
    }

    /// Allow approximate pruning: a full queue prunes at `worst / (1 + eps)`.
    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps.max(0.0);
        self
    }

    pub fn k(&self) -> usize {
        self.result.k()
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }

    pub fn space(&self) -> &'a dyn Space {
        self.space
    }

    pub fn query_object(&self) -> &'a Object {
        self.object
    }

    /// Distance from `obj` to the query object; counted.
    pub fn distance_to(&mut self, obj: &Object) -> f32 {
        self.distance_computations += 1;
        self.space.distance(obj, self.object)
    }

    /// Current search radius: infinite until `k` results are held.
    pub fn radius(&self) -> f32 {
        match self.result.top_distance() {
            Some(worst) if self.result.is_full() => worst / (1.0 + self.eps),
            _ => f32::INFINITY,
        }
    }

    /// Offer `obj` at a precomputed `distance`. Returns `true` if it was kept.
    pub fn check_and_add(&mut self, obj: &Object, distance: f32) -> bool {
        self.result.push(obj.id(), distance)
    }

    pub fn result(&self) -> &KnnQueue {
        &self.result
    }

    /// Results in ascending distance order, leaving them in place.
    pub fn results(&self) -> Vec<Neighbor> {
        self.result.results()
    }

    /// Take the results out in ascending distance order.
    pub fn drain_results(&mut self) -> Vec<Neighbor> {
        self.result.drain()
    }

    pub fn result_size(&self) -> usize {
        self.result.len()
    }

    pub fn distance_computations(&self) -> u64 {
        self.distance_computations
    }

    pub fn reset(&mut self) {
        self.result.clear();
        self.distance_computations = 0;
    }
}

impl<'a> Query<'a> for KnnQuery<'a> {
    fn kind(&self) -> QueryKind {
        QueryKind::Knn
    }

    fn target(&mut self) -> SearchTarget<'_, 'a> {
        SearchTarget::Knn(self)
    }

    fn result_size(&self) -> usize {
        KnnQuery::result_size(self)
    }

    fn sorted_results(&self) -> Vec<Neighbor> {
        self.results()
    }

    fn distance_computations(&self) -> u64 {
        KnnQuery::distance_computations(self)
    }

    fn reset(&mut self) {
        KnnQuery::reset(self)
    }
}

/// Find every object within `radius` of a query object.
#[derive(Debug)]
pub struct RangeQuery<'a> {
    space: &'a dyn Space,
    object: &'a Object,
    result: RangeResults,
    distance_computations: u64,
}

impl<'a> RangeQuery<'a> {
    pub fn new(space: &'a dyn Space, object: &'a Object, radius: f32) -> Self {
        Self {
            space,
            object,
            result: RangeResults::new(radius),
            distance_computations: 0,
        }
    }

    pub fn radius(&self) -> f32 {
        self.result.radius()
    }

    pub fn space(&self) -> &'a dyn Space {
        self.space
    }

    pub fn query_object(&self) -> &'a Object {
        self.object
    }

    /// Distance from `obj` to the query object; counted.
    pub fn distance_to(&mut self, obj: &Object) -> f32 {
        self.distance_computations += 1;
        self.space.distance(obj, self.object)
    }

    /// Record `obj` if `distance` is within the radius.
    pub fn check_and_add(&mut self, obj: &Object, distance: f32) -> bool {
        self.result.push(obj.id(), distance)
    }

    /// Results in insertion order.
    pub fn results(&self) -> &[Neighbor] {
        self.result.results()
    }

    pub fn sorted_results(&self) -> Vec<Neighbor> {
        self.result.sorted_results()
    }

    pub fn drain_results(&mut self) -> Vec<Neighbor> {
        self.result.drain()
    }

    pub fn result_size(&self) -> usize {
        self.result.len()
    }

    pub fn distance_computations(&self) -> u64 {
        self.distance_computations
    }

    pub fn reset(&mut self) {
        self.result.clear();
        self.distance_computations = 0;
    }
}

impl ResultCollector for KnnQuery<'_> {
    fn distance_to(&mut self, obj: &Object) -> f32 {
        KnnQuery::distance_to(self, obj)
    }

    fn check_and_add(&mut self, obj: &Object, distance: f32) -> bool {
        KnnQuery::check_and_add(self, obj, distance)
    }

    fn radius(&self) -> f32 {
        KnnQuery::radius(self)
    }
}

impl ResultCollector for RangeQuery<'_> {
    fn distance_to(&mut self, obj: &Object) -> f32 {
        RangeQuery::distance_to(self, obj)
    }

    fn check_and_add(&mut self, obj: &Object, distance: f32) -> bool {
        RangeQuery::check_and_add(self, obj, distance)
    }

    fn radius(&self) -> f32 {
        RangeQuery::radius(self)
    }
}

impl<'a> Query<'a> for RangeQuery<'a> {
    fn kind(&self) -> QueryKind {
        QueryKind::Range
    }

    fn target(&mut self) -> SearchTarget<'_, 'a> {
        SearchTarget::Range(self)
    }

    fn result_size(&self) -> usize {
        RangeQuery::result_size(self)
    }

    fn sorted_results(&self) -> Vec<Neighbor> {
        RangeQuery::sorted_results(self)
    }

    fn distance_computations(&self) -> u64 {
        RangeQuery::distance_computations(self)
    }

    fn reset(&mut self) {
        RangeQuery::reset(self)
    }
}
