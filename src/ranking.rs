//! Result ranking: a bounded best-of-k queue and a range accumulator.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;

use crate::object::ObjectId;

/// A ranked search result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: ObjectId,
    pub distance: f32,
}

impl Neighbor {
    pub fn new(id: ObjectId, distance: f32) -> Self {
        Self { id, distance }
    }
}

/// Heap entry. `seq` is the insertion order and breaks distance ties.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    distance: f32,
    seq: u64,
    id: ObjectId,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Largest distance on top; among equal distances the latest insertion is on
// top, so it is the first to be evicted.
impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

fn into_sorted_neighbors(mut entries: Vec<Ranked>) -> Vec<Neighbor> {
    entries.sort();
    entries
        .into_iter()
        .map(|r| Neighbor::new(r.id, r.distance))
        .collect()
}

/// Keeps the `k` closest entries seen so far.
///
/// Ties on distance are resolved in favor of the entry inserted first.
#[derive(Debug, Clone)]
pub struct KnnQueue {
    k: usize,
    heap: BinaryHeap<Ranked>,
    next_seq: u64,
}

impl KnnQueue {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.min(1024) + 1),
            next_seq: 0,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Offer an entry. Returns `true` if it was kept.
    pub fn push(&mut self, id: ObjectId, distance: f32) -> bool {
        if self.k == 0 {
            return false;
        }
        let entry = Ranked {
            distance,
            seq: self.next_seq,
            id,
        };
        self.next_seq += 1;

        if self.heap.len() < self.k {
            self.heap.push(entry);
            return true;
        }
        match self.heap.peek() {
            Some(top) if entry < *top => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    /// Distance of the worst kept entry.
    pub fn top_distance(&self) -> Option<f32> {
        self.heap.peek().map(|r| r.distance)
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Kept entries in ascending distance order, leaving the queue intact.
    pub fn results(&self) -> Vec<Neighbor> {
        into_sorted_neighbors(self.heap.clone().into_vec())
    }

    /// Remove and return every entry in ascending distance order.
    pub fn drain(&mut self) -> Vec<Neighbor> {
        let heap = std::mem::take(&mut self.heap);
        into_sorted_neighbors(heap.into_vec())
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}

/// Collects every entry within a fixed radius, in insertion order.
#[derive(Debug, Clone)]
pub struct RangeResults {
    radius: f32,
    entries: Vec<Neighbor>,
}

impl RangeResults {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            entries: Vec::new(),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Record an entry if it lies within the radius.
    pub fn push(&mut self, id: ObjectId, distance: f32) -> bool {
        if distance <= self.radius {
            self.entries.push(Neighbor::new(id, distance));
            true
        } else {
            false
        }
    }

    /// Entries in insertion order.
    pub fn results(&self) -> &[Neighbor] {
        &self.entries
    }

    /// Entries sorted by distance; equal distances keep insertion order.
    pub fn sorted_results(&self) -> Vec<Neighbor> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        sorted
    }

    pub fn drain(&mut self) -> Vec<Neighbor> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
