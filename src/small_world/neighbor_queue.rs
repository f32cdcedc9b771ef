//! Priority queues for graph traversal. Handles f32 ordering for BinaryHeap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A graph node (dataset position) with its distance to the current target.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub distance: f32,
    pub pos: u32,
}

impl Candidate {
    pub fn new(pos: u32, distance: f32) -> Self {
        Self { distance, pos }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

// Default ordering: max-heap (largest distance on top).
// `Reversed` flips it for the min-heap.
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.pos.cmp(&other.pos))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Reversed(Candidate);

impl PartialOrd for Reversed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reversed {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// Max-heap of candidates (largest distance on top). Holds the closest nodes found by a walk.
#[derive(Debug, Default)]
pub struct MaxHeap {
    heap: BinaryHeap<Candidate>,
}

impl MaxHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: Candidate) {
        self.heap.push(c);
    }

    /// Push and pop the max if size exceeds limit, keeping only the closest `limit` candidates.
    pub fn push_bounded(&mut self, c: Candidate, limit: usize) {
        self.heap.push(c);
        if self.heap.len() > limit {
            self.heap.pop();
        }
    }

    pub fn peek(&self) -> Option<&Candidate> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a sorted Vec (ascending by distance).
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

/// Min-heap of candidates (smallest distance on top). The walk frontier.
#[derive(Debug, Default)]
pub struct MinHeap {
    heap: BinaryHeap<Reversed>,
}

impl MinHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: Candidate) {
        self.heap.push(Reversed(c));
    }

    pub fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop().map(|r| r.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
