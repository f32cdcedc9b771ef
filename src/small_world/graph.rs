//! Navigable small-world graph: concurrent construction and greedy walks.
//!
//! Construction inserts objects one by one: each new object searches the
//! graph built so far, then links itself to the closest nodes it found in
//! both directions. Several workers insert concurrently. Each node's
//! adjacency list sits behind its own mutex and a worker never holds two of
//! them at once; the list of fully inserted nodes (the pool entry points are
//! drawn from) has a separate lock. After construction the lists are frozen
//! into plain vectors, so searching needs no locks at all.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, SearchError};
use crate::object::{Dataset, Object};
use crate::space::Space;

use super::neighbor_queue::{Candidate, MaxHeap, MinHeap};
use super::SmallWorldParams;

/// Read access to adjacency lists, locked during construction or frozen after.
pub(crate) trait Adjacency: Sync {
    /// Copy the neighbors of `pos` into `out`.
    fn neighbors_into(&self, pos: u32, out: &mut Vec<u32>);
}

impl Adjacency for [Mutex<Vec<u32>>] {
    fn neighbors_into(&self, pos: u32, out: &mut Vec<u32>) {
        out.clear();
        out.extend_from_slice(&self[pos as usize].lock());
    }
}

impl Adjacency for [Vec<u32>] {
    fn neighbors_into(&self, pos: u32, out: &mut Vec<u32>) {
        out.clear();
        out.extend_from_slice(&self[pos as usize]);
    }
}

/// Greedy best-first walk from `entry`.
///
/// Keeps the `ef` closest nodes seen and stops once the closest unexpanded
/// node is farther than the worst kept one. `dist` is called at most once per
/// node per walk. Returns the kept nodes in ascending distance order.
pub(crate) fn greedy_walk<A, F>(adjacency: &A, entry: u32, ef: usize, dist: &mut F) -> Vec<Candidate>
where
    A: Adjacency + ?Sized,
    F: FnMut(u32) -> f32,
{
    let ef = ef.max(1);
    let mut visited = HashSet::with_capacity(ef * 4);
    let mut frontier = MinHeap::new();
    let mut closest = MaxHeap::new();
    let mut friends = Vec::new();

    let start = Candidate::new(entry, dist(entry));
    visited.insert(entry);
    frontier.push(start);
    closest.push(start);

    while let Some(current) = frontier.pop() {
        let worst = closest.peek().map(|c| c.distance).unwrap_or(f32::INFINITY);
        if current.distance > worst {
            break;
        }

        adjacency.neighbors_into(current.pos, &mut friends);
        for &friend in &friends {
            if !visited.insert(friend) {
                continue;
            }
            let d = dist(friend);
            let worst = closest.peek().map(|c| c.distance).unwrap_or(f32::INFINITY);
            if closest.len() < ef || d < worst {
                let candidate = Candidate::new(friend, d);
                frontier.push(candidate);
                closest.push_bounded(candidate, ef);
            }
        }
    }

    closest.into_sorted_vec()
}

/// Shared state of a graph build.
struct GraphBuilder<'a> {
    space: &'a dyn Space,
    dataset: &'a Dataset,
    params: &'a SmallWorldParams,
    friends: Vec<Mutex<Vec<u32>>>,
    inserted: Mutex<Vec<u32>>,
    done: AtomicUsize,
}

impl<'a> GraphBuilder<'a> {
    fn new(space: &'a dyn Space, dataset: &'a Dataset, params: &'a SmallWorldParams) -> Self {
        Self {
            space,
            dataset,
            params,
            friends: (0..dataset.len()).map(|_| Mutex::new(Vec::new())).collect(),
            inserted: Mutex::new(Vec::with_capacity(dataset.len())),
            done: AtomicUsize::new(0),
        }
    }

    fn object(&self, pos: u32) -> &Object {
        &self.dataset[pos as usize]
    }

    /// Link `pos` into the graph. Only this worker touches `pos` until it
    /// appears in the inserted list.
    fn insert(&self, pos: u32, rng: &mut StdRng) {
        let entries: Vec<u32> = {
            let inserted = self.inserted.lock();
            if inserted.is_empty() {
                Vec::new()
            } else {
                (0..self.params.init_index_attempts)
                    .map(|_| inserted[rng.gen_range(0..inserted.len())])
                    .collect()
            }
        };

        if !entries.is_empty() {
            let target = self.object(pos);
            let mut seen: HashMap<u32, f32> = HashMap::new();
            let mut dist = |node: u32| match seen.entry(node) {
                Entry::Occupied(e) => *e.get(),
                Entry::Vacant(e) => *e.insert(self.space.distance(self.object(node), target)),
            };
            for entry in entries {
                greedy_walk(self.friends.as_slice(), entry, self.params.ef_construction, &mut dist);
            }

            let mut found: Vec<Candidate> = seen
                .into_iter()
                .map(|(node, d)| Candidate::new(node, d))
                .collect();
            found.sort_unstable();
            found.truncate(self.params.nn);

            for c in &found {
                self.add_edge(pos, c.pos);
                self.add_edge(c.pos, pos);
            }
        }

        self.inserted.lock().push(pos);
        self.report_progress();
    }

    /// Add `from -> to`, pruning `from` back to its `max_nn` closest neighbors.
    fn add_edge(&self, from: u32, to: u32) {
        if from == to {
            return;
        }
        let mut list = self.friends[from as usize].lock();
        if list.contains(&to) {
            return;
        }
        list.push(to);

        if list.len() > self.params.max_nn {
            let origin = self.object(from);
            let mut scored: Vec<Candidate> = list
                .iter()
                .map(|&f| Candidate::new(f, self.space.distance(self.object(f), origin)))
                .collect();
            scored.sort_unstable();
            scored.truncate(self.params.max_nn);
            *list = scored.into_iter().map(|c| c.pos).collect();
        }
    }

    fn report_progress(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.dataset.len();
        let step = (total / 10).max(1);
        if done % step == 0 || done == total {
            debug!(done, total, "small world graph construction progress");
        }
    }

    fn into_adjacency(self) -> Vec<Vec<u32>> {
        self.friends.into_iter().map(Mutex::into_inner).collect()
    }
}

/// Per-insertion RNG, derived from the build seed and the inserted position.
fn insertion_rng(seed: u64, pos: u32) -> StdRng {
    StdRng::seed_from_u64(seed ^ (pos as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Build the adjacency lists for every object of `dataset`.
pub(crate) fn build_graph(
    space: &dyn Space,
    dataset: &Dataset,
    params: &SmallWorldParams,
) -> Result<Vec<Vec<u32>>> {
    let mut order: Vec<u32> = (0..dataset.len() as u32).collect();
    let mut rng = StdRng::seed_from_u64(params.seed);
    order.shuffle(&mut rng);

    let builder = GraphBuilder::new(space, dataset, params);
    let Some((&first, rest)) = order.split_first() else {
        return Ok(Vec::new());
    };
    builder.insert(first, &mut insertion_rng(params.seed, first));

    if params.index_thread_qty <= 1 {
        for &pos in rest {
            builder.insert(pos, &mut insertion_rng(params.seed, pos));
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.index_thread_qty)
            .build()
            .map_err(|e| SearchError::IndexError(format!("cannot start indexing threads: {}", e)))?;
        pool.install(|| {
            rest.par_iter().for_each(|&pos| {
                builder.insert(pos, &mut insertion_rng(params.seed, pos));
            })
        });
    }

    Ok(builder.into_adjacency())
}
