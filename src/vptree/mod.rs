//! Vantage-point tree: exact search by recursive median partitioning.
//!
//! Every inner node stores a pivot and the median of the distances from the
//! pivot to the objects below it. Objects at most the median away go to the
//! left ("near") child, the rest to the right ("far") child. Search visits
//! the query's own side first and uses the [`PolynomialPruner`] to decide
//! whether the other side can still hold a result.

pub mod pruner;

pub use pruner::{PolynomialPruner, Visit};

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::index::Index;
use crate::object::Dataset;
use crate::params::{ParamManager, Params};
use crate::query::{KnnQuery, RangeQuery, ResultCollector};
use crate::space::Space;

pub const METHOD_NAME: &str = "vptree";

/// Subtrees with at least this many objects are built in parallel.
const PARALLEL_BUILD_MIN: usize = 4096;

/// Build-time parameters.
#[derive(Debug, Clone)]
pub struct VpTreeParams {
    /// Subsets of at most this many objects become leaf buckets.
    pub bucket_size: usize,
    /// Seed for pivot selection.
    pub seed: u64,
}

impl Default for VpTreeParams {
    fn default() -> Self {
        Self {
            bucket_size: 50,
            seed: 0,
        }
    }
}

impl VpTreeParams {
    pub fn from_params(pm: &mut ParamManager<'_>) -> Result<Self> {
        let defaults = Self::default();
        let bucket_size: usize = pm.get_or("bucketSize", defaults.bucket_size)?;
        if bucket_size == 0 {
            return Err(SearchError::invalid_param("bucketSize", "0", "an integer >= 1"));
        }
        Ok(Self {
            bucket_size,
            seed: pm.get_or("seed", defaults.seed)?,
        })
    }
}

/// Query-time parameters.
#[derive(Debug, Clone)]
pub struct VpTreeQueryParams {
    pub pruner: PolynomialPruner,
    /// Stop after visiting this many leaf buckets; `None` visits all of them.
    pub max_leaves_to_visit: Option<usize>,
}

impl Default for VpTreeQueryParams {
    fn default() -> Self {
        Self {
            pruner: PolynomialPruner::default(),
            max_leaves_to_visit: None,
        }
    }
}

impl VpTreeQueryParams {
    /// Read query-time parameters; absent keys keep the values of `base`.
    pub fn from_params(pm: &mut ParamManager<'_>, base: &Self) -> Result<Self> {
        let pruner = PolynomialPruner::from_params(pm, &base.pruner)?;
        let max_leaves_to_visit = match pm.get_opt::<usize>("maxLeavesToVisit")? {
            Some(0) => {
                return Err(SearchError::invalid_param("maxLeavesToVisit", "0", "an integer >= 1"));
            }
            Some(limit) => Some(limit),
            None => base.max_leaves_to_visit,
        };
        Ok(Self {
            pruner,
            max_leaves_to_visit,
        })
    }

    fn to_params(&self) -> Params {
        let params = Params::new()
            .with("alphaLeft", self.pruner.alpha_left)
            .with("expLeft", self.pruner.exp_left)
            .with("alphaRight", self.pruner.alpha_right)
            .with("expRight", self.pruner.exp_right);
        match self.max_leaves_to_visit {
            Some(limit) => params.with("maxLeavesToVisit", limit),
            None => params,
        }
    }
}

#[derive(Debug)]
enum VpNode {
    Bucket(Vec<u32>),
    Inner {
        pivot: u32,
        median: f32,
        left: Option<Box<VpNode>>,
        right: Option<Box<VpNode>>,
    },
}

/// Shape summary of a built tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub inner_nodes: usize,
    pub buckets: usize,
    pub depth: usize,
}

/// Vantage-point tree index.
#[derive(Debug)]
pub struct VpTree {
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: VpTreeParams,
    query_params: VpTreeQueryParams,
    root: Option<Box<VpNode>>,
}

impl VpTree {
    /// Build a tree with default query-time parameters.
    pub fn new(space: Arc<dyn Space>, dataset: Arc<Dataset>, params: VpTreeParams) -> Self {
        Self::build(space, dataset, params, VpTreeQueryParams::default())
    }

    /// Build a tree.
    pub fn build(
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: VpTreeParams,
        query_params: VpTreeQueryParams,
    ) -> Self {
        let positions: Vec<u32> = (0..dataset.len() as u32).collect();
        let root = build_node(
            space.as_ref(),
            &dataset,
            positions,
            params.bucket_size,
            params.seed,
        );

        let tree = Self {
            space,
            dataset,
            params,
            query_params,
            root,
        };
        let stats = tree.stats();
        info!(
            objects = tree.dataset.len(),
            inner_nodes = stats.inner_nodes,
            buckets = stats.buckets,
            depth = stats.depth,
            "vptree built"
        );
        tree
    }

    /// Factory constructor.
    pub fn create(
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        pm: &mut ParamManager<'_>,
    ) -> Result<Box<dyn Index>> {
        let params = VpTreeParams::from_params(pm)?;
        let query_params = VpTreeQueryParams::from_params(pm, &VpTreeQueryParams::default())?;
        Ok(Box::new(Self::build(space, dataset, params, query_params)))
    }

    pub fn params(&self) -> &VpTreeParams {
        &self.params
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        if let Some(root) = &self.root {
            collect_stats(root, 1, &mut stats);
        }
        stats
    }

    fn search_node<Q: ResultCollector>(&self, node: &VpNode, query: &mut Q, leaves_left: &mut usize) {
        if *leaves_left == 0 {
            return;
        }
        match node {
            VpNode::Bucket(positions) => {
                *leaves_left -= 1;
                for &pos in positions {
                    query.add_object(&self.dataset[pos as usize]);
                }
            }
            VpNode::Inner {
                pivot,
                median,
                left,
                right,
            } => {
                let dist = query.add_object(&self.dataset[*pivot as usize]);
                let pruner = &self.query_params.pruner;

                if dist <= *median {
                    if let Some(child) = left {
                        self.search_node(child, query, leaves_left);
                    }
                    if let Some(child) = right {
                        if pruner.classify(dist, query.radius(), *median) == Visit::Both {
                            self.search_node(child, query, leaves_left);
                        }
                    }
                } else {
                    if let Some(child) = right {
                        self.search_node(child, query, leaves_left);
                    }
                    if let Some(child) = left {
                        if pruner.classify(dist, query.radius(), *median) == Visit::Both {
                            self.search_node(child, query, leaves_left);
                        }
                    }
                }
            }
        }
    }

    fn search_generic<Q: ResultCollector>(&self, query: &mut Q) {
        if let Some(root) = &self.root {
            let mut leaves_left = self.query_params.max_leaves_to_visit.unwrap_or(usize::MAX);
            self.search_node(root, query, &mut leaves_left);
        }
    }
}

fn build_node(
    space: &dyn Space,
    dataset: &Dataset,
    mut positions: Vec<u32>,
    bucket_size: usize,
    seed: u64,
) -> Option<Box<VpNode>> {
    if positions.is_empty() {
        return None;
    }
    if positions.len() <= bucket_size {
        return Some(Box::new(VpNode::Bucket(positions)));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let pivot = positions.swap_remove(rng.gen_range(0..positions.len()));
    let pivot_obj = &dataset[pivot as usize];

    let mut scored: Vec<(f32, u32)> = positions
        .iter()
        .map(|&pos| (space.distance(pivot_obj, &dataset[pos as usize]), pos))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mid = scored.len() / 2;
    let median = scored[mid].0;
    let near: Vec<u32> = scored[..mid].iter().map(|&(_, pos)| pos).collect();
    let far: Vec<u32> = scored[mid..].iter().map(|&(_, pos)| pos).collect();

    // Child seeds are drawn before recursing so the shape does not depend on
    // whether the children are built in parallel.
    let near_seed: u64 = rng.gen();
    let far_seed: u64 = rng.gen();

    let (left, right) = if scored.len() >= PARALLEL_BUILD_MIN {
        rayon::join(
            || build_node(space, dataset, near, bucket_size, near_seed),
            || build_node(space, dataset, far, bucket_size, far_seed),
        )
    } else {
        (
            build_node(space, dataset, near, bucket_size, near_seed),
            build_node(space, dataset, far, bucket_size, far_seed),
        )
    };

    Some(Box::new(VpNode::Inner {
        pivot,
        median,
        left,
        right,
    }))
}

fn collect_stats(node: &VpNode, depth: usize, stats: &mut TreeStats) {
    stats.depth = stats.depth.max(depth);
    match node {
        VpNode::Bucket(_) => stats.buckets += 1,
        VpNode::Inner { left, right, .. } => {
            stats.inner_nodes += 1;
            for child in [left, right].into_iter().flatten() {
                collect_stats(child, depth + 1, stats);
            }
        }
    }
}

impl Index for VpTree {
    fn method_name(&self) -> &'static str {
        METHOD_NAME
    }

    fn description(&self) -> String {
        format!(
            "{} (space: {}, objects: {}, bucketSize={}, {})",
            METHOD_NAME,
            self.space.name(),
            self.dataset.len(),
            self.params.bucket_size,
            self.query_params.to_params()
        )
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn search_knn(&self, query: &mut KnnQuery<'_>) -> Result<()> {
        self.search_generic(query);
        Ok(())
    }

    fn search_range(&self, query: &mut RangeQuery<'_>) -> Result<()> {
        self.search_generic(query);
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &Params) -> Result<()> {
        let mut pm = ParamManager::new(params);
        let query_params = VpTreeQueryParams::from_params(&mut pm, &self.query_params)?;
        pm.check_unused()?;
        debug!(?query_params, "vptree query-time parameters updated");
        self.query_params = query_params;
        Ok(())
    }

    fn query_time_params(&self) -> Params {
        self.query_params.to_params()
    }
}
