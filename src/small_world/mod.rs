//! Small-world proximity graph (`small_world_rand`).
//!
//! An approximate k-NN method: objects are linked to their approximate
//! nearest neighbors at insertion time and queries are answered by greedy
//! walks over the resulting graph. Range queries are not supported.

pub mod graph;
pub mod neighbor_queue;

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::index::Index;
use crate::object::{Dataset, Object};
use crate::params::{ParamManager, Params};
use crate::query::{KnnQuery, QueryKind, RangeQuery};
use crate::space::Space;

pub const METHOD_NAME: &str = "small_world_rand";

/// Build-time parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SmallWorldParams {
    /// Number of neighbors a new node links to.
    pub nn: usize,
    /// Cap on the adjacency list size of any node.
    pub max_nn: usize,
    /// Candidate list size of the searches run during insertion.
    pub ef_construction: usize,
    /// Entry points tried per insertion.
    pub init_index_attempts: usize,
    pub index_thread_qty: usize,
    pub seed: u64,
}

fn default_thread_qty() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Default for SmallWorldParams {
    fn default() -> Self {
        Self {
            nn: 5,
            max_nn: 10,
            ef_construction: 5,
            init_index_attempts: 2,
            index_thread_qty: default_thread_qty(),
            seed: 0,
        }
    }
}

fn require_positive(key: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(SearchError::invalid_param(key, "0", "an integer >= 1"));
    }
    Ok(value)
}

impl SmallWorldParams {
    pub fn from_params(pm: &mut ParamManager<'_>) -> Result<Self> {
        let nn = require_positive("NN", pm.get_or("NN", 5)?)?;
        let max_nn: usize = pm.get_or("maxNN", 2 * nn)?;
        if max_nn < nn {
            return Err(SearchError::invalid_param(
                "maxNN",
                max_nn.to_string(),
                format!("an integer >= NN ({})", nn),
            ));
        }
        Ok(Self {
            nn,
            max_nn,
            ef_construction: require_positive("efConstruction", pm.get_or("efConstruction", nn)?)?,
            init_index_attempts: require_positive(
                "initIndexAttempts",
                pm.get_or("initIndexAttempts", 2)?,
            )?,
            index_thread_qty: require_positive(
                "indexThreadQty",
                pm.get_or("indexThreadQty", default_thread_qty())?,
            )?,
            seed: pm.get_or("seed", 0)?,
        })
    }
}

/// Query-time parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SmallWorldQueryParams {
    /// Greedy walks per query, each from a random entry point.
    pub init_search_attempts: usize,
    /// Candidate list size of each walk; at least `k` is used.
    pub ef_search: usize,
}

impl SmallWorldQueryParams {
    /// Defaults for a graph built with `params`.
    pub fn for_build(params: &SmallWorldParams) -> Self {
        Self {
            init_search_attempts: 3,
            ef_search: params.nn,
        }
    }

    /// Read query-time parameters; absent keys keep the values of `base`.
    pub fn from_params(pm: &mut ParamManager<'_>, base: &Self) -> Result<Self> {
        Ok(Self {
            init_search_attempts: require_positive(
                "initSearchAttempts",
                pm.get_or("initSearchAttempts", base.init_search_attempts)?,
            )?,
            ef_search: require_positive("efSearch", pm.get_or("efSearch", base.ef_search)?)?,
        })
    }

    fn to_params(&self) -> Params {
        Params::new()
            .with("initSearchAttempts", self.init_search_attempts)
            .with("efSearch", self.ef_search)
    }
}

/// Degree summary of a built graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub min_degree: usize,
    pub max_degree: usize,
}

/// Navigable small-world graph index.
#[derive(Debug)]
pub struct SmallWorldRand {
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: SmallWorldParams,
    query_params: SmallWorldQueryParams,
    adjacency: Vec<Vec<u32>>,
}

impl SmallWorldRand {
    /// Build the graph with default query-time parameters.
    pub fn build(space: Arc<dyn Space>, dataset: Arc<Dataset>, params: SmallWorldParams) -> Result<Self> {
        let query_params = SmallWorldQueryParams::for_build(&params);
        Self::build_with(space, dataset, params, query_params)
    }

    pub fn build_with(
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: SmallWorldParams,
        query_params: SmallWorldQueryParams,
    ) -> Result<Self> {
        let start = Instant::now();
        let adjacency = graph::build_graph(space.as_ref(), &dataset, &params)?;
        let index = Self {
            space,
            dataset,
            params,
            query_params,
            adjacency,
        };

        let stats = index.stats();
        info!(
            objects = stats.nodes,
            edges = stats.edges,
            max_degree = stats.max_degree,
            threads = index.params.index_thread_qty,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "small world graph built"
        );
        Ok(index)
    }

    /// Factory constructor.
    pub fn create(
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        pm: &mut ParamManager<'_>,
    ) -> Result<Box<dyn Index>> {
        let params = SmallWorldParams::from_params(pm)?;
        let query_params = SmallWorldQueryParams::from_params(pm, &SmallWorldQueryParams::for_build(&params))?;
        Ok(Box::new(Self::build_with(space, dataset, params, query_params)?))
    }

    pub fn params(&self) -> &SmallWorldParams {
        &self.params
    }

    /// Dataset positions adjacent to the object at `pos`.
    pub fn neighbors(&self, pos: usize) -> &[u32] {
        self.adjacency.get(pos).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stats(&self) -> GraphStats {
        let degrees = self.adjacency.iter().map(Vec::len);
        GraphStats {
            nodes: self.adjacency.len(),
            edges: degrees.clone().sum(),
            min_degree: degrees.clone().min().unwrap_or(0),
            max_degree: degrees.max().unwrap_or(0),
        }
    }
}

/// Seed for a query's entry points, so repeated searches with the same
/// object walk the same paths.
fn query_seed(object: &Object) -> u64 {
    let mut hasher = DefaultHasher::new();
    object.id().hash(&mut hasher);
    for value in object.as_slice() {
        value.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

impl Index for SmallWorldRand {
    fn method_name(&self) -> &'static str {
        METHOD_NAME
    }

    fn description(&self) -> String {
        format!(
            "{} (space: {}, objects: {}, NN={}, maxNN={}, efConstruction={}, {})",
            METHOD_NAME,
            self.space.name(),
            self.dataset.len(),
            self.params.nn,
            self.params.max_nn,
            self.params.ef_construction,
            self.query_params.to_params()
        )
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn search_knn(&self, query: &mut KnnQuery<'_>) -> Result<()> {
        let n = self.dataset.len();
        if n == 0 || query.k() == 0 {
            return Ok(());
        }

        let ef = self.query_params.ef_search.max(query.k());
        let mut rng = StdRng::seed_from_u64(query_seed(query.query_object()));
        let mut seen: HashMap<u32, f32> = HashMap::new();
        let dataset = &self.dataset;

        let mut dist = |pos: u32| match seen.entry(pos) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let obj = &dataset[pos as usize];
                let d = query.distance_to(obj);
                query.check_and_add(obj, d);
                *e.insert(d)
            }
        };

        for _ in 0..self.query_params.init_search_attempts {
            let entry = rng.gen_range(0..n) as u32;
            graph::greedy_walk(self.adjacency.as_slice(), entry, ef, &mut dist);
        }
        Ok(())
    }

    fn search_range(&self, _query: &mut RangeQuery<'_>) -> Result<()> {
        Err(SearchError::UnsupportedQuery {
            method: METHOD_NAME,
            kind: QueryKind::Range,
        })
    }

    fn set_query_time_params(&mut self, params: &Params) -> Result<()> {
        let mut pm = ParamManager::new(params);
        let query_params = SmallWorldQueryParams::from_params(&mut pm, &self.query_params)?;
        pm.check_unused()?;
        debug!(?query_params, "small world query-time parameters updated");
        self.query_params = query_params;
        Ok(())
    }

    fn query_time_params(&self) -> Params {
        self.query_params.to_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::query::Query;
    use crate::seq_search::SeqSearch;
    use crate::space::VectorSpace;
    use std::collections::HashSet;

    fn random_dataset(n: usize, dim: usize, seed: u64) -> Dataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let objects = (0..n)
            .map(|i| Object::new(i, (0..dim).map(|_| rng.gen::<f32>()).collect()))
            .collect();
        Dataset::new(objects).unwrap()
    }

    fn l2() -> Arc<dyn Space> {
        Arc::new(VectorSpace::from_metric(DistanceMetric::L2))
    }

    fn test_params(threads: usize) -> SmallWorldParams {
        SmallWorldParams {
            nn: 10,
            max_nn: 20,
            ef_construction: 20,
            init_index_attempts: 2,
            index_thread_qty: threads,
            seed: 42,
        }
    }

    #[test]
    fn test_finds_itself() {
        let space = l2();
        let dataset = Arc::new(random_dataset(300, 4, 1));
        let index = SmallWorldRand::build(space.clone(), dataset.clone(), test_params(2)).unwrap();

        for obj in dataset.iter().take(20) {
            let mut query = KnnQuery::new(space.as_ref(), obj, 1);
            index.search(&mut query).unwrap();
            let results = query.results();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].distance, 0.0);
        }
    }

    #[test]
    fn test_recall_against_brute_force() {
        let space = l2();
        let dataset = Arc::new(random_dataset(1000, 8, 2));
        let mut index = SmallWorldRand::build(space.clone(), dataset.clone(), test_params(4)).unwrap();
        index
            .set_query_time_params(&Params::parse(["efSearch=50"]).unwrap())
            .unwrap();
        let brute = SeqSearch::new(space.clone(), dataset);

        let queries = random_dataset(30, 8, 3);
        let k = 10;
        let mut hits = 0;
        for q in queries.iter() {
            let mut expected = KnnQuery::new(space.as_ref(), q, k);
            brute.search(&mut expected).unwrap();
            let mut actual = KnnQuery::new(space.as_ref(), q, k);
            index.search(&mut actual).unwrap();

            let truth: HashSet<_> = expected.results().iter().map(|n| n.id).collect();
            hits += actual.results().iter().filter(|n| truth.contains(&n.id)).count();
            assert!(actual.distance_computations() <= 1000);
        }
        let recall = hits as f64 / (queries.len() * k) as f64;
        assert!(recall >= 0.9, "recall {} below 0.9", recall);
    }

    #[test]
    fn test_parallel_build_degree_invariants() {
        let space = l2();
        let dataset = Arc::new(random_dataset(2000, 4, 4));
        let params = SmallWorldParams {
            nn: 5,
            max_nn: 8,
            ef_construction: 10,
            init_index_attempts: 3,
            index_thread_qty: 8,
            seed: 9,
        };
        let index = SmallWorldRand::build(space, dataset, params).unwrap();

        let stats = index.stats();
        assert_eq!(stats.nodes, 2000);
        assert!(stats.min_degree >= 1);
        assert!(stats.max_degree <= 8);
        for pos in 0..2000 {
            let list = index.neighbors(pos);
            let unique: HashSet<_> = list.iter().collect();
            assert_eq!(unique.len(), list.len());
            assert!(!list.contains(&(pos as u32)));
        }
    }

    #[test]
    fn test_repeated_search_is_identical() {
        let space = l2();
        let dataset = Arc::new(random_dataset(500, 4, 5));
        let index = SmallWorldRand::build(space.clone(), dataset, test_params(3)).unwrap();

        let q = Object::new(0, vec![0.2, 0.4, 0.6, 0.8]);
        let mut query = KnnQuery::new(space.as_ref(), &q, 5);
        index.search(&mut query).unwrap();
        let first = query.results();
        let first_cost = query.distance_computations();

        query.reset();
        index.search(&mut query).unwrap();
        assert_eq!(query.results(), first);
        assert_eq!(query.distance_computations(), first_cost);
    }

    #[test]
    fn test_range_query_rejected() {
        let space = l2();
        let dataset = Arc::new(random_dataset(20, 2, 6));
        let index = SmallWorldRand::build(space.clone(), dataset, test_params(1)).unwrap();
        let q = Object::new(0, vec![0.5, 0.5]);
        let mut query = RangeQuery::new(space.as_ref(), &q, 0.1);

        let err = index.search(&mut query).unwrap_err();
        assert!(matches!(
            err,
            SearchError::UnsupportedQuery {
                kind: QueryKind::Range,
                ..
            }
        ));
        assert_eq!(query.result_size(), 0);
    }

    #[test]
    fn test_empty_index() {
        let space = l2();
        let index = SmallWorldRand::build(space.clone(), Arc::new(Dataset::default()), test_params(2)).unwrap();
        let q = Object::new(0, vec![0.0]);
        let mut query = KnnQuery::new(space.as_ref(), &q, 3);
        index.search(&mut query).unwrap();
        assert_eq!(query.result_size(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_param_defaults_and_validation() {
        let params = Params::parse(["NN=11", "initIndexAttempts=3", "indexThreadQty=4"]).unwrap();
        let mut pm = ParamManager::new(&params);
        let parsed = SmallWorldParams::from_params(&mut pm).unwrap();
        assert_eq!(parsed.nn, 11);
        assert_eq!(parsed.max_nn, 22);
        assert_eq!(parsed.ef_construction, 11);
        assert_eq!(parsed.init_index_attempts, 3);
        assert_eq!(parsed.index_thread_qty, 4);
        assert!(pm.check_unused().is_ok());

        for token in ["NN=0", "NN=abc", "maxNN=2", "indexThreadQty=0"] {
            let params = Params::parse([token]).unwrap();
            let mut pm = ParamManager::new(&params);
            assert!(SmallWorldParams::from_params(&mut pm).is_err(), "{} accepted", token);
        }
    }

    #[test]
    fn test_query_params_update() {
        let space = l2();
        let dataset = Arc::new(random_dataset(50, 2, 7));
        let mut index = SmallWorldRand::build(space, dataset, test_params(1)).unwrap();

        index
            .set_query_time_params(&Params::parse(["efSearch=40"]).unwrap())
            .unwrap();
        assert!(index
            .set_query_time_params(&Params::parse(["initSearchAttempts=0"]).unwrap())
            .is_err());
        assert!(index
            .set_query_time_params(&Params::parse(["NN=3"]).unwrap())
            .is_err());

        let current = index.query_time_params();
        assert_eq!(current.get::<usize>("efSearch").unwrap(), 40);
        assert_eq!(current.get::<usize>("initSearchAttempts").unwrap(), 3);
    }
}
