//! Pivot-permutation index with incremental sorting (`perm_incsort`).
//!
//! Each object is represented by the order in which it sees a fixed set of
//! pivots, closest first. Objects whose pivot orders resemble the query's are
//! likely close to it, so a search ranks all objects by permutation distance
//! and computes true distances only for the best `dbScanFrac` share of them.

pub mod signature;

pub use signature::PermFunc;

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::index::Index;
use crate::object::Dataset;
use crate::params::{ParamManager, Params};
use crate::query::{KnnQuery, RangeQuery, ResultCollector};
use crate::space::Space;

pub const METHOD_NAME: &str = "perm_incsort";

/// Build-time parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationParams {
    pub num_pivot: usize,
    /// Seed for pivot sampling.
    pub seed: u64,
}

impl Default for PermutationParams {
    fn default() -> Self {
        Self {
            num_pivot: 16,
            seed: 0,
        }
    }
}

impl PermutationParams {
    pub fn from_params(pm: &mut ParamManager<'_>) -> Result<Self> {
        let defaults = Self::default();
        let num_pivot: usize = pm.get_or("numPivot", defaults.num_pivot)?;
        if num_pivot == 0 {
            return Err(SearchError::invalid_param("numPivot", "0", "an integer >= 1"));
        }
        Ok(Self {
            num_pivot,
            seed: pm.get_or("seed", defaults.seed)?,
        })
    }
}

/// Query-time parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationQueryParams {
    /// Share of the dataset whose true distances are computed, in (0, 1].
    pub db_scan_frac: f32,
    /// When non-zero, k-NN queries scan `k * knn_amp` objects instead.
    pub knn_amp: usize,
    pub perm_func: PermFunc,
}

impl Default for PermutationQueryParams {
    fn default() -> Self {
        Self {
            db_scan_frac: 0.05,
            knn_amp: 0,
            perm_func: PermFunc::default(),
        }
    }
}

impl PermutationQueryParams {
    /// Read query-time parameters; absent keys keep the values of `base`.
    pub fn from_params(pm: &mut ParamManager<'_>, base: &Self) -> Result<Self> {
        let db_scan_frac: f32 = pm.get_or("dbScanFrac", base.db_scan_frac)?;
        if !(db_scan_frac > 0.0 && db_scan_frac <= 1.0) {
            return Err(SearchError::invalid_param(
                "dbScanFrac",
                db_scan_frac.to_string(),
                "a number in (0, 1]",
            ));
        }
        Ok(Self {
            db_scan_frac,
            knn_amp: pm.get_or("knnAmp", base.knn_amp)?,
            perm_func: pm.get_or("permFunc", base.perm_func)?,
        })
    }

    fn to_params(&self) -> Params {
        Params::new()
            .with("dbScanFrac", self.db_scan_frac)
            .with("knnAmp", self.knn_amp)
            .with("permFunc", self.perm_func)
    }

    /// Number of candidates to verify among `n` objects.
    pub fn scan_size(&self, n: usize, k: Option<usize>) -> usize {
        if n == 0 {
            return 0;
        }
        match k {
            Some(k) if self.knn_amp > 0 => n.min(k.saturating_mul(self.knn_amp)),
            _ => ((self.db_scan_frac * n as f32).ceil() as usize).clamp(1, n),
        }
    }
}

/// Permutation index.
#[derive(Debug)]
pub struct PermutationIncSort {
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: PermutationParams,
    query_params: PermutationQueryParams,
    /// Dataset positions of the pivots.
    pivots: Vec<u32>,
    /// `num_pivot` ranks per object, object after object.
    signatures: Vec<u32>,
}

impl PermutationIncSort {
    pub fn build(
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: PermutationParams,
        query_params: PermutationQueryParams,
    ) -> Result<Self> {
        let n = dataset.len();
        if params.num_pivot == 0 {
            return Err(SearchError::invalid_param("numPivot", "0", "an integer >= 1"));
        }
        if params.num_pivot > n {
            return Err(SearchError::InvalidDataset {
                reason: format!(
                    "numPivot={} needs at least as many objects, the dataset has {}",
                    params.num_pivot, n
                ),
            });
        }

        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let pivots: Vec<u32> = sample(&mut rng, n, params.num_pivot)
            .into_iter()
            .map(|pos| pos as u32)
            .collect();

        let mut signatures = vec![0u32; n * params.num_pivot];
        signatures
            .par_chunks_mut(params.num_pivot)
            .zip(dataset.as_slice().par_iter())
            .for_each(|(out, obj)| {
                let dists: Vec<f32> = pivots
                    .iter()
                    .map(|&p| space.distance(&dataset[p as usize], obj))
                    .collect();
                signature::ranks_from_distances(&dists, out);
            });

        info!(
            objects = n,
            pivots = params.num_pivot,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "permutation index built"
        );
        Ok(Self {
            space,
            dataset,
            params,
            query_params,
            pivots,
            signatures,
        })
    }

    /// Factory constructor.
    pub fn create(
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        pm: &mut ParamManager<'_>,
    ) -> Result<Box<dyn Index>> {
        let params = PermutationParams::from_params(pm)?;
        let query_params = PermutationQueryParams::from_params(pm, &PermutationQueryParams::default())?;
        Ok(Box::new(Self::build(space, dataset, params, query_params)?))
    }

    pub fn params(&self) -> &PermutationParams {
        &self.params
    }

    pub fn pivots(&self) -> &[u32] {
        &self.pivots
    }

    /// Permutation signature of the object at `pos`.
    pub fn signature(&self, pos: usize) -> &[u32] {
        let m = self.params.num_pivot;
        &self.signatures[pos * m..(pos + 1) * m]
    }

    fn query_signature<Q: ResultCollector>(&self, query: &mut Q) -> Vec<u32> {
        let dists: Vec<f32> = self
            .pivots
            .iter()
            .map(|&p| query.distance_to(&self.dataset[p as usize]))
            .collect();
        let mut ranks = vec![0u32; dists.len()];
        signature::ranks_from_distances(&dists, &mut ranks);
        ranks
    }

    /// Positions of the `scan` objects with the smallest permutation
    /// distance to `query_sig`, ordered by (score, position).
    fn candidates(&self, query_sig: &[u32], scan: usize) -> Vec<u32> {
        let perm_func = self.query_params.perm_func;
        let mut scored: Vec<(u64, u32)> = (0..self.dataset.len())
            .map(|pos| (perm_func.eval(self.signature(pos), query_sig), pos as u32))
            .collect();

        if scan < scored.len() {
            scored.select_nth_unstable(scan - 1);
            scored.truncate(scan);
        }
        scored.sort_unstable();
        scored.into_iter().map(|(_, pos)| pos).collect()
    }

    fn search_generic<Q: ResultCollector>(&self, query: &mut Q, k: Option<usize>) {
        let scan = self.query_params.scan_size(self.dataset.len(), k);
        if scan == 0 {
            return;
        }
        let query_sig = self.query_signature(query);
        for pos in self.candidates(&query_sig, scan) {
            query.add_object(&self.dataset[pos as usize]);
        }
    }
}

impl Index for PermutationIncSort {
    fn method_name(&self) -> &'static str {
        METHOD_NAME
    }

    fn description(&self) -> String {
        format!(
            "{} (space: {}, objects: {}, numPivot={}, {})",
            METHOD_NAME,
            self.space.name(),
            self.dataset.len(),
            self.params.num_pivot,
            self.query_params.to_params()
        )
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn search_knn(&self, query: &mut KnnQuery<'_>) -> Result<()> {
        let k = query.k();
        self.search_generic(query, Some(k));
        Ok(())
    }

    fn search_range(&self, query: &mut RangeQuery<'_>) -> Result<()> {
        self.search_generic(query, None);
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &Params) -> Result<()> {
        let mut pm = ParamManager::new(params);
        let query_params = PermutationQueryParams::from_params(&mut pm, &self.query_params)?;
        pm.check_unused()?;
        debug!(?query_params, "permutation query-time parameters updated");
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
    use crate::object::Object;
    use crate::query::Query;
    use crate::seq_search::SeqSearch;
    use crate::space::VectorSpace;
    use rand::Rng;
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

    fn build(dataset: Arc<Dataset>, tokens: &[&str]) -> Result<Box<dyn Index>> {
        let params = Params::parse(tokens.iter().copied())?;
        let mut pm = ParamManager::new(&params);
        let index = PermutationIncSort::create(l2(), dataset, &mut pm)?;
        pm.check_unused()?;
        Ok(index)
    }

    #[test]
    fn test_params_from_strings() {
        let params = Params::parse(["dbScanFrac=0.2", "numPivot=16"]).unwrap();
        let mut pm = ParamManager::new(&params);
        let build = PermutationParams::from_params(&mut pm).unwrap();
        let query = PermutationQueryParams::from_params(&mut pm, &Default::default()).unwrap();
        assert_eq!(build.num_pivot, 16);
        assert_eq!(query.db_scan_frac, 0.2);
        assert!(pm.check_unused().is_ok());
    }

    #[test]
    fn test_non_integer_pivot_count() {
        let dataset = Arc::new(random_dataset(50, 2, 1));
        let err = build(dataset, &["numPivot=abc"]).unwrap_err();
        assert!(matches!(err, SearchError::InvalidParam { ref key, .. } if key == "numPivot"));
    }

    #[test]
    fn test_too_many_pivots() {
        let dataset = Arc::new(random_dataset(10, 2, 1));
        let err = build(dataset, &["numPivot=11"]).unwrap_err();
        assert!(matches!(err, SearchError::InvalidDataset { .. }));
        assert!(build(Arc::new(random_dataset(10, 2, 1)), &["numPivot=0"]).is_err());
    }

    #[test]
    fn test_scan_size() {
        let mut qp = PermutationQueryParams::default();
        assert_eq!(qp.scan_size(1000, Some(10)), 50);
        assert_eq!(qp.scan_size(10, None), 1);
        assert_eq!(qp.scan_size(0, None), 0);
        qp.db_scan_frac = 1.0;
        assert_eq!(qp.scan_size(7, None), 7);
        qp.knn_amp = 3;
        assert_eq!(qp.scan_size(1000, Some(10)), 30);
        assert_eq!(qp.scan_size(20, Some(10)), 20);
        assert_eq!(qp.scan_size(1000, None), 1000);
    }

    #[test]
    fn test_signatures_are_permutations() {
        let dataset = Arc::new(random_dataset(200, 3, 2));
        let index = PermutationIncSort::build(
            l2(),
            dataset,
            PermutationParams { num_pivot: 8, seed: 3 },
            PermutationQueryParams::default(),
        )
        .unwrap();

        let pivots: HashSet<_> = index.pivots().iter().collect();
        assert_eq!(pivots.len(), 8);
        for pos in 0..200 {
            let mut sig = index.signature(pos).to_vec();
            sig.sort_unstable();
            assert_eq!(sig, (0..8).collect::<Vec<u32>>());
        }
        // A pivot is closest to itself.
        for (i, &p) in index.pivots().iter().enumerate() {
            assert_eq!(index.signature(p as usize)[i], 0);
        }
    }

    #[test]
    fn test_full_scan_is_exact() {
        let space = l2();
        let dataset = Arc::new(random_dataset(300, 4, 4));
        let index = build(dataset.clone(), &["numPivot=8", "dbScanFrac=1.0"]).unwrap();
        let brute = SeqSearch::new(space.clone(), dataset);

        let q = Object::new(usize::MAX, vec![0.1, 0.2, 0.3, 0.4]);
        let mut expected = KnnQuery::new(space.as_ref(), &q, 10);
        brute.search(&mut expected).unwrap();
        let mut actual = KnnQuery::new(space.as_ref(), &q, 10);
        index.search(&mut actual).unwrap();
        assert_eq!(actual.results(), expected.results());

        let mut expected = RangeQuery::new(space.as_ref(), &q, 0.3);
        brute.search(&mut expected).unwrap();
        let mut actual = RangeQuery::new(space.as_ref(), &q, 0.3);
        index.search(&mut actual).unwrap();
        assert_eq!(actual.sorted_results(), expected.sorted_results());
    }

    #[test]
    fn test_scan_fraction_bounds_work() {
        let space = l2();
        let dataset = Arc::new(random_dataset(1000, 4, 5));
        let mut index = build(dataset, &["numPivot=16", "dbScanFrac=0.1"]).unwrap();
        let q = Object::new(0, vec![0.5; 4]);

        let mut query = KnnQuery::new(space.as_ref(), &q, 5);
        index.search(&mut query).unwrap();
        // pivots plus the scanned share
        assert_eq!(query.distance_computations(), 16 + 100);
        assert_eq!(query.result_size(), 5);

        index
            .set_query_time_params(&Params::parse(["knnAmp=4"]).unwrap())
            .unwrap();
        query.reset();
        index.search(&mut query).unwrap();
        assert_eq!(query.distance_computations(), 16 + 20);
    }

    #[test]
    fn test_recall_never_decreases_with_scan_fraction() {
        let space = l2();
        let dataset = Arc::new(random_dataset(800, 6, 6));
        let brute = SeqSearch::new(space.clone(), dataset.clone());
        let mut index = build(dataset, &["numPivot=12"]).unwrap();
        let queries = random_dataset(10, 6, 7);

        for q in queries.iter() {
            let mut truth = KnnQuery::new(space.as_ref(), q, 10);
            brute.search(&mut truth).unwrap();
            let truth: HashSet<_> = truth.results().iter().map(|n| n.id).collect();

            let mut last_recall = 0;
            for frac in ["0.01", "0.05", "0.2", "0.5", "1.0"] {
                index
                    .set_query_time_params(&Params::new().with("dbScanFrac", frac))
                    .unwrap();
                let mut query = KnnQuery::new(space.as_ref(), q, 10);
                index.search(&mut query).unwrap();
                let recall = query.results().iter().filter(|n| truth.contains(&n.id)).count();
                assert!(recall >= last_recall, "recall dropped at dbScanFrac={}", frac);
                last_recall = recall;
            }
            assert_eq!(last_recall, 10);
        }
    }

    #[test]
    fn test_bad_query_params_keep_previous() {
        let dataset = Arc::new(random_dataset(100, 2, 8));
        let mut index = build(dataset, &["numPivot=4"]).unwrap();
        index
            .set_query_time_params(&Params::parse(["permFunc=footrule", "dbScanFrac=0.5"]).unwrap())
            .unwrap();
        for token in ["dbScanFrac=0", "dbScanFrac=1.5", "permFunc=kendall", "numPivot=3"] {
            assert!(index.set_query_time_params(&Params::parse([token]).unwrap()).is_err());
        }

        let current = index.query_time_params();
        assert_eq!(current.get::<f32>("dbScanFrac").unwrap(), 0.5);
        assert_eq!(current.get::<PermFunc>("permFunc").unwrap(), PermFunc::Footrule);
    }
}
