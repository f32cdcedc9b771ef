//! Sequential (brute-force) search: O(n) per query, exact for every space

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::index::Index;
use crate::object::Dataset;
use crate::params::{ParamManager, Params};
use crate::query::{KnnQuery, RangeQuery, ResultCollector};
use crate::space::Space;

pub const METHOD_NAME: &str = "seq_search";

/// Computes the distance to every object of the dataset.
#[derive(Debug)]
pub struct SeqSearch {
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
}

impl SeqSearch {
    pub fn new(space: Arc<dyn Space>, dataset: Arc<Dataset>) -> Self {
        Self { space, dataset }
    }

    /// Factory constructor. Takes no parameters.
    pub fn create(
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        _params: &mut ParamManager<'_>,
    ) -> Result<Box<dyn Index>> {
        info!(space = space.name(), objects = dataset.len(), "sequential search ready");
        Ok(Box::new(Self::new(space, dataset)))
    }
}

impl Index for SeqSearch {
    fn method_name(&self) -> &'static str {
        METHOD_NAME
    }

    fn description(&self) -> String {
        format!("{} (space: {}, objects: {})", METHOD_NAME, self.space.name(), self.dataset.len())
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn search_knn(&self, query: &mut KnnQuery<'_>) -> Result<()> {
        for obj in self.dataset.iter() {
            query.add_object(obj);
        }
        Ok(())
    }

    fn search_range(&self, query: &mut RangeQuery<'_>) -> Result<()> {
        for obj in self.dataset.iter() {
            query.add_object(obj);
        }
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &Params) -> Result<()> {
        ParamManager::new(params).check_unused()
    }

    fn query_time_params(&self) -> Params {
        Params::new()
    }
}
