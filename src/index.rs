//! Index trait for pluggable search methods

use std::fmt;

use crate::error::Result;
use crate::params::Params;
use crate::query::{KnnQuery, Query, RangeQuery, SearchTarget};

/// A search index built once from a dataset and queried many times.
///
/// Built indexes are read-only during search, so any number of threads may
/// search the same index concurrently, each with its own query.
/// [`Index::set_query_time_params`] takes `&mut self` and therefore cannot
/// overlap with a search on the same instance.
pub trait Index: Send + Sync + fmt::Debug {
    /// Registered name of the method, e.g. `"vptree"`.
    fn method_name(&self) -> &'static str;

    /// Human readable description including the space and parameters.
    fn description(&self) -> String;

    /// Number of indexed objects.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a k-NN search, feeding candidates into `query`.
    fn search_knn(&self, query: &mut KnnQuery<'_>) -> Result<()>;

    /// Run a range search, feeding candidates into `query`.
    fn search_range(&self, query: &mut RangeQuery<'_>) -> Result<()>;

    /// Change search-time behavior without rebuilding.
    ///
    /// Keys not given keep their current value. On error the previous
    /// parameters stay in effect.
    fn set_query_time_params(&mut self, params: &Params) -> Result<()>;

    /// The query-time parameters currently in effect.
    fn query_time_params(&self) -> Params;

    /// Dispatch on the query's kind.
    ///
    /// Searching a query twice without [`Query::reset`] accumulates results.
    fn search(&self, query: &mut dyn Query<'_>) -> Result<()> {
        match query.target() {
            SearchTarget::Knn(q) => self.search_knn(q),
            SearchTarget::Range(q) => self.search_range(q),
        }
    }
}

impl fmt::Display for dyn Index + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
