//! # simspace
//!
//! Similarity search in generic, possibly non-metric, spaces.
//!
//! This library provides:
//! - Spaces over `f32` vectors (L2, L1, cosine, KL-divergence or a custom distance)
//! - k-NN and range queries with shared ranking rules
//! - Search methods created by name through a registry:
//!   - `seq_search`: brute force
//!   - `vptree`: vantage-point tree with polynomial pruning
//!   - `small_world_rand`: proximity graph built in parallel
//!   - `perm_incsort`: pivot-permutation filtering
//! - String parameters (`"key=value"`) validated by each method
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use simspace::{factory, DistanceMetric, Index, KnnQuery, Params, Space, VectorSpace};
//!
//! # fn main() -> simspace::Result<()> {
//! let space: Arc<dyn Space> = Arc::new(VectorSpace::from_metric(DistanceMetric::L2));
//! let rows = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]];
//! let dataset = Arc::new(VectorSpace::from_metric(DistanceMetric::L2).create_dataset(&rows)?);
//!
//! let params = Params::parse(["bucketSize=1"])?;
//! let index = factory::create_method("vptree", space.clone(), dataset.clone(), &params)?;
//!
//! let mut query = KnnQuery::new(space.as_ref(), &dataset[0], 2);
//! index.search(&mut query)?;
//! let ids: Vec<usize> = query.results().iter().map(|n| n.id).collect();
//! assert_eq!(ids, vec![0, 1]);
//! # Ok(())
//! # }
//! ```

pub mod distance;
pub mod error;
pub mod factory;
pub mod index;
pub mod object;
pub mod params;
pub mod permutation;
pub mod query;
pub mod ranking;
pub mod seq_search;
pub mod small_world;
pub mod space;
pub mod vptree;

pub use distance::DistanceMetric;
pub use error::{Result, SearchError};
pub use factory::MethodRegistry;
pub use index::Index;
pub use object::{Dataset, Object, ObjectId};
pub use params::{ParamManager, Params};
pub use permutation::PermutationIncSort;
pub use query::{KnnQuery, Query, QueryKind, RangeQuery, ResultCollector};
pub use ranking::{KnnQueue, Neighbor, RangeResults};
pub use seq_search::SeqSearch;
pub use small_world::SmallWorldRand;
pub use space::{Space, VectorSpace};
pub use vptree::VpTree;
