//! Spaces: the distance capability every index is built on

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::distance::{DistanceMetric, VectorDistance};
use crate::error::{Result, SearchError};
use crate::object::{Dataset, Object, ObjectId};

/// A set equipped with a (possibly non-metric) distance.
///
/// `distance(a, b)` must be a pure function of its arguments and must not
/// fail. Queries pass the data object as `a` and the query object as `b`.
/// Index construction keeps that orientation: pivots and already indexed
/// objects go in `a`, which matters for asymmetric distances.
pub trait Space: Send + Sync + fmt::Debug {
    /// Name of the space, used in index descriptions and logs.
    fn name(&self) -> &str;

    /// Distance between two objects.
    fn distance(&self, a: &Object, b: &Object) -> f32;

    /// Parse an object from a raw textual record.
    fn create_object(&self, id: ObjectId, raw: &str) -> Result<Object>;
}

/// A space over `f32` vectors with a pluggable distance function.
pub struct VectorSpace<D> {
    name: String,
    dist: D,
    dimension: Option<usize>,
}

impl VectorSpace<DistanceMetric> {
    /// Create a space for one of the built-in metrics.
    pub fn from_metric(metric: DistanceMetric) -> Self {
        Self::new(metric.name(), metric)
    }
}

impl<D: VectorDistance> VectorSpace<D> {
    /// Create a space with a caller-supplied distance.
    pub fn new(name: impl Into<String>, dist: D) -> Self {
        Self {
            name: name.into(),
            dist,
            dimension: None,
        }
    }

    /// Require every object created by this space to have `dimension` elements.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Distance between two raw buffers.
    pub fn raw_distance(&self, x: &[f32], y: &[f32]) -> f32 {
        self.dist.eval(x, y)
    }

    /// Build an object from an in-memory buffer, checking its dimension.
    pub fn create_object_from_vec(&self, id: ObjectId, data: Vec<f32>) -> Result<Object> {
        if data.is_empty() {
            return Err(SearchError::InvalidObject {
                reason: "empty payload".to_string(),
            });
        }
        if let Some(expected) = self.dimension {
            if data.len() != expected {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(Object::new(id, data))
    }

    /// Build a dataset from rows; ids are row positions.
    pub fn create_dataset(&self, rows: &[Vec<f32>]) -> Result<Dataset> {
        let objects = rows
            .iter()
            .enumerate()
            .map(|(id, row)| self.create_object_from_vec(id, row.clone()))
            .collect::<Result<Vec<_>>>()?;
        check_same_dimension(&objects)?;
        Dataset::new(objects)
    }

    /// Read a dataset from a text file with one object per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. Reads at most
    /// `max_qty` objects; `0` means no limit.
    pub fn read_dataset(&self, path: impl AsRef<Path>, max_qty: usize) -> Result<Dataset> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut objects = Vec::new();

        for line in reader.lines() {
            if max_qty != 0 && objects.len() >= max_qty {
                break;
            }
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let id = objects.len();
            objects.push(self.create_object(id, trimmed)?);
        }

        check_same_dimension(&objects)?;
        debug!(path = %path.display(), objects = objects.len(), "read dataset");
        Dataset::new(objects)
    }
}

fn check_same_dimension(objects: &[Object]) -> Result<()> {
    if let Some(first) = objects.first() {
        if let Some(bad) = objects.iter().find(|o| o.dimension() != first.dimension()) {
            return Err(SearchError::DimensionMismatch {
                expected: first.dimension(),
                actual: bad.dimension(),
            });
        }
    }
    Ok(())
}

fn parse_values(raw: &str) -> Result<Vec<f32>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(|tok| match tok.parse::<f32>() {
            Ok(x) if x.is_finite() => Ok(x),
            _ => Err(SearchError::InvalidObject {
                reason: format!("Invalid float: {}", tok),
            }),
        })
        .collect()
}

impl<D: VectorDistance> Space for VectorSpace<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn distance(&self, a: &Object, b: &Object) -> f32 {
        debug_assert_eq!(a.dimension(), b.dimension());
        self.dist.eval(a.as_slice(), b.as_slice())
    }

    fn create_object(&self, id: ObjectId, raw: &str) -> Result<Object> {
        let data = parse_values(raw)?;
        self.create_object_from_vec(id, data)
    }
}

impl<D> fmt::Debug for VectorSpace<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorSpace")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .finish()
    }
}
