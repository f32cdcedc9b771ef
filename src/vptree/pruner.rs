//! Pruning decisions for VP-tree search in metric and non-metric spaces.

use tracing::warn;

use crate::error::{Result, SearchError};
use crate::params::ParamManager;

/// Relative tolerance on the pruning bound, in units of the operands.
pub const PRUNE_SLACK: f32 = 32.0 * f32::EPSILON;

/// Which children of a VP-tree node a search has to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Only the near child (distance to pivot <= median).
    Left,
    /// Only the far child (distance to pivot >= median).
    Right,
    Both,
}

/// Polynomial pruner.
///
/// With `diff = |d(pivot, q) - median|`, the child on the other side of the
/// median is skipped when `alpha * diff^exp` exceeds the search radius. For
/// a metric distance, `alpha = 1` and `exp = 1` give the triangle-inequality
/// bound and an exact search; other values trade recall for speed and make
/// the tree usable with non-metric distances.
///
/// Distances are rounded, so the computed `diff` can overshoot the true
/// bound by a few ulps. A child is pruned only when the bound clears the
/// radius by more than [`PRUNE_SLACK`] relative to the magnitudes involved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialPruner {
    pub alpha_left: f32,
    pub exp_left: u32,
    pub alpha_right: f32,
    pub exp_right: u32,
}

impl Default for PolynomialPruner {
    fn default() -> Self {
        Self {
            alpha_left: 1.0,
            exp_left: 1,
            alpha_right: 1.0,
            exp_right: 1,
        }
    }
}

impl PolynomialPruner {
    /// Read `alphaLeft`, `expLeft`, `alphaRight`, `expRight`, falling back to `base`.
    pub fn from_params(pm: &mut ParamManager<'_>, base: &PolynomialPruner) -> Result<Self> {
        let pruner = Self {
            alpha_left: pm.get_or("alphaLeft", base.alpha_left)?,
            exp_left: pm.get_or("expLeft", base.exp_left)?,
            alpha_right: pm.get_or("alphaRight", base.alpha_right)?,
            exp_right: pm.get_or("expRight", base.exp_right)?,
        };

        for (key, alpha) in [("alphaLeft", pruner.alpha_left), ("alphaRight", pruner.alpha_right)] {
            if alpha <= 0.0 {
                return Err(SearchError::invalid_param(key, alpha.to_string(), "a positive number"));
            }
        }
        for (key, exp) in [("expLeft", pruner.exp_left), ("expRight", pruner.exp_right)] {
            if exp == 0 {
                return Err(SearchError::invalid_param(key, "0", "an integer >= 1"));
            }
        }
        if !pruner.is_exact() {
            warn!(?pruner, "non-default pruning factors: search results may be approximate");
        }
        Ok(pruner)
    }

    /// Whether the bounds reduce to the plain triangle inequality.
    pub fn is_exact(&self) -> bool {
        *self == Self::default()
    }

    /// Decide which children to visit given the query's distance to the
    /// pivot, the current search radius and the node's median distance.
    pub fn classify(&self, dist: f32, radius: f32, median: f32) -> Visit {
        let limit = radius + PRUNE_SLACK * (dist.abs() + median.abs() + radius.abs());
        if dist < median {
            let diff = median - dist;
            if self.alpha_left * diff.powi(self.exp_left as i32) > limit {
                return Visit::Left;
            }
        } else if dist > median {
            let diff = dist - median;
            if self.alpha_right * diff.powi(self.exp_right as i32) > limit {
                return Visit::Right;
            }
        }
        Visit::Both
    }
}
