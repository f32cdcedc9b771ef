//! Permutation signatures and the distances between them.

use std::fmt;

use crate::params::ParamValue;

/// Turn pivot distances into ranks: `out[i]` is the position of pivot `i`
/// when pivots are ordered by distance. Equal distances rank by pivot index.
pub fn ranks_from_distances(dists: &[f32], out: &mut [u32]) {
    debug_assert_eq!(dists.len(), out.len());
    let mut order: Vec<u32> = (0..dists.len() as u32).collect();
    order.sort_by(|&a, &b| {
        dists[a as usize]
            .total_cmp(&dists[b as usize])
            .then_with(|| a.cmp(&b))
    });
    for (rank, &pivot) in order.iter().enumerate() {
        out[pivot as usize] = rank as u32;
    }
}

/// Distance between two permutation signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermFunc {
    /// Sum of squared rank differences.
    #[default]
    SpearmanRho,
    /// Sum of absolute rank differences.
    Footrule,
}

impl PermFunc {
    pub fn name(&self) -> &'static str {
        match self {
            PermFunc::SpearmanRho => "spearman_rho",
            PermFunc::Footrule => "footrule",
        }
    }

    pub fn eval(&self, a: &[u32], b: &[u32]) -> u64 {
        let diffs = a.iter().zip(b).map(|(&x, &y)| (x as i64 - y as i64).unsigned_abs());
        match self {
            PermFunc::SpearmanRho => diffs.map(|d| d * d).sum(),
            PermFunc::Footrule => diffs.sum(),
        }
    }
}

impl fmt::Display for PermFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ParamValue for PermFunc {
    const EXPECTED: &'static str = "one of: spearman_rho, footrule";

    fn parse_value(raw: &str) -> Option<Self> {
        match raw {
            "spearman_rho" => Some(PermFunc::SpearmanRho),
            "footrule" => Some(PermFunc::Footrule),
            _ => None,
        }
    }
}
