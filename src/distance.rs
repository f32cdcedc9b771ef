//! Distance functions over `f32` payloads

/// A distance between two equal-length number buffers.
///
/// Implementations must be pure: the same pair always yields the same value,
/// because index construction evaluates pairs repeatedly and from several
/// threads. Symmetry and the triangle inequality are not required.
pub trait VectorDistance: Send + Sync {
    fn eval(&self, x: &[f32], y: &[f32]) -> f32;
}

impl<F> VectorDistance for F
where
    F: Fn(&[f32], &[f32]) -> f32 + Send + Sync,
{
    fn eval(&self, x: &[f32], y: &[f32]) -> f32 {
        self(x, y)
    }
}

/// Built-in distances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance
    L2,
    /// Manhattan (L1) distance
    L1,
    /// Cosine distance: 1 - cosine similarity
    Cosine,
    /// Kullback-Leibler divergence. Asymmetric, expects positive entries.
    KlDivergence,
}

impl DistanceMetric {
    /// Short name used in space descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::L1 => "l1",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::KlDivergence => "kldiv",
        }
    }

    /// Whether the distance satisfies the metric axioms.
    pub fn is_metric(&self) -> bool {
        matches!(self, DistanceMetric::L2 | DistanceMetric::L1)
    }
}

impl VectorDistance for DistanceMetric {
    fn eval(&self, x: &[f32], y: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => euclidean_distance(x, y),
            DistanceMetric::L1 => manhattan_distance(x, y),
            DistanceMetric::Cosine => cosine_distance(x, y),
            DistanceMetric::KlDivergence => kl_divergence(x, y),
        }
    }
}

/// Compute Euclidean (L2) distance between two buffers
pub fn euclidean_distance(x: &[f32], y: &[f32]) -> f32 {
    x.iter()
        .zip(y.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Compute Manhattan (L1) distance between two buffers
pub fn manhattan_distance(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y.iter()).map(|(a, b)| (a - b).abs()).sum()
}

/// Compute cosine distance (1 - cosine similarity).
///
/// A zero buffer has no direction; it is treated as orthogonal to everything.
pub fn cosine_distance(x: &[f32], y: &[f32]) -> f32 {
    let norm_x = dot_product(x, x).sqrt();
    let norm_y = dot_product(y, y).sqrt();
    if norm_x == 0.0 || norm_y == 0.0 {
        return 1.0;
    }

    // Clamp to [-1, 1] to handle floating point errors
    let similarity = (dot_product(x, y) / (norm_x * norm_y)).clamp(-1.0, 1.0);
    (1.0 - similarity).max(0.0)
}

/// Compute the KL divergence KL(x || y) = sum x_i * ln(x_i / y_i).
pub fn kl_divergence(x: &[f32], y: &[f32]) -> f32 {
    x.iter()
        .zip(y.iter())
        .map(|(&a, &b)| a * (a / b).ln())
        .sum::<f32>()
        .max(0.0)
}

/// Compute dot product of two buffers
pub fn dot_product(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}
