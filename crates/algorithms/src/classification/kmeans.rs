//! K-means clustering
//!
//! Unsupervised partitioning of feature vectors into k clusters based on
//! Euclidean distance. Centroids are seeded with k-means++ from a fixed
//! seed, so a given input and seed always produce the same partition.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::maybe_rayon::*;
use altermap_core::{Error, Result};

/// Parameters for K-means clustering
#[derive(Debug, Clone)]
pub struct KmeansParams {
    /// Number of clusters
    pub k: usize,
    /// Maximum iterations (default: 300)
    pub max_iterations: usize,
    /// Stop when no centroid moves further than this (default: 1e-4)
    pub convergence: f64,
    /// Seed for k-means++ initialisation
    pub seed: u64,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 2,
            max_iterations: 300,
            convergence: 1e-4,
            seed: 42,
        }
    }
}

/// Outcome of a k-means run
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster index (0..k) per sample, in input order
    pub labels: Vec<usize>,
    /// Centroids, one row per cluster
    pub centroids: Array2<f64>,
    /// Number of samples assigned to each cluster
    pub counts: Vec<usize>,
    /// Iterations run
    pub iterations: usize,
    /// Whether the centroid shift fell below the convergence threshold
    pub converged: bool,
}

impl KmeansResult {
    /// Clusters that ended up with no samples
    pub fn empty_clusters(&self) -> Vec<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Cluster with the fewest members; the lowest index wins ties
    pub fn smallest_cluster(&self) -> usize {
        let mut best = 0;
        for (i, &n) in self.counts.iter().enumerate() {
            if n < self.counts[best] {
                best = i;
            }
        }
        best
    }
}

/// Cluster the rows of `samples` (n_samples x n_features).
///
/// # Errors
/// - `k < 2`, or non-finite sample values
/// - [`Error::DegenerateClustering`] when there are fewer distinct samples
///   than clusters
pub fn kmeans(samples: ArrayView2<f64>, params: &KmeansParams) -> Result<KmeansResult> {
    if params.k < 2 {
        return Err(Error::InvalidParameter {
            name: "k",
            value: params.k.to_string(),
            reason: "K-means requires k >= 2".to_string(),
        });
    }

    let n = samples.nrows();
    if n < params.k {
        return Err(Error::DegenerateClustering(format!(
            "not enough samples ({}) for {} clusters",
            n, params.k
        )));
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return Err(Error::Algorithm("K-means input contains non-finite values".into()));
    }

    let mut centroids = initialize_centroids(samples, params.k, params.seed)?;
    let mut labels = vec![0usize; n];
    let mut iterations = 0;
    let mut converged = false;

    for _iter in 0..params.max_iterations.max(1) {
        iterations += 1;

        // Assignment step: nearest centroid, lowest index on ties
        labels.par_iter_mut().enumerate().for_each(|(i, label)| {
            *label = nearest_centroid(samples.row(i), centroids.view()).0;
        });

        // Update step: recompute centroids
        let mut sums = Array2::<f64>::zeros(centroids.dim());
        let mut counts = vec![0usize; params.k];
        for (i, &k) in labels.iter().enumerate() {
            let mut row = sums.row_mut(k);
            row += &samples.row(i);
            counts[k] += 1;
        }

        let mut max_shift = 0.0_f64;
        for (k, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue; // Keep empty cluster centroid
            }
            let mut row = sums.row_mut(k);
            row /= count as f64;
            let shift = squared_distance(row.view(), centroids.row(k)).sqrt();
            max_shift = max_shift.max(shift);
            centroids.row_mut(k).assign(&row);
        }

        if max_shift < params.convergence {
            converged = true;
            break;
        }
    }

    let mut counts = vec![0usize; params.k];
    for &k in &labels {
        counts[k] += 1;
    }

    debug!(k = params.k, iterations, converged, ?counts, "k-means finished");

    Ok(KmeansResult {
        labels,
        centroids,
        counts,
        iterations,
        converged,
    })
}

/// Index of and squared distance to the closest centroid
pub(crate) fn nearest_centroid(sample: ArrayView1<f64>, centroids: ArrayView2<f64>) -> (usize, f64) {
    let mut best_k = 0;
    let mut best_dist = f64::INFINITY;
    for (k, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        let dist = squared_distance(sample, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_k = k;
        }
    }
    (best_k, best_dist)
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the centroids chosen so far
fn initialize_centroids(samples: ArrayView2<f64>, k: usize, seed: u64) -> Result<Array2<f64>> {
    let n = samples.nrows();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = Array2::<f64>::zeros((k, samples.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&samples.row(first));

    let mut min_dist: Vec<f64> = (0..n)
        .map(|i| squared_distance(samples.row(i), centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = min_dist.iter().sum();
        if total <= 0.0 {
            return Err(Error::DegenerateClustering(format!(
                "only {} distinct feature vectors for {} clusters",
                c, k
            )));
        }

        let target = rng.gen::<f64>() * total;
        let mut acc = 0.0;
        let mut chosen = None;
        for (i, &d) in min_dist.iter().enumerate() {
            acc += d;
            if d > 0.0 && acc >= target {
                chosen = Some(i);
                break;
            }
        }
        // Rounding can leave the target just past the last positive weight
        let chosen = chosen
            .or_else(|| min_dist.iter().rposition(|&d| d > 0.0))
            .ok_or_else(|| Error::DegenerateClustering("no candidate centroid left".into()))?;

        centroids.row_mut(c).assign(&samples.row(chosen));
        for (i, d) in min_dist.iter_mut().enumerate() {
            *d = d.min(squared_distance(samples.row(i), centroids.row(c)));
        }
    }

    Ok(centroids)
}
