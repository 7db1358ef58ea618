//! Principal Component Analysis over feature vectors
//!
//! Builds the covariance matrix of the sample rows, then extracts
//! eigenvalues/eigenvectors with nalgebra's symmetric eigen-solver.
//! Components are returned sorted by explained variance, largest first.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use altermap_core::{Error, Result};

/// Parameters for PCA
#[derive(Debug, Clone, Default)]
pub struct PcaParams {
    /// Number of principal components to keep (default: all)
    pub n_components: Option<usize>,
}

/// Fitted PCA model
#[derive(Debug, Clone)]
pub struct PcaModel {
    /// Per-feature mean of the fitted samples
    pub mean: Array1<f64>,
    /// Principal axes, one row per component
    pub components: Array2<f64>,
    /// Eigenvalues (variance explained by each component)
    pub eigenvalues: Vec<f64>,
    /// Proportion of variance explained by each component
    pub variance_explained: Vec<f64>,
}

impl PcaModel {
    /// Coordinates of `samples` on the principal axes, without re-centering
    pub fn project(&self, samples: ArrayView2<f64>) -> Array2<f64> {
        samples.dot(&self.components.t())
    }

    /// Center `samples` by the fitted mean, then project
    pub fn transform(&self, samples: ArrayView2<f64>) -> Array2<f64> {
        let centered = &samples - &self.mean;
        centered.dot(&self.components.t())
    }
}

/// Fit PCA on the rows of `samples` (n_samples x n_features).
pub fn pca(samples: ArrayView2<f64>, params: PcaParams) -> Result<PcaModel> {
    let (n_samples, n_features) = samples.dim();
    if n_features == 0 {
        return Err(Error::Algorithm("PCA requires at least 1 feature".into()));
    }
    if n_samples == 0 {
        return Err(Error::Algorithm("PCA requires at least 1 sample".into()));
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return Err(Error::Algorithm("PCA input contains non-finite values".into()));
    }

    let mean = samples
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::Algorithm("PCA mean of empty input".into()))?;
    let centered = &samples - &mean;

    // Sample covariance (n - 1 denominator)
    let denom = (n_samples - 1).max(1) as f64;
    let cov = centered.t().dot(&centered) / denom;

    let sym = DMatrix::from_fn(n_features, n_features, |i, j| cov[[i, j]]);
    let eigen = SymmetricEigen::new(sym);

    // Sort by eigenvalue descending
    let mut indices: Vec<usize> = (0..n_features).collect();
    indices.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n_components = params.n_components.unwrap_or(n_features).clamp(1, n_features);
    let total_var: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();

    let mut components = Array2::<f64>::zeros((n_components, n_features));
    let mut eigenvalues = Vec::with_capacity(n_components);
    for (row, &idx) in indices.iter().take(n_components).enumerate() {
        for f in 0..n_features {
            components[[row, f]] = eigen.eigenvectors[(f, idx)];
        }
        eigenvalues.push(eigen.eigenvalues[idx].max(0.0));
    }

    let variance_explained = eigenvalues
        .iter()
        .map(|ev| if total_var > 0.0 { ev / total_var } else { 0.0 })
        .collect();

    Ok(PcaModel {
        mean,
        components,
        eigenvalues,
        variance_explained,
    })
}
