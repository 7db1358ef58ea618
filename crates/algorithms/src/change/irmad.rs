//! Iteratively Reweighted Multivariate Alteration Detection (IRMAD)
//!
//! Canonical correlation analysis between the t1 and t2 band stacks gives
//! pairs of maximally correlated linear combinations. Their differences
//! (MAD variates) isolate change; the variance-normalized sum of squares is
//! chi-square distributed under no change. Pixels are reweighted by their
//! no-change probability and the analysis is repeated until the canonical
//! correlations settle.

use nalgebra::{Cholesky, DMatrix, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classification::{kmeans, KmeansParams};
use crate::maybe_rayon::*;
use crate::statistics::chi_square_sf;
use altermap_core::raster::{BinaryMask, Raster, RasterPair};
use altermap_core::{Algorithm, Error, Result};

/// Bands whose variance is below this fraction of the largest band
/// variance make the covariance matrix singular
const RELATIVE_VARIANCE_FLOOR: f64 = 1e-12;

/// Floor on `2 (1 - rho)` so identical inputs do not divide by zero
const MIN_MAD_VARIANCE: f64 = 1e-6;

/// Square-root chi-square values spanning less than this carry no change signal
const MIN_CONTRAST: f64 = 1e-6;

/// Parameters for IRMAD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrmadParams {
    /// Maximum number of reweighting iterations (1 = plain MAD)
    pub max_iterations: usize,
    /// Stop when no canonical correlation moves more than this
    pub epsilon: f64,
}

impl Default for IrmadParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            epsilon: 1e-3,
        }
    }
}

/// Output of IRMAD; variates and distances are per flattened pixel
#[derive(Debug, Clone)]
pub struct IrmadResult {
    /// MAD variates, one row per canonical pair (`pairs x N`)
    pub mad_variates: Array2<f64>,
    /// Canonical correlations, ascending
    pub canonical_correlations: Array1<f64>,
    /// Variance of each MAD variate, `2 (1 - rho)`
    pub mad_variances: Array1<f64>,
    /// t1-side canonical vectors, one column per pair (`bandsX x pairs`)
    pub eigvec_x: Array2<f64>,
    /// t2-side canonical vectors, one column per pair (`bandsY x pairs`)
    pub eigvec_y: Array2<f64>,
    /// Weighted covariance of the t1 bands
    pub sigma_11: Array2<f64>,
    /// Weighted covariance of the t2 bands
    pub sigma_22: Array2<f64>,
    /// Weighted cross-covariance t1 x t2
    pub sigma_12: Array2<f64>,
    /// Chi-square distance per pixel
    pub chi_square: Array1<f64>,
    /// No-change probability per pixel from the final chi-square distances
    pub weights: Array1<f64>,
    /// Iterations run
    pub iterations: usize,
    /// Whether the correlations settled within `epsilon`
    pub converged: bool,
}

impl IrmadResult {
    /// Degrees of freedom used for the no-change probability: the t1 band count
    pub fn degrees_of_freedom(&self) -> usize {
        self.eigvec_x.nrows()
    }
}

/// IRMAD algorithm over a [`RasterPair`]
#[derive(Debug, Clone, Default)]
pub struct Irmad;

impl Algorithm for Irmad {
    type Input = RasterPair;
    type Output = (IrmadResult, Raster<f64>);
    type Params = IrmadParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "IRMAD"
    }

    fn description(&self) -> &'static str {
        "Iteratively reweighted multivariate alteration detection"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        irmad_pair(&input, &params)
    }
}

/// Run IRMAD on a raster pair; also returns the chi-square distance as a
/// magnitude raster shaped like the inputs.
pub fn irmad_pair(pair: &RasterPair, params: &IrmadParams) -> Result<(IrmadResult, Raster<f64>)> {
    let (rows, cols) = pair.shape();
    let x = pair.t1().flatten()?;
    let y = pair.t2().flatten()?;
    let result = irmad(x.view(), y.view(), params)?;
    let magnitude = Raster::from_vec(result.chi_square.to_vec(), rows, cols)?;
    Ok((result, magnitude))
}

/// Run IRMAD on flattened band stacks `x` (`bandsX x N`) and `y` (`bandsY x N`).
///
/// There are `min(bandsX, bandsY)` canonical pairs. Pixel weights are the
/// chi-square survival function of the distance with `bandsX` degrees of
/// freedom, whatever the t2 band count.
///
/// # Errors
/// - [`Error::PixelCountMismatch`] or [`Error::EmptyInput`] for unusable stacks
/// - [`Error::NonFiniteInput`] if any band value is NaN or infinite
/// - `max_iterations == 0` or `epsilon <= 0`
/// - [`Error::SingularCovariance`] when a band has (near-)zero variance or the
///   band covariance is not positive definite
///
/// Running out of iterations is not an error: a warning is logged and the
/// last iteration's values are returned with `converged == false`.
pub fn irmad(x: ArrayView2<f64>, y: ArrayView2<f64>, params: &IrmadParams) -> Result<IrmadResult> {
    let (bands_x, n) = x.dim();
    let (bands_y, n_y) = y.dim();

    if n != n_y {
        return Err(Error::PixelCountMismatch {
            expected: n,
            actual: n_y,
        });
    }
    if n == 0 {
        return Err(Error::EmptyInput { what: "IRMAD pixels" });
    }
    if bands_x == 0 || bands_y == 0 {
        return Err(Error::EmptyInput { what: "IRMAD bands" });
    }
    if params.max_iterations == 0 {
        return Err(Error::InvalidParameter {
            name: "max_iterations",
            value: "0".to_string(),
            reason: "IRMAD needs at least one iteration".to_string(),
        });
    }
    if !(params.epsilon > 0.0) {
        return Err(Error::InvalidParameter {
            name: "epsilon",
            value: params.epsilon.to_string(),
            reason: "convergence tolerance must be positive".to_string(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::NonFiniteInput { what: "IRMAD input bands" });
    }

    let mut weights = Array1::<f64>::ones(n);
    let mut previous: Option<Array1<f64>> = None;
    let mut iterations = 0;
    let mut converged = false;

    let mut state = loop {
        iterations += 1;
        let state = irmad_iteration(x, y, weights.view())?;
        debug!(
            iteration = iterations,
            correlations = ?state.rho.to_vec(),
            "IRMAD canonical correlations"
        );

        let delta = previous
            .as_ref()
            .map(|prev| max_abs_diff(prev.view(), state.rho.view()))
            .unwrap_or(f64::INFINITY);
        if delta < params.epsilon {
            converged = true;
            break state;
        }
        if iterations >= params.max_iterations {
            break state;
        }

        weights = no_change_probability(state.chi_square.view(), bands_x);
        previous = Some(state.rho.clone());
    };

    if converged {
        debug!(iterations, "IRMAD converged");
    } else {
        warn!(
            iterations,
            epsilon = params.epsilon,
            "IRMAD canonical correlations did not converge; returning last iteration"
        );
    }

    let final_weights = no_change_probability(state.chi_square.view(), bands_x);
    state.mad_variances.mapv_inplace(|v| v.max(MIN_MAD_VARIANCE));

    Ok(IrmadResult {
        mad_variates: state.mad,
        canonical_correlations: state.rho,
        mad_variances: state.mad_variances,
        eigvec_x: state.eigvec_x,
        eigvec_y: state.eigvec_y,
        sigma_11: state.sigma_11,
        sigma_22: state.sigma_22,
        sigma_12: state.sigma_12,
        chi_square: state.chi_square,
        weights: final_weights,
        iterations,
        converged,
    })
}

/// Everything one weighted CCA pass produces
struct IterationState {
    rho: Array1<f64>,
    mad: Array2<f64>,
    mad_variances: Array1<f64>,
    eigvec_x: Array2<f64>,
    eigvec_y: Array2<f64>,
    sigma_11: Array2<f64>,
    sigma_22: Array2<f64>,
    sigma_12: Array2<f64>,
    chi_square: Array1<f64>,
}

fn irmad_iteration(x: ArrayView2<f64>, y: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<IterationState> {
    let weight_sum = weights.sum();
    if !(weight_sum > 0.0) {
        return Err(Error::Algorithm(
            "IRMAD weights vanished: every pixel looks changed".into(),
        ));
    }

    let center_x = center_weighted(x, weights, weight_sum);
    let center_y = center_weighted(y, weights, weight_sum);

    let sigma_11 = weighted_cross_covariance(center_x.view(), center_x.view(), weights, weight_sum);
    let sigma_22 = weighted_cross_covariance(center_y.view(), center_y.view(), weights, weight_sum);
    let sigma_12 = weighted_cross_covariance(center_x.view(), center_y.view(), weights, weight_sum);

    let s11 = to_dmatrix(&sigma_11);
    let s22 = to_dmatrix(&sigma_22);
    let s12 = to_dmatrix(&sigma_12);

    let chol_11 = checked_cholesky(&s11, "sigma_11")?;
    let chol_22 = checked_cholesky(&s22, "sigma_22")?;

    // Solve the smaller side; the other side follows from the cross-covariance
    let (rho, a, b) = if s11.nrows() <= s22.nrows() {
        canonical_pairs(&chol_11, &chol_22, &s11, &s22, &s12)?
    } else {
        let s21 = s12.transpose();
        let (rho, b, a) = canonical_pairs(&chol_22, &chol_11, &s22, &s11, &s21)?;
        (rho, a, b)
    };

    let eigvec_x = from_dmatrix(&a);
    let eigvec_y = from_dmatrix(&b);

    let mad = eigvec_x.t().dot(&center_x) - eigvec_y.t().dot(&center_y);
    let mad_variances = rho.mapv(|r| 2.0 * (1.0 - r));
    let chi_square = chi_square_distance(mad.view(), mad_variances.view());

    Ok(IterationState {
        rho,
        mad,
        mad_variances,
        eigvec_x,
        eigvec_y,
        sigma_11,
        sigma_22,
        sigma_12,
        chi_square,
    })
}

/// Canonical correlations (ascending) with unit-variance canonical vectors.
///
/// Solves `S11^-1 S12 S22^-1 S21 a = rho^2 a` through the symmetric form
/// `L^-1 S12 S22^-1 S21 L^-T u = rho^2 u` with `S11 = L L^T`, `a = L^-T u`.
fn canonical_pairs(
    chol_11: &Cholesky<f64, Dyn>,
    chol_22: &Cholesky<f64, Dyn>,
    s11: &DMatrix<f64>,
    s22: &DMatrix<f64>,
    s12: &DMatrix<f64>,
) -> Result<(Array1<f64>, DMatrix<f64>, DMatrix<f64>)> {
    let s21 = s12.transpose();
    let l = chol_11.l();
    let l_inv = l
        .clone()
        .try_inverse()
        .ok_or_else(|| singular("sigma_11", "Cholesky factor is not invertible"))?;

    // S22^-1 S21
    let s22_inv_s21 = chol_22.solve(&s21);
    let target = &l_inv * s12 * &s22_inv_s21 * l_inv.transpose();
    // Symmetrize against rounding before the symmetric solver
    let target = (&target + target.transpose()) * 0.5;

    let eigen = target.symmetric_eigen();
    let p = s11.nrows();

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&i, &j| {
        eigen.eigenvalues[i]
            .partial_cmp(&eigen.eigenvalues[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut rho = Array1::<f64>::zeros(p);
    let mut u = DMatrix::<f64>::zeros(p, p);
    for (col, &idx) in order.iter().enumerate() {
        rho[col] = eigen.eigenvalues[idx].clamp(0.0, 1.0).sqrt();
        u.set_column(col, &eigen.eigenvectors.column(idx));
    }

    let mut a = l_inv.transpose() * u;
    let mut b = &s22_inv_s21 * &a;
    normalize_columns(&mut a, s11);
    normalize_columns(&mut b, s22);

    Ok((rho, a, b))
}

/// Scale each column `v` so that `v^T S v = 1`
fn normalize_columns(vectors: &mut DMatrix<f64>, sigma: &DMatrix<f64>) {
    for mut column in vectors.column_iter_mut() {
        let v = column.clone_owned();
        let variance = v.dot(&(sigma * &v));
        if variance > 0.0 {
            column /= variance.sqrt();
        }
    }
}

fn checked_cholesky(sigma: &DMatrix<f64>, which: &'static str) -> Result<Cholesky<f64, Dyn>> {
    let diag = sigma.diagonal();
    let max_var = diag.iter().cloned().fold(0.0_f64, f64::max);
    if !(max_var > 0.0) {
        return Err(singular(which, "all bands have zero variance"));
    }
    if let Some((band, var)) = diag
        .iter()
        .enumerate()
        .find(|&(_, &v)| v <= max_var * RELATIVE_VARIANCE_FLOOR)
    {
        return Err(singular(
            which,
            &format!("band {} has near-zero variance ({:e})", band, var),
        ));
    }

    let chol = Cholesky::new(sigma.clone())
        .ok_or_else(|| singular(which, "matrix is not positive definite (collinear bands?)"))?;
    // Rounding can leave a tiny positive pivot for exactly collinear bands
    if chol
        .l()
        .diagonal()
        .iter()
        .any(|&d| d * d <= max_var * RELATIVE_VARIANCE_FLOOR)
    {
        return Err(singular(which, "bands are collinear"));
    }
    Ok(chol)
}

fn singular(which: &'static str, reason: &str) -> Error {
    Error::SingularCovariance {
        which,
        reason: reason.to_string(),
    }
}

/// Subtract the weighted per-band mean
fn center_weighted(data: ArrayView2<f64>, weights: ArrayView1<f64>, weight_sum: f64) -> Array2<f64> {
    let mean = data.dot(&weights) / weight_sum;
    let mean = mean.insert_axis(Axis(1));
    &data - &mean
}

/// `sum_i w_i a_i b_i^T / sum_i w_i` for centered band stacks
fn weighted_cross_covariance(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    weights: ArrayView1<f64>,
    weight_sum: f64,
) -> Array2<f64> {
    let weighted = &a * &weights.insert_axis(Axis(0));
    weighted.dot(&b.t()) / weight_sum
}

/// Per pixel `sum_k mad_k^2 / var_k`
fn chi_square_distance(mad: ArrayView2<f64>, variances: ArrayView1<f64>) -> Array1<f64> {
    let inv_var: Vec<f64> = variances.iter().map(|v| 1.0 / v.max(MIN_MAD_VARIANCE)).collect();
    let chi: Vec<f64> = (0..mad.ncols())
        .into_par_iter()
        .map(|i| {
            mad.column(i)
                .iter()
                .zip(&inv_var)
                .map(|(m, iv)| m * m * iv)
                .sum::<f64>()
        })
        .collect();
    Array1::from(chi)
}

/// `1 - CDF_chi2(chi_square, df)` per pixel
fn no_change_probability(chi_square: ArrayView1<f64>, df: usize) -> Array1<f64> {
    let values: Vec<f64> = chi_square
        .to_vec()
        .into_par_iter()
        .map(|c| chi_square_sf(c, df))
        .collect();
    Array1::from(values)
}

fn max_abs_diff(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

// ---------------------------------------------------------------------------
// Binary change map
// ---------------------------------------------------------------------------

/// Parameters for splitting chi-square distances into changed / unchanged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeMapParams {
    /// Seed for the 2-means initialisation
    pub seed: u64,
    /// Maximum k-means iterations
    pub max_iterations: usize,
}

impl Default for ChangeMapParams {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iterations: 1500,
        }
    }
}

/// Split pixels into changed (1) and unchanged (0) by 2-means on
/// `sqrt(chi_square)`; the cluster with the larger centroid is "changed".
///
/// When the distances show no contrast at all every pixel is unchanged.
pub fn binary_change_map(chi_square: ArrayView1<f64>, params: &ChangeMapParams) -> Result<Array1<u8>> {
    let distances: Vec<f64> = chi_square.iter().map(|c| c.max(0.0).sqrt()).collect();
    if distances.iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFiniteInput { what: "chi-square distances" });
    }

    let (min, max) = distances
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if distances.is_empty() || max - min < MIN_CONTRAST {
        warn!(
            pixels = distances.len(),
            "chi-square distances show no contrast; marking every pixel unchanged"
        );
        return Ok(Array1::zeros(distances.len()));
    }

    let samples = Array2::from_shape_vec((distances.len(), 1), distances)
        .map_err(|e| Error::Other(e.to_string()))?;
    let clusters = kmeans(
        samples.view(),
        &KmeansParams {
            k: 2,
            max_iterations: params.max_iterations,
            seed: params.seed,
            ..Default::default()
        },
    )?;

    if let Some(&empty) = clusters.empty_clusters().first() {
        return Err(Error::DegenerateClustering(format!(
            "2-means left cluster {} empty",
            empty
        )));
    }

    let changed = if clusters.centroids[[0, 0]] > clusters.centroids[[1, 0]] { 0 } else { 1 };
    Ok(clusters.labels.iter().map(|&l| u8::from(l == changed)).collect())
}

/// [`binary_change_map`] reshaped to a magnitude raster's grid
pub fn binary_change_raster(magnitude: &Raster<f64>, params: &ChangeMapParams) -> Result<BinaryMask> {
    let (rows, cols) = magnitude.shape();
    let flat = Array1::from(magnitude.to_vec());
    let mask = binary_change_map(flat.view(), params)?;
    Raster::from_vec(mask.to_vec(), rows, cols)
}
