//! Block PCA + k-means change detection
//!
//! The absolute difference of two single-band images is rescaled to 8-bit
//! levels and cut into non-overlapping 5x5 blocks. PCA on those blocks gives
//! an eigenvector basis; every 5x5 neighbourhood of the difference image is
//! projected onto it and the resulting feature vectors are split into three
//! clusters. Change is assumed rare, so the smallest cluster is "changed".
//!
//! Reference: Celik, T. (2009). Unsupervised change detection in satellite
//! images using principal component analysis and k-means clustering.
//! IEEE Geoscience and Remote Sensing Letters, 6(4), 772-776.

use ndarray::{s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classification::{kmeans, pca, KmeansParams, PcaParams};
use crate::maybe_rayon::*;
use crate::morphology::{erode, StructuringElement};
use altermap_core::raster::{Raster, RasterPair};
use altermap_core::{Algorithm, Error, Result};

/// Side of the square blocks and windows
pub const BLOCK_SIZE: usize = 5;

/// Number of k-means clusters
pub const CLUSTERS: usize = 3;

/// Foreground value of the block-PCA change maps
pub const CHANGED: u8 = 255;

/// Parameters for block PCA change detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockPcaParams {
    /// Seed for the k-means++ initialisation
    pub seed: u64,
    /// Maximum k-means iterations
    pub max_iterations: usize,
}

impl Default for BlockPcaParams {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iterations: 300,
        }
    }
}

/// Change maps produced by [`block_pca_kmeans`], both `(H - 4) x (W - 4)`
/// for the cropped input size `H x W`, with values {0, 255}.
#[derive(Debug, Clone)]
pub struct BlockPcaResult {
    /// Minority cluster as found by k-means
    pub raw: Raster<u8>,
    /// `raw` eroded with the 5x5 diamond
    pub cleaned: Raster<u8>,
}

/// Block PCA + k-means over a single-band image pair
#[derive(Debug, Clone, Default)]
pub struct BlockPcaKmeans;

impl Algorithm for BlockPcaKmeans {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = BlockPcaResult;
    type Params = BlockPcaParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BlockPcaKmeans"
    }

    fn description(&self) -> &'static str {
        "Block PCA feature extraction with 3-means clustering of the difference image"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (a, b) = input;
        block_pca_kmeans(&a, &b, &params)
    }
}

/// Absolute per-pixel difference `|after - before|`; NaN where either input is NaN.
pub fn absolute_difference(before: &Raster<f64>, after: &Raster<f64>) -> Result<Raster<f64>> {
    before.ensure_same_shape(after)?;
    let (rows, cols) = before.shape();

    let diff: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = Vec::with_capacity(cols);
            for col in 0..cols {
                let b = unsafe { before.get_unchecked(row, col) };
                let a = unsafe { after.get_unchecked(row, col) };
                out.push(if a.is_nan() || b.is_nan() { f64::NAN } else { (a - b).abs() });
            }
            out
        })
        .collect();

    Raster::from_vec(diff, rows, cols)
}

/// Linearly rescale to [0, 255] and truncate to integer levels.
/// A constant image maps to all zeros.
pub fn rescale_to_levels(image: &Raster<f64>) -> Result<Raster<f64>> {
    if image.data().iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFiniteInput { what: "difference image" });
    }

    let (min, max) = image
        .data()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !(range > 0.0) {
        return Ok(image.map(|_| 0.0));
    }

    Ok(image.map(|v| ((v - min) / range * 255.0).floor()))
}

/// Block PCA + k-means on a multi-band pair, reduced to one band per date by
/// the per-pixel band mean.
pub fn block_pca_pair(pair: &RasterPair, params: &BlockPcaParams) -> Result<BlockPcaResult> {
    let a = pair.t1().band_mean();
    let b = pair.t2().band_mean();
    block_pca_kmeans(&a, &b, params)
}

/// Detect change between two single-band images.
///
/// Both images are cropped (never padded) to the largest multiple of 5 in
/// each dimension. Output maps hold 255 for changed pixels.
///
/// # Errors
/// - [`Error::SizeMismatch`] if the images differ in shape
/// - [`Error::ImageTooSmall`] if the cropped images are under 5x5
/// - [`Error::DegenerateClustering`] if the feature vectors cannot fill
///   three clusters
pub fn block_pca_kmeans(
    image_a: &Raster<f64>,
    image_b: &Raster<f64>,
    params: &BlockPcaParams,
) -> Result<BlockPcaResult> {
    image_a.ensure_same_shape(image_b)?;
    let (rows, cols) = image_a.shape();
    let crop_rows = rows / BLOCK_SIZE * BLOCK_SIZE;
    let crop_cols = cols / BLOCK_SIZE * BLOCK_SIZE;
    if crop_rows < BLOCK_SIZE || crop_cols < BLOCK_SIZE {
        return Err(Error::ImageTooSmall {
            rows,
            cols,
            min: BLOCK_SIZE,
        });
    }

    let a = image_a.crop(crop_rows, crop_cols)?;
    let b = image_b.crop(crop_rows, crop_cols)?;
    let diff = rescale_to_levels(&absolute_difference(&a, &b)?)?;
    debug!(rows = crop_rows, cols = crop_cols, "block PCA difference image ready");

    let blocks = block_vectors(diff.view());
    let mean_vec = blocks
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::Algorithm("no blocks in difference image".into()))?;
    let centered = &blocks - &mean_vec;
    let model = pca(centered.view(), PcaParams::default())?;

    let windows = window_vectors(diff.view())?;
    let fvs = model.project(windows.view()) - &mean_vec;

    let out_rows = crop_rows - (BLOCK_SIZE - 1);
    let out_cols = crop_cols - (BLOCK_SIZE - 1);
    debug!(
        blocks = blocks.nrows(),
        features = fvs.nrows(),
        "block PCA feature vectors extracted"
    );

    let clusters = kmeans(
        fvs.view(),
        &KmeansParams {
            k: CLUSTERS,
            max_iterations: params.max_iterations,
            seed: params.seed,
            ..Default::default()
        },
    )?;
    if let Some(&empty) = clusters.empty_clusters().first() {
        return Err(Error::DegenerateClustering(format!(
            "cluster {} of {} is empty",
            empty, CLUSTERS
        )));
    }

    let changed = clusters.smallest_cluster();
    debug!(changed, counts = ?clusters.counts, "block PCA minority cluster");

    let raw_data: Vec<u8> = clusters
        .labels
        .iter()
        .map(|&l| if l == changed { CHANGED } else { 0 })
        .collect();
    let raw = Raster::from_vec(raw_data, out_rows, out_cols)?;
    let cleaned = erode(&raw, &StructuringElement::change_map_cleanup())?;

    Ok(BlockPcaResult { raw, cleaned })
}

/// Non-overlapping 5x5 blocks in row-major order, each flattened row-major
fn block_vectors(diff: ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = diff.dim();
    let (block_rows, block_cols) = (rows / BLOCK_SIZE, cols / BLOCK_SIZE);
    let features = BLOCK_SIZE * BLOCK_SIZE;

    Array2::from_shape_fn((block_rows * block_cols, features), |(i, f)| {
        let (br, bc) = (i / block_cols, i % block_cols);
        let (dr, dc) = (f / BLOCK_SIZE, f % BLOCK_SIZE);
        diff[(br * BLOCK_SIZE + dr, bc * BLOCK_SIZE + dc)]
    })
}

/// Every full 5x5 window (stride 1), flattened row-major, windows in
/// row-major order of their centers
fn window_vectors(diff: ArrayView2<f64>) -> Result<Array2<f64>> {
    let (rows, cols) = diff.dim();
    let out_rows = rows + 1 - BLOCK_SIZE;
    let out_cols = cols + 1 - BLOCK_SIZE;
    let features = BLOCK_SIZE * BLOCK_SIZE;

    let data: Vec<f64> = (0..out_rows)
        .into_par_iter()
        .flat_map(|r| {
            let mut row_data = Vec::with_capacity(out_cols * features);
            for c in 0..out_cols {
                let window = diff.slice(s![r..r + BLOCK_SIZE, c..c + BLOCK_SIZE]);
                row_data.extend(window.iter().copied());
            }
            row_data
        })
        .collect();

    Array2::from_shape_vec((out_rows * out_cols, features), data)
        .map_err(|e| Error::Other(e.to_string()))
}
