//! Detector selection
//!
//! Both change detectors sit behind [`ChangeMagnitudeProvider`] so the
//! pipeline can run either one. Only IRMAD yields a continuous magnitude
//! that a threshold can be tuned on.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::block_pca::{block_pca_pair, BlockPcaParams, BLOCK_SIZE};
use super::irmad::{binary_change_raster, irmad_pair, ChangeMapParams, IrmadParams};
use altermap_core::raster::{mask_from_255, BinaryMask, Raster, RasterPair};
use altermap_core::Result;

/// Output of a change detector over a full raster pair
#[derive(Debug, Clone)]
pub struct ChangeDetection {
    /// Change strength per pixel, when the detector has one
    pub magnitude: Option<Raster<f64>>,
    /// {0, 1} change mask on the input grid
    pub mask: BinaryMask,
}

/// Anything that turns a raster pair into a change mask, and possibly a magnitude
pub trait ChangeMagnitudeProvider {
    /// Short detector name for logs
    fn name(&self) -> &'static str;

    /// Run detection on the pair
    fn detect(&self, pair: &RasterPair) -> Result<ChangeDetection>;
}

/// The available change detectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ChangeDetector {
    /// IRMAD chi-square magnitude split by 2-means
    Irmad {
        #[serde(default)]
        irmad: IrmadParams,
        #[serde(default)]
        change_map: ChangeMapParams,
    },
    /// Block PCA + 3-means on the band-mean difference image
    BlockPcaKmeans {
        #[serde(default)]
        params: BlockPcaParams,
    },
}

impl Default for ChangeDetector {
    fn default() -> Self {
        ChangeDetector::Irmad {
            irmad: IrmadParams::default(),
            change_map: ChangeMapParams::default(),
        }
    }
}

impl ChangeDetector {
    /// Whether [`ChangeMagnitudeProvider::detect`] returns a magnitude
    pub fn has_magnitude(&self) -> bool {
        matches!(self, ChangeDetector::Irmad { .. })
    }
}

impl ChangeMagnitudeProvider for ChangeDetector {
    fn name(&self) -> &'static str {
        match self {
            ChangeDetector::Irmad { .. } => "irmad",
            ChangeDetector::BlockPcaKmeans { .. } => "block_pca_kmeans",
        }
    }

    fn detect(&self, pair: &RasterPair) -> Result<ChangeDetection> {
        match self {
            ChangeDetector::Irmad { irmad, change_map } => {
                let (result, magnitude) = irmad_pair(pair, irmad)?;
                debug!(
                    iterations = result.iterations,
                    converged = result.converged,
                    "IRMAD magnitude ready"
                );
                let mask = binary_change_raster(&magnitude, change_map)?;
                Ok(ChangeDetection {
                    magnitude: Some(magnitude),
                    mask,
                })
            }
            ChangeDetector::BlockPcaKmeans { params } => {
                let result = block_pca_pair(pair, params)?;
                let (rows, cols) = pair.shape();
                let mask = place_window_map(&mask_from_255(&result.cleaned), rows, cols);
                Ok(ChangeDetection {
                    magnitude: None,
                    mask,
                })
            }
        }
    }
}

/// Put a window-center map back on the full `rows x cols` grid.
///
/// Map cell `(r, c)` describes the 5x5 window centered on pixel `(r + 2, c + 2)`.
/// Pixels without a full window, and any rows or columns dropped by cropping,
/// are unchanged.
fn place_window_map(map: &BinaryMask, rows: usize, cols: usize) -> BinaryMask {
    let offset = BLOCK_SIZE / 2;
    let mut full = Raster::new(rows, cols);
    for ((r, c), &value) in map.data().indexed_iter() {
        let (fr, fc) = (r + offset, c + offset);
        if value != 0 && fr < rows && fc < cols {
            full.data_mut()[(fr, fc)] = value;
        }
    }
    full
}
