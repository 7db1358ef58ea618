//! # Altermap Algorithms
//!
//! Change detection between two co-registered multi-band observations.
//!
//! ## Available Algorithm Categories
//!
//! - **change**: IRMAD, block PCA + k-means, change type discrimination
//! - **threshold**: Lk metric and coarse-to-fine threshold search
//! - **morphology**: erosion, connected components, small object removal
//! - **classification**: k-means and PCA building blocks
//! - **statistics**: chi-square distribution, accuracy assessment
//! - **pipeline**: configurable end-to-end runs, single scene or batch

mod maybe_rayon;

pub mod change;
pub mod classification;
pub mod morphology;
pub mod pipeline;
pub mod statistics;
pub mod threshold;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{
        binary_change_map, block_pca_kmeans, discriminate, irmad, irmad_pair, transition_summary,
        BlockPcaParams, ChangeDetector, ChangeMagnitudeProvider, ChangeMapParams, IrmadParams,
        IrmadResult, COSINE_UNDEFINED,
    };
    pub use crate::morphology::{label_components, remove_small_objects, Connectivity};
    pub use crate::pipeline::{run_batch, run_pipeline, PipelineConfig, PipelineInput, PipelineOutput};
    pub use crate::statistics::{evaluate_binary, BinaryMetrics};
    pub use crate::threshold::{compute_lk, optimize_threshold, ThresholdParams, ThresholdResult, LK_UNDEFINED};
    pub use altermap_core::prelude::*;
}
