//! Change detection between two co-registered observations
//!
//! - IRMAD: multivariate alteration detection with chi-square change magnitude
//! - Block PCA + k-means: unsupervised change map from the difference image
//! - Transition discrimination: which class became which

mod block_pca;
mod detector;
mod irmad;
mod transition;

pub use block_pca::{
    absolute_difference, block_pca_kmeans, block_pca_pair, rescale_to_levels,
    BlockPcaKmeans, BlockPcaParams, BlockPcaResult, BLOCK_SIZE, CHANGED, CLUSTERS,
};
pub use detector::{ChangeDetection, ChangeDetector, ChangeMagnitudeProvider};
pub use irmad::{
    binary_change_map, binary_change_raster, irmad, irmad_pair, ChangeMapParams, Irmad,
    IrmadParams, IrmadResult,
};
pub use transition::{
    decode_transition, discriminate, encode_transition, transition_cosine, transition_summary,
    COSINE_UNDEFINED, MAX_CLASSES, NO_TRANSITION,
};
