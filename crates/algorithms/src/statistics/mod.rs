//! Statistical helpers for change detection
//!
//! - **chi_square**: chi-square CDF used to weight IRMAD iterations
//! - **accuracy**: agreement scores of a change mask against a reference mask

pub mod accuracy;
pub mod chi_square;

pub use accuracy::{evaluate_binary, mean_metrics, BinaryMetrics, ConfusionMatrix, MeanMetrics};
pub use chi_square::{chi_square_cdf, chi_square_sf, ln_gamma, regularized_lower_gamma};
