//! Unsupervised learning building blocks
//!
//! - **PCA**: principal axes of feature vectors
//! - **K-means**: seeded clustering of feature vectors

mod kmeans;
mod pca;

pub use kmeans::{kmeans, KmeansParams, KmeansResult};
pub use pca::{pca, PcaModel, PcaParams};
