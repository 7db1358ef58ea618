//! Raster data structures

mod element;
mod grid;
mod mask;
mod neighborhood;
mod stack;

pub use element::RasterElement;
pub use grid::{Raster, RasterStatistics};
pub use mask::{mask_from_255, mask_to_255, BinaryMask};
pub use neighborhood::Neighborhood;
pub use stack::{RasterPair, RasterStack};
