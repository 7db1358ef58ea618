//! Mathematical morphology for change masks
//!
//! - **Erosion**: minimum filter (shrinks foreground, removes specks)
//! - **Labeling**: 4- or 8-connected component labeling
//! - **Small object removal**: drops components below a pixel count

mod element;
mod erode;
mod label;
mod small_objects;

pub use element::StructuringElement;
pub use erode::erode;
pub use label::{label_components, ComponentLabels, Connectivity};
pub use small_objects::{remove_small_objects, RemoveSmallObjects, SmallObjectParams};
