//! Small object removal
//!
//! Post-processing cleanup that drops connected foreground regions smaller
//! than a pixel count. The result depends only on component membership and
//! size, never on the order labels were assigned in.

use altermap_core::raster::Raster;
use altermap_core::{Algorithm, Error, Result};

use super::label::{label_components, Connectivity};

/// Parameters for small object removal
#[derive(Debug, Clone)]
pub struct SmallObjectParams {
    /// Components with fewer pixels than this are removed
    pub min_size: usize,
    /// Adjacency used to form components
    pub connectivity: Connectivity,
}

impl Default for SmallObjectParams {
    fn default() -> Self {
        Self {
            min_size: 10,
            connectivity: Connectivity::Eight,
        }
    }
}

/// Small object removal algorithm
#[derive(Debug, Clone, Default)]
pub struct RemoveSmallObjects;

impl Algorithm for RemoveSmallObjects {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = SmallObjectParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RemoveSmallObjects"
    }

    fn description(&self) -> &'static str {
        "Remove connected components smaller than a minimum pixel count"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        Ok(remove_small_objects(&input, params.min_size, params.connectivity))
    }
}

/// Zero every foreground pixel whose component has fewer than `min_size`
/// pixels. Surviving pixels keep their original value.
pub fn remove_small_objects(mask: &Raster<u8>, min_size: usize, connectivity: Connectivity) -> Raster<u8> {
    if min_size <= 1 {
        return mask.clone();
    }

    let components = label_components(mask, connectivity);
    let mut output = mask.clone();
    output
        .data_mut()
        .iter_mut()
        .zip(components.labels.data().iter())
        .filter(|&(_, &label)| label != 0 && components.size_of(label) < min_size)
        .for_each(|(value, _)| *value = 0);

    output
}
