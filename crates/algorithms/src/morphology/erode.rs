//! Morphological erosion of masks (minimum filter)
//!
//! Replaces each cell with the minimum value in its structuring element
//! neighborhood. Shrinks foreground regions and removes isolated specks.

use ndarray::Array2;
use crate::maybe_rayon::*;
use altermap_core::raster::Raster;
use altermap_core::{Error, Result};

use super::element::StructuringElement;

/// Erode a mask with the given structuring element.
///
/// Neighbors that fall outside the raster are ignored, so the image border
/// does not eat into foreground regions that touch it.
pub fn erode(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    element.validate()?;

    let (rows, cols) = mask.shape();
    let offsets = element.offsets();
    let data = mask.data();

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let mut min_val = u8::MAX;
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    min_val = min_val.min(data[(nr as usize, nc as usize)]);
                    if min_val == 0 {
                        break;
                    }
                }
                *out = min_val;
            }

            row_data
        })
        .collect();

    let output = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(Raster::from_array(output))
}
