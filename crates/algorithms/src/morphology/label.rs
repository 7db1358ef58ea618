//! Connected component labeling of binary masks

use serde::{Deserialize, Serialize};
use ndarray::Array2;
use altermap_core::raster::{Neighborhood, Raster};
use altermap_core::{Error, Result};

/// Pixel adjacency used to group foreground cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Connectivity {
    /// Edge-adjacent neighbors only
    Four,
    /// Edge and diagonal neighbors
    #[default]
    Eight,
}

impl Connectivity {
    /// Neighbor offsets, excluding the center cell
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        match self {
            Connectivity::Four => Neighborhood::Rook3x3.offsets_no_center(),
            Connectivity::Eight => Neighborhood::Queen3x3.offsets_no_center(),
        }
    }
}

impl TryFrom<u8> for Connectivity {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(Error::InvalidParameter {
                name: "connectivity",
                value: other.to_string(),
                reason: "connectivity must be 4 or 8".to_string(),
            }),
        }
    }
}

impl From<Connectivity> for u8 {
    fn from(value: Connectivity) -> Self {
        match value {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

/// Labeled components of a mask
#[derive(Debug, Clone)]
pub struct ComponentLabels {
    /// 0 for background, 1..=count for components (raster scan order of first pixel)
    pub labels: Raster<u32>,
    /// Pixel count of each component; `sizes[i]` belongs to label `i + 1`
    pub sizes: Vec<usize>,
}

impl ComponentLabels {
    /// Number of components found
    pub fn count(&self) -> usize {
        self.sizes.len()
    }

    /// Pixel count of the component a label belongs to (0 for background)
    pub fn size_of(&self, label: u32) -> usize {
        match label {
            0 => 0,
            l => self.sizes.get(l as usize - 1).copied().unwrap_or(0),
        }
    }
}

/// Label the connected foreground (nonzero) regions of a mask.
pub fn label_components(mask: &Raster<u8>, connectivity: Connectivity) -> ComponentLabels {
    let (rows, cols) = mask.shape();
    let offsets = connectivity.offsets();
    let data = mask.data();

    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut sizes = Vec::new();
    let mut stack = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            if data[(r, c)] == 0 || labels[(r, c)] != 0 {
                continue;
            }

            let label = sizes.len() as u32 + 1;
            let mut size = 0usize;
            labels[(r, c)] = label;
            stack.push((r, c));

            while let Some((cr, cc)) = stack.pop() {
                size += 1;
                for &(dr, dc) in &offsets {
                    let nr = cr as isize + dr;
                    let nc = cc as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if data[(nr, nc)] != 0 && labels[(nr, nc)] == 0 {
                        labels[(nr, nc)] = label;
                        stack.push((nr, nc));
                    }
                }
            }

            sizes.push(size);
        }
    }

    ComponentLabels {
        labels: Raster::from_array(labels),
        sizes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal_pair() -> Raster<u8> {
        let mut mask = Raster::new(4, 4);
        mask.set(0, 0, 1).unwrap();
        mask.set(1, 1, 1).unwrap();
        mask.set(3, 3, 1).unwrap();
        mask
    }

    #[test]
    fn test_diagonal_split_under_four() {
        let labels = label_components(&diagonal_pair(), Connectivity::Four);
        assert_eq!(labels.count(), 3);
        assert_eq!(labels.sizes, vec![1, 1, 1]);
    }

    #[test]
    fn test_diagonal_joined_under_eight() {
        let labels = label_components(&diagonal_pair(), Connectivity::Eight);
        assert_eq!(labels.count(), 2);
        assert_eq!(labels.labels.get(0, 0).unwrap(), labels.labels.get(1, 1).unwrap());
        assert_eq!(labels.size_of(labels.labels.get(1, 1).unwrap()), 2);
        assert_eq!(labels.size_of(0), 0);
    }

    #[test]
    fn test_connectivity_conversions() {
        assert_eq!(Connectivity::try_from(4).unwrap(), Connectivity::Four);
        assert_eq!(u8::from(Connectivity::Eight), 8);
        assert!(Connectivity::try_from(6).is_err());
    }

    #[test]
    fn test_empty_mask() {
        let labels = label_components(&Raster::new(3, 3), Connectivity::Eight);
        assert_eq!(labels.count(), 0);
    }

    #[test]
    fn test_labels_keep_mask_shape() {
        let mut mask = Raster::new(2, 7);
        mask.set(0, 6, 1).unwrap();
        mask.set(1, 6, 1).unwrap();
        mask.set(1, 0, 1).unwrap();
        let labels = label_components(&mask, Connectivity::Four);
        assert_eq!(labels.labels.shape(), (2, 7));
        assert_eq!(labels.labels.get(0, 6).unwrap(), 1);
        assert_eq!(labels.labels.get(1, 6).unwrap(), 1);
        assert_eq!(labels.labels.get(1, 0).unwrap(), 2);
        assert_eq!(labels.sizes, vec![2, 1]);
    }
}
