//! Structuring element definitions for morphological operations
//!
//! A structuring element defines the neighborhood shape used in erosion.

use altermap_core::raster::Neighborhood;
use altermap_core::{Error, Result};

/// Shape of a structuring element for morphological operations
#[derive(Debug, Clone, PartialEq)]
pub enum StructuringElement {
    /// Diamond element: cells within Manhattan distance `radius`
    Diamond(usize),
}

impl StructuringElement {
    /// The 5x5 diamond used to clean block-PCA change maps:
    ///
    /// ```text
    /// . . x . .
    /// . x x x .
    /// x x x x x
    /// . x x x .
    /// . . x . .
    /// ```
    pub fn change_map_cleanup() -> Self {
        StructuringElement::Diamond(2)
    }

    /// Validate the structuring element, returning an error for invalid configurations
    pub fn validate(&self) -> Result<()> {
        match self {
            StructuringElement::Diamond(0) => Err(Error::InvalidParameter {
                name: "radius",
                value: "0".to_string(),
                reason: "structuring element radius must be at least 1".to_string(),
            }),
            StructuringElement::Diamond(_) => Ok(()),
        }
    }

    /// Compute (dr, dc) offsets relative to center for all active cells
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        match self {
            StructuringElement::Diamond(r) => Neighborhood::Diamond(*r).offsets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_diamond_matches_kernel() {
        let kernel = [
            [0, 0, 1, 0, 0],
            [0, 1, 1, 1, 0],
            [1, 1, 1, 1, 1],
            [0, 1, 1, 1, 0],
            [0, 0, 1, 0, 0],
        ];
        let expected: Vec<(isize, isize)> = kernel
            .iter()
            .enumerate()
            .flat_map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .filter(|&(_, &v)| v == 1)
                    .map(move |(c, _)| (r as isize - 2, c as isize - 2))
            })
            .collect();
        let actual = StructuringElement::change_map_cleanup().offsets();
        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 13);
    }

    #[test]
    fn test_validate() {
        assert!(StructuringElement::Diamond(0).validate().is_err());
        assert!(StructuringElement::change_map_cleanup().validate().is_ok());
    }
}
