//! Binary change masks
//!
//! Masks are `Raster<u8>` holding {0, 1}. Readers treat any nonzero cell as
//! foreground. External tooling usually exchanges {0, 255} images; use
//! [`mask_to_255`] / [`mask_from_255`] at that boundary.

use super::Raster;

/// Single-band {0, 1} mask marking changed (1) and unchanged (0) pixels
pub type BinaryMask = Raster<u8>;

/// Convert a {0, 1} mask into the {0, 255} convention
pub fn mask_to_255(mask: &BinaryMask) -> Raster<u8> {
    mask.map(|&v| if v != 0 { 255 } else { 0 })
}

/// Convert any nonzero-is-foreground mask (e.g. {0, 255}) into {0, 1}
pub fn mask_from_255(mask: &Raster<u8>) -> BinaryMask {
    mask.map(|&v| u8::from(v != 0))
}

impl Raster<u8> {
    /// Number of foreground (nonzero) cells
    pub fn count_foreground(&self) -> usize {
        self.data().iter().filter(|&&v| v != 0).count()
    }
}
