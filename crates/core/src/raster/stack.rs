//! Multi-band rasters and co-registered t1/t2 pairs

use crate::error::{Error, Result};
use crate::raster::Raster;
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

/// A multi-band raster stored as `(bands, rows, cols)`.
///
/// Band order is fixed by the caller. Spectral observations and per-class
/// probability images both use this type.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStack {
    data: Array3<f64>,
}

impl RasterStack {
    /// Create a zero-filled stack
    pub fn new(bands: usize, rows: usize, cols: usize) -> Self {
        Self {
            data: Array3::zeros((bands, rows, cols)),
        }
    }

    /// Wrap a `(bands, rows, cols)` array
    pub fn from_array(data: Array3<f64>) -> Self {
        Self { data }
    }

    /// Stack single-band rasters of identical shape
    pub fn from_bands(bands: &[&Raster<f64>]) -> Result<Self> {
        let first = bands.first().ok_or_else(|| Error::InvalidParameter {
            name: "bands",
            value: "0".to_string(),
            reason: "a stack needs at least one band".to_string(),
        })?;
        let (rows, cols) = first.shape();
        let mut data = Array3::zeros((bands.len(), rows, cols));

        for (i, band) in bands.iter().enumerate() {
            first.ensure_same_shape(band)?;
            data.index_axis_mut(Axis(0), i).assign(band.data());
        }

        Ok(Self { data })
    }

    /// Number of bands
    pub fn bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Spatial dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Number of pixels per band
    pub fn pixel_count(&self) -> usize {
        self.rows() * self.cols()
    }

    /// View of one band
    pub fn band_view(&self, band: usize) -> Result<ArrayView2<'_, f64>> {
        if band >= self.bands() {
            return Err(Error::InvalidParameter {
                name: "band",
                value: band.to_string(),
                reason: format!("stack has {} bands", self.bands()),
            });
        }
        Ok(self.data.index_axis(Axis(0), band))
    }

    /// Copy one band out as a raster
    pub fn band(&self, band: usize) -> Result<Raster<f64>> {
        Ok(Raster::from_array(self.band_view(band)?.to_owned()))
    }

    /// All band values of one pixel
    pub fn pixel(&self, row: usize, col: usize) -> ArrayView1<'_, f64> {
        self.data.slice(ndarray::s![.., row, col])
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Pixels flattened row-major into `(bands, rows * cols)`
    pub fn flatten(&self) -> Result<Array2<f64>> {
        let (bands, n) = (self.bands(), self.pixel_count());
        // iter() walks in logical (row-major) order whatever the memory layout
        let values: Vec<f64> = self.data.iter().copied().collect();
        Array2::from_shape_vec((bands, n), values).map_err(|e| Error::Other(e.to_string()))
    }

    /// Per-pixel mean over bands, used to reduce a stack to one band
    pub fn band_mean(&self) -> Raster<f64> {
        match self.data.mean_axis(Axis(0)) {
            Some(mean) => Raster::from_array(mean),
            None => Raster::new(self.rows(), self.cols()),
        }
    }
}

/// Two co-registered observations of the same area at t1 and t2.
///
/// Both stacks share rows and cols; band counts may differ.
#[derive(Debug, Clone)]
pub struct RasterPair {
    t1: RasterStack,
    t2: RasterStack,
}

impl RasterPair {
    /// Pair two stacks, failing if their spatial shapes differ
    pub fn new(t1: RasterStack, t2: RasterStack) -> Result<Self> {
        if t1.shape() != t2.shape() {
            return Err(Error::SizeMismatch {
                er: t1.rows(),
                ec: t1.cols(),
                ar: t2.rows(),
                ac: t2.cols(),
            });
        }
        if t1.pixel_count() == 0 || t1.bands() == 0 || t2.bands() == 0 {
            return Err(Error::InvalidDimensions {
                width: t1.cols(),
                height: t1.rows(),
            });
        }
        Ok(Self { t1, t2 })
    }

    /// Observation at t1
    pub fn t1(&self) -> &RasterStack {
        &self.t1
    }

    /// Observation at t2
    pub fn t2(&self) -> &RasterStack {
        &self.t2
    }

    /// Shared spatial shape
    pub fn shape(&self) -> (usize, usize) {
        self.t1.shape()
    }

    /// Release both stacks
    pub fn into_parts(self) -> (RasterStack, RasterStack) {
        (self.t1, self.t2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(rows: usize, cols: usize, offset: f64) -> Raster<f64> {
        Raster::from_vec((0..rows * cols).map(|v| v as f64 + offset).collect(), rows, cols).unwrap()
    }

    #[test]
    fn test_from_bands_and_flatten() {
        let b1 = ramp(2, 3, 0.0);
        let b2 = ramp(2, 3, 100.0);
        let stack = RasterStack::from_bands(&[&b1, &b2]).unwrap();
        assert_eq!(stack.bands(), 2);
        assert_eq!(stack.shape(), (2, 3));

        let flat = stack.flatten().unwrap();
        assert_eq!(flat.dim(), (2, 6));
        assert_eq!(flat[[0, 4]], 4.0);
        assert_eq!(flat[[1, 5]], 105.0);
        assert_eq!(stack.pixel(1, 2).to_vec(), vec![5.0, 105.0]);
    }

    #[test]
    fn test_band_mean() {
        let b1 = Raster::filled(2, 2, 1.0);
        let b2 = Raster::filled(2, 2, 3.0);
        let b3 = Raster::filled(2, 2, 0.1);
        let stack = RasterStack::from_bands(&[&b1, &b2, &b3]).unwrap();
        assert_relative_eq!(stack.band_mean().get(1, 1).unwrap(), 4.1 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_from_bands_mismatch() {
        let b1 = Raster::filled(2, 2, 1.0);
        let b2 = Raster::filled(3, 2, 1.0);
        assert!(RasterStack::from_bands(&[&b1, &b2]).is_err());
        assert!(RasterStack::from_bands(&[]).is_err());
    }

    #[test]
    fn test_pair_requires_same_shape() {
        let a = RasterStack::new(3, 4, 4);
        let b = RasterStack::new(2, 4, 4);
        assert!(RasterPair::new(a.clone(), b).is_ok());

        let c = RasterStack::new(3, 4, 5);
        let err = RasterPair::new(a, c).unwrap_err();
        assert!(err.is_invalid_input());
    }
}
