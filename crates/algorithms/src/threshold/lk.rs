//! Lk agreement metric
//!
//! For a threshold `T` on a change magnitude and two reference class maps:
//!
//! ```text
//! detected    = magnitude >= T
//! true_change = class_t1 != class_t2
//! Lk = 100 * (|detected & true_change| - |detected & !true_change|) / |true_change|
//! ```
//!
//! Lk lies in [-100, 100]. It is undefined when the reference shows no change.

use crate::maybe_rayon::*;
use altermap_core::raster::{Raster, RasterElement};
use altermap_core::Result;

/// Lk value when the reference maps contain no change
pub const LK_UNDEFINED: f64 = -9999.0;

/// Lk of one threshold.
///
/// NaN magnitudes are never detected. Class rasters are compared cell by
/// cell with `!=`.
///
/// # Errors
/// [`altermap_core::Error::SizeMismatch`] if the three rasters differ in shape.
pub fn compute_lk<T: RasterElement>(
    magnitude: &Raster<f64>,
    class_t1: &Raster<T>,
    class_t2: &Raster<T>,
    threshold: f64,
) -> Result<f64> {
    Ok(LkContext::new(magnitude, class_t1, class_t2)?.score(threshold))
}

/// Validated inputs for scoring many thresholds against the same rasters
#[derive(Debug, Clone)]
pub(crate) struct LkContext {
    magnitude: Vec<f64>,
    true_change: Vec<bool>,
    total_change: usize,
}

impl LkContext {
    pub(crate) fn new<T: RasterElement>(
        magnitude: &Raster<f64>,
        class_t1: &Raster<T>,
        class_t2: &Raster<T>,
    ) -> Result<Self> {
        magnitude.ensure_same_shape(class_t1)?;
        magnitude.ensure_same_shape(class_t2)?;

        let true_change: Vec<bool> = class_t1
            .data()
            .iter()
            .zip(class_t2.data().iter())
            .map(|(a, b)| a != b)
            .collect();
        let total_change = true_change.iter().filter(|&&t| t).count();

        Ok(Self {
            magnitude: magnitude.to_vec(),
            true_change,
            total_change,
        })
    }

    /// Smallest and largest finite magnitude
    pub(crate) fn finite_range(&self) -> Option<(f64, f64)> {
        self.magnitude
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub(crate) fn score(&self, threshold: f64) -> f64 {
        if self.total_change == 0 {
            return LK_UNDEFINED;
        }

        let (hits, false_alarms) = self
            .magnitude
            .iter()
            .zip(&self.true_change)
            .filter(|&(&m, _)| m >= threshold)
            .fold((0usize, 0usize), |(hits, false_alarms), (_, &is_change)| {
                if is_change {
                    (hits + 1, false_alarms)
                } else {
                    (hits, false_alarms + 1)
                }
            });

        (hits as f64 - false_alarms as f64) * 100.0 / self.total_change as f64
    }

    /// Score every candidate; order of the output matches `thresholds`
    pub(crate) fn score_all(&self, thresholds: &[f64]) -> Vec<f64> {
        thresholds.par_iter().map(|&t| self.score(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use altermap_core::Error;

    fn fixture() -> (Raster<f64>, Raster<i32>, Raster<i32>) {
        // True change at cells 0..4 (4 cells), magnitude high on 0..3 and on cell 6
        let magnitude = Raster::from_vec(vec![0.9, 0.8, 0.7, 0.2, 0.1, 0.1, 0.85, 0.0], 2, 4).unwrap();
        let t1 = Raster::from_vec(vec![1, 1, 2, 3, 1, 1, 2, 2], 2, 4).unwrap();
        let t2 = Raster::from_vec(vec![2, 3, 1, 1, 1, 1, 2, 2], 2, 4).unwrap();
        (magnitude, t1, t2)
    }

    #[test]
    fn test_lk_counts() {
        let (m, t1, t2) = fixture();
        // T = 0.5: detected {0, 1, 2, 6}; hits 3, false alarm 1
        assert_relative_eq!(compute_lk(&m, &t1, &t2, 0.5).unwrap(), 50.0);
        // T = 0.0: everything detected; hits 4, false alarms 4
        assert_relative_eq!(compute_lk(&m, &t1, &t2, 0.0).unwrap(), 0.0);
        // T above max: nothing detected
        assert_relative_eq!(compute_lk(&m, &t1, &t2, 1.0).unwrap(), 0.0);
        // T = 0.86: only cell 0
        assert_relative_eq!(compute_lk(&m, &t1, &t2, 0.86).unwrap(), 25.0);
    }

    #[test]
    fn test_identical_classes_undefined() {
        let (m, t1, _) = fixture();
        assert_eq!(compute_lk(&m, &t1, &t1, 0.5).unwrap(), LK_UNDEFINED);
    }

    #[test]
    fn test_lk_bounded() {
        let (m, t1, t2) = fixture();
        for i in -5..=25 {
            let lk = compute_lk(&m, &t1, &t2, i as f64 * 0.05).unwrap();
            assert!((-100.0..=100.0).contains(&lk));
        }
    }

    #[test]
    fn test_nan_never_detected() {
        let m = Raster::from_vec(vec![f64::NAN, 1.0], 1, 2).unwrap();
        let t1 = Raster::from_vec(vec![0, 0], 1, 2).unwrap();
        let t2 = Raster::from_vec(vec![1, 0], 1, 2).unwrap();
        assert_relative_eq!(compute_lk(&m, &t1, &t2, 0.0).unwrap(), -100.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let (m, t1, _) = fixture();
        let t2 = Raster::<i32>::new(4, 2);
        assert!(matches!(
            compute_lk(&m, &t1, &t2, 0.5).unwrap_err(),
            Error::SizeMismatch { .. }
        ));
    }

    #[test]
    fn test_finite_range() {
        let m = Raster::from_vec(vec![f64::NAN, 2.0, -1.0, f64::INFINITY], 2, 2).unwrap();
        let t = Raster::<u8>::new(2, 2);
        let ctx = LkContext::new(&m, &t, &t).unwrap();
        assert_eq!(ctx.finite_range(), Some((-1.0, 2.0)));
    }
}
