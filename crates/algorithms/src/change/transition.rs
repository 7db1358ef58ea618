//! Change type discrimination
//!
//! For every changed pixel the class-probability change vector
//! `delta = p(t2) - p(t1)` is compared against the ideal transition vector of
//! each ordered class pair `(a, b)`: `-1` at `a`, `+1` at `b`, zero elsewhere.
//! The pair with the highest cosine similarity names the transition, encoded
//! as `a * 100 + b`.

use std::collections::BTreeMap;

use ndarray::Array2;
use crate::maybe_rayon::*;
use altermap_core::raster::{Raster, RasterStack};
use altermap_core::{Error, Result};

/// Cosine value for a change vector with no direction
pub const COSINE_UNDEFINED: f64 = -9999.0;

/// Code of unchanged (or undecidable) pixels
pub const NO_TRANSITION: i32 = 0;

/// Largest supported class count; keeps `a * 100 + b` unambiguous
pub const MAX_CLASSES: usize = 100;

/// Change vectors shorter than this have no direction
const MIN_DELTA_NORM: f64 = 1e-12;

/// Candidates within this of the best cosine count as tied
const TIE_TOLERANCE: f64 = 1e-6;

/// Transition code for class `from` becoming class `to`
pub fn encode_transition(from: usize, to: usize) -> i32 {
    (from * 100 + to) as i32
}

/// Split a transition code back into `(from, to)`; `None` for 0 and
/// codes that do not describe a change
pub fn decode_transition(code: i32) -> Option<(usize, usize)> {
    if code <= 0 {
        return None;
    }
    let (from, to) = ((code / 100) as usize, (code % 100) as usize);
    (from != to).then_some((from, to))
}

/// Cosine similarity between a change vector and the ideal transition `from -> to`:
/// `(delta[to] - delta[from]) / (|delta| * sqrt(2))`.
///
/// Returns [`COSINE_UNDEFINED`] when `delta` is (numerically) zero or not
/// finite, or when the class indices are out of range or equal.
pub fn transition_cosine(delta: &[f64], from: usize, to: usize) -> f64 {
    if from == to || from >= delta.len() || to >= delta.len() {
        return COSINE_UNDEFINED;
    }
    cosine_with_norm(delta, delta_norm(delta), from, to)
}

fn delta_norm(delta: &[f64]) -> f64 {
    delta.iter().map(|d| d * d).sum::<f64>().sqrt()
}

fn cosine_with_norm(delta: &[f64], norm: f64, from: usize, to: usize) -> f64 {
    if !norm.is_finite() || norm < MIN_DELTA_NORM {
        return COSINE_UNDEFINED;
    }
    let cos = (delta[to] - delta[from]) / (norm * std::f64::consts::SQRT_2);
    if cos.is_finite() {
        cos.clamp(-1.0, 1.0)
    } else {
        COSINE_UNDEFINED
    }
}

/// Best transition code for one change vector; ties go to the first pair
/// in `(from, to)` enumeration order
fn best_transition(delta: &[f64]) -> i32 {
    let n = delta.len();
    let norm = delta_norm(delta);

    let mut candidates = Vec::with_capacity(n * n.saturating_sub(1));
    for from in 0..n {
        for to in 0..n {
            if from != to {
                candidates.push((encode_transition(from, to), cosine_with_norm(delta, norm, from, to)));
            }
        }
    }

    let max = candidates
        .iter()
        .map(|&(_, cos)| cos)
        .filter(|&cos| cos != COSINE_UNDEFINED)
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return NO_TRANSITION;
    }

    candidates
        .iter()
        .find(|&&(_, cos)| cos != COSINE_UNDEFINED && (cos - max).abs() <= TIE_TOLERANCE)
        .map(|&(code, _)| code)
        .unwrap_or(NO_TRANSITION)
}

/// Assign a transition code to every changed pixel.
///
/// `prob_t1` and `prob_t2` hold one probability band per class. Pixels where
/// `changed` is zero get [`NO_TRANSITION`] whatever their probabilities.
///
/// # Errors
/// - `n_classes` outside `2..=100`
/// - [`Error::BandCountMismatch`] if a probability stack does not have `n_classes` bands
/// - [`Error::SizeMismatch`] if the stacks and mask differ in shape
pub fn discriminate(
    prob_t1: &RasterStack,
    prob_t2: &RasterStack,
    changed: &Raster<u8>,
    n_classes: usize,
) -> Result<Raster<i32>> {
    if !(2..=MAX_CLASSES).contains(&n_classes) {
        return Err(Error::InvalidParameter {
            name: "n_classes",
            value: n_classes.to_string(),
            reason: format!("need between 2 and {} classes", MAX_CLASSES),
        });
    }
    for (what, stack) in [("prob_t1", prob_t1), ("prob_t2", prob_t2)] {
        if stack.bands() != n_classes {
            return Err(Error::BandCountMismatch {
                what,
                expected: n_classes,
                actual: stack.bands(),
            });
        }
    }
    let (rows, cols) = prob_t1.shape();
    for (ar, ac) in [prob_t2.shape(), changed.shape()] {
        if (ar, ac) != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar,
                ac,
            });
        }
    }

    let p1 = prob_t1.data();
    let p2 = prob_t2.data();
    let mask = changed.data();

    let codes: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut delta = vec![0.0; n_classes];
            let mut row_codes = Vec::with_capacity(cols);
            for col in 0..cols {
                if mask[(row, col)] == 0 {
                    row_codes.push(NO_TRANSITION);
                    continue;
                }
                for (k, d) in delta.iter_mut().enumerate() {
                    *d = p2[(k, row, col)] - p1[(k, row, col)];
                }
                row_codes.push(best_transition(&delta));
            }
            row_codes
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), codes).map_err(|e| Error::Other(e.to_string()))?;
    Ok(Raster::from_array(data))
}

/// Pixel count per transition code, unchanged pixels excluded
pub fn transition_summary(map: &Raster<i32>) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for &code in map.data().iter().filter(|&&c| c != NO_TRANSITION) {
        *counts.entry(code).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn stack(bands: usize, rows: usize, cols: usize, f: impl Fn(usize, usize, usize) -> f64) -> RasterStack {
        RasterStack::from_array(Array3::from_shape_fn((bands, rows, cols), |(b, r, c)| f(b, r, c)))
    }

    #[test]
    fn test_pure_transition_cosine_is_one() {
        let delta = [-1.0, 1.0, 0.0];
        assert_relative_eq!(transition_cosine(&delta, 0, 1), 1.0, epsilon = 1e-12);
        assert_relative_eq!(transition_cosine(&delta, 1, 0), -1.0, epsilon = 1e-12);
        assert_relative_eq!(transition_cosine(&delta, 0, 2), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_delta_is_undefined() {
        assert_eq!(transition_cosine(&[0.0, 0.0], 0, 1), COSINE_UNDEFINED);
        assert_eq!(transition_cosine(&[f64::NAN, 0.2], 0, 1), COSINE_UNDEFINED);
        assert_eq!(transition_cosine(&[0.3, 0.2], 1, 1), COSINE_UNDEFINED);
    }

    #[test]
    fn test_cosine_bounded() {
        let deltas = [[0.3, -0.7, 0.4], [1.0, 0.0, -1.0], [-0.2, -0.2, 0.4], [1e-3, 5.0, -2.0]];
        for delta in &deltas {
            for a in 0..3 {
                for b in 0..3 {
                    let cos = transition_cosine(delta, a, b);
                    assert!(cos == COSINE_UNDEFINED || (-1.0..=1.0).contains(&cos));
                }
            }
        }
    }

    #[test]
    fn test_codes_roundtrip() {
        assert_eq!(encode_transition(2, 5), 205);
        assert_eq!(decode_transition(205), Some((2, 5)));
        assert_eq!(decode_transition(1), Some((0, 1)));
        assert_eq!(decode_transition(0), None);
        assert_eq!(decode_transition(303), None);
    }

    #[test]
    fn test_discriminate_forest_to_urban() {
        // Class 0 -> class 2 at (0, 0); (0, 1) changed class 1 -> 0; (1, *) unchanged
        let p1 = stack(3, 2, 2, |b, r, c| match (r, c, b) {
            (0, 0, 0) => 0.9,
            (0, 1, 1) => 0.8,
            _ => 0.05,
        });
        let p2 = stack(3, 2, 2, |b, r, c| match (r, c, b) {
            (0, 0, 2) => 0.9,
            (0, 1, 0) => 0.8,
            _ => 0.05,
        });
        let mask = Raster::from_vec(vec![1, 1, 0, 0], 2, 2).unwrap();
        let map = discriminate(&p1, &p2, &mask, 3).unwrap();
        assert_eq!(map.get(0, 0).unwrap(), 2);
        assert_eq!(map.get(0, 1).unwrap(), 100);
        assert_eq!(map.get(1, 0).unwrap(), 0);
        assert_eq!(map.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_unchanged_ignores_nan() {
        let p1 = stack(2, 2, 2, |_, _, _| f64::NAN);
        let p2 = stack(2, 2, 2, |b, _, _| b as f64);
        let mask = Raster::from_vec(vec![0, 0, 0, 1], 2, 2).unwrap();
        let map = discriminate(&p1, &p2, &mask, 2).unwrap();
        assert!(map.data().iter().all(|&c| c == NO_TRANSITION));
    }

    #[test]
    fn test_changed_with_no_delta_is_zero() {
        let p = stack(2, 1, 3, |b, _, _| 0.5 * b as f64);
        let mask = Raster::filled(1, 3, 1u8);
        let map = discriminate(&p, &p, &mask, 2).unwrap();
        assert!(map.data().iter().all(|&c| c == NO_TRANSITION));
    }

    #[test]
    fn test_tie_picks_first_pair() {
        // Only class 0 drops: 0->1 and 0->2 score the same
        let delta = [-0.6, 0.0, 0.0];
        assert_eq!(best_transition(&delta), 1);
    }

    #[test]
    fn test_every_changed_pixel_gets_one_code() {
        let p1 = stack(4, 3, 3, |b, r, c| ((b + r * 3 + c) % 4) as f64 / 4.0);
        let p2 = stack(4, 3, 3, |b, r, c| ((b * 2 + r + c * 5) % 4) as f64 / 4.0);
        let mask = Raster::filled(3, 3, 1u8);
        let map = discriminate(&p1, &p2, &mask, 4).unwrap();
        for &code in map.data().iter() {
            if code != NO_TRANSITION {
                let (from, to) = decode_transition(code).unwrap();
                assert!(from < 4 && to < 4 && from != to);
            }
        }
    }

    #[test]
    fn test_validation() {
        let p = stack(3, 2, 2, |_, _, _| 0.3);
        let mask = Raster::new(2, 2);
        assert!(matches!(
            discriminate(&p, &p, &mask, 4).unwrap_err(),
            Error::BandCountMismatch { what: "prob_t1", .. }
        ));
        assert!(discriminate(&p, &p, &mask, 1).is_err());
        assert!(discriminate(&p, &p, &mask, 101).is_err());
        let wide = Raster::new(2, 3);
        assert!(matches!(
            discriminate(&p, &p, &wide, 3).unwrap_err(),
            Error::SizeMismatch { .. }
        ));
    }

    #[test]
    fn test_summary() {
        let map = Raster::from_vec(vec![0, 2, 2, 100, 0, 201], 2, 3).unwrap();
        let summary = transition_summary(&map);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[&2], 2);
        assert_eq!(summary[&100], 1);
        assert_eq!(summary[&201], 1);
    }
}
