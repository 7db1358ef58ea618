//! Coarse-to-fine threshold search maximizing Lk
//!
//! Each iteration scans the whole magnitude range with a coarse step, then
//! refines around the running best with a fine step. A pass only replaces
//! the running best when it beats it by more than the tolerance; the search
//! ends after an iteration with no improvement.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::lk::{LkContext, LK_UNDEFINED};
use altermap_core::raster::{Raster, RasterElement};
use altermap_core::{Error, Result};

/// Upper bound on thresholds scored in a single pass
const MAX_CANDIDATES: usize = 1_000_000;

/// Parameters for [`optimize_threshold`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// Step of the full-range pass
    pub step_coarse: f64,
    /// Step of the refinement pass around the running best
    pub step_fine: f64,
    /// Minimum Lk gain for a pass to count as an improvement
    pub tolerance: f64,
    /// Maximum number of coarse+fine iterations
    pub max_iterations: usize,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            step_coarse: 0.1,
            step_fine: 0.01,
            tolerance: 1e-3,
            max_iterations: 10,
        }
    }
}

/// Which pass of an iteration produced an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPass {
    Coarse,
    Fine,
}

/// An accepted improvement of the running best
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    /// 1-based iteration
    pub iteration: usize,
    pub pass: SearchPass,
    pub threshold: f64,
    pub score: f64,
}

/// Outcome of the threshold search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    /// Best threshold found (the minimum magnitude if nothing improved)
    pub threshold: f64,
    /// Lk at `threshold`, or [`LK_UNDEFINED`]
    pub score: f64,
    /// Iterations run
    pub iterations: usize,
    /// Accepted improvements in order; scores are strictly increasing
    pub updates: Vec<ThresholdUpdate>,
}

/// Find the magnitude threshold that maximizes Lk against two class maps.
///
/// # Errors
/// - shape mismatch between the rasters
/// - non-positive or non-finite steps, negative tolerance
/// - a magnitude with no finite value
pub fn optimize_threshold<T: RasterElement>(
    magnitude: &Raster<f64>,
    class_t1: &Raster<T>,
    class_t2: &Raster<T>,
    params: &ThresholdParams,
) -> Result<ThresholdResult> {
    validate(params)?;
    let ctx = LkContext::new(magnitude, class_t1, class_t2)?;
    let (vmin, vmax) = ctx
        .finite_range()
        .ok_or(Error::NonFiniteInput { what: "magnitude" })?;

    check_candidate_count("step_coarse", vmin, vmax, params.step_coarse)?;
    check_candidate_count("step_fine", 0.0, 2.0 * params.step_coarse, params.step_fine)?;

    let mut best_threshold = vmin;
    let mut best_score = LK_UNDEFINED;
    let mut updates = Vec::new();
    let mut iteration = 0;
    let mut improved = true;

    while iteration < params.max_iterations && improved {
        iteration += 1;
        improved = false;

        let coarse = candidates(vmin, vmax, params.step_coarse);
        if let Some((t, s)) = best_candidate(&ctx, &coarse) {
            if s - best_score > params.tolerance {
                best_threshold = t;
                best_score = s;
                improved = true;
                updates.push(ThresholdUpdate {
                    iteration,
                    pass: SearchPass::Coarse,
                    threshold: t,
                    score: s,
                });
            }
        }

        let low = (best_threshold - params.step_coarse).max(vmin);
        let high = (best_threshold + params.step_coarse).min(vmax);
        let fine = candidates(low, high, params.step_fine);
        if let Some((t, s)) = best_candidate(&ctx, &fine) {
            if s - best_score > params.tolerance {
                best_threshold = t;
                best_score = s;
                improved = true;
                updates.push(ThresholdUpdate {
                    iteration,
                    pass: SearchPass::Fine,
                    threshold: t,
                    score: s,
                });
            }
        }

        debug!(
            iteration,
            threshold = best_threshold,
            score = best_score,
            improved,
            "threshold search iteration"
        );
    }

    Ok(ThresholdResult {
        threshold: best_threshold,
        score: best_score,
        iterations: iteration,
        updates,
    })
}

fn validate(params: &ThresholdParams) -> Result<()> {
    for (name, step) in [("step_coarse", params.step_coarse), ("step_fine", params.step_fine)] {
        if !(step.is_finite() && step > 0.0) {
            return Err(Error::InvalidParameter {
                name,
                value: step.to_string(),
                reason: "step must be positive and finite".to_string(),
            });
        }
    }
    if !(params.tolerance >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "tolerance",
            value: params.tolerance.to_string(),
            reason: "tolerance must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn check_candidate_count(name: &'static str, low: f64, high: f64, step: f64) -> Result<()> {
    let count = ((high - low) / step).floor();
    if count >= MAX_CANDIDATES as f64 {
        return Err(Error::InvalidParameter {
            name,
            value: step.to_string(),
            reason: format!("step yields more than {} candidate thresholds", MAX_CANDIDATES),
        });
    }
    Ok(())
}

/// `low, low + step, ...` up to and including `high` (within rounding)
fn candidates(low: f64, high: f64, step: f64) -> Vec<f64> {
    if high < low {
        return vec![low];
    }
    let n = ((high - low) / step + 1e-9).floor() as usize + 1;
    (0..n).map(|i| low + i as f64 * step).collect()
}

/// Highest-scoring candidate; the lowest threshold wins ties
fn best_candidate(ctx: &LkContext, thresholds: &[f64]) -> Option<(f64, f64)> {
    let scores = ctx.score_all(thresholds);
    thresholds
        .iter()
        .zip(scores)
        .fold(None, |best: Option<(f64, f64)>, (&t, s)| match best {
            Some((_, bs)) if s <= bs => best,
            _ => Some((t, s)),
        })
}
