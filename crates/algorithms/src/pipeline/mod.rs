//! End-to-end change pipeline
//!
//! RasterPair → detector → (optional) Lk threshold → small object filter →
//! (optional) transition codes. Optional stages run only when their inputs
//! are supplied.

mod batch;
mod config;

pub use batch::{run_batch, BatchReport};
pub use config::PipelineConfig;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::change::{discriminate, transition_summary, ChangeMagnitudeProvider};
use crate::morphology::remove_small_objects;
use crate::statistics::{evaluate_binary, BinaryMetrics};
use crate::threshold::{optimize_threshold, ThresholdResult, LK_UNDEFINED};
use altermap_core::raster::{BinaryMask, Raster, RasterPair, RasterStack};
use altermap_core::Result;

/// Reference land-cover classes at both dates, for threshold tuning
#[derive(Debug, Clone)]
pub struct ReferenceClasses {
    pub class_t1: Raster<i32>,
    pub class_t2: Raster<i32>,
}

/// Per-class probability stacks at both dates, for transition codes
#[derive(Debug, Clone)]
pub struct ClassProbabilities {
    pub prob_t1: RasterStack,
    pub prob_t2: RasterStack,
}

/// Everything known about one scene
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub pair: RasterPair,
    pub reference: Option<ReferenceClasses>,
    pub probabilities: Option<ClassProbabilities>,
    /// Ground-truth change mask to score the final mask against
    pub reference_mask: Option<BinaryMask>,
}

impl PipelineInput {
    /// Input with imagery only
    pub fn new(pair: RasterPair) -> Self {
        Self {
            pair,
            reference: None,
            probabilities: None,
            reference_mask: None,
        }
    }

    pub fn with_reference(mut self, class_t1: Raster<i32>, class_t2: Raster<i32>) -> Self {
        self.reference = Some(ReferenceClasses { class_t1, class_t2 });
        self
    }

    pub fn with_probabilities(mut self, prob_t1: RasterStack, prob_t2: RasterStack) -> Self {
        self.probabilities = Some(ClassProbabilities { prob_t1, prob_t2 });
        self
    }

    pub fn with_reference_mask(mut self, mask: BinaryMask) -> Self {
        self.reference_mask = Some(mask);
        self
    }
}

/// Products of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Name of the detector that ran
    pub detector: &'static str,
    /// Change magnitude, when the detector provides one
    pub magnitude: Option<Raster<f64>>,
    /// Threshold search outcome, when it ran; the threshold applies to the
    /// magnitude rescaled to [0, 1]
    pub threshold: Option<ThresholdResult>,
    /// Final {0, 1} change mask after small object removal
    pub mask: BinaryMask,
    /// Transition codes, when probabilities were supplied
    pub transitions: Option<Raster<i32>>,
    /// Pixel count per transition code
    pub transition_counts: BTreeMap<i32, usize>,
    /// Agreement with the reference mask, when one was supplied
    pub metrics: Option<BinaryMetrics>,
}

/// Run the full pipeline on one scene.
pub fn run_pipeline(input: &PipelineInput, config: &PipelineConfig) -> Result<PipelineOutput> {
    config.validate()?;
    let detector = &config.detector;
    let (rows, cols) = input.pair.shape();
    info!(detector = detector.name(), rows, cols, "detecting change");

    let detection = detector.detect(&input.pair)?;
    if let Some(magnitude) = &detection.magnitude {
        let stats = magnitude.statistics();
        debug!(min = ?stats.min, max = ?stats.max, mean = ?stats.mean, "change magnitude");
    }
    let mut mask = detection.mask;

    let threshold = match (&detection.magnitude, &input.reference) {
        (Some(magnitude), Some(reference)) => {
            let scaled = unit_scale(magnitude);
            let result = optimize_threshold(&scaled, &reference.class_t1, &reference.class_t2, &config.threshold)?;
            if result.score == LK_UNDEFINED {
                warn!("reference classes show no change; keeping the detector mask");
            } else {
                info!(threshold = result.threshold, lk = result.score, "threshold optimized");
                mask = scaled.map(|&m| u8::from(m >= result.threshold));
            }
            Some(result)
        }
        (None, Some(_)) => {
            warn!(detector = detector.name(), "detector has no magnitude; skipping threshold search");
            None
        }
        _ => None,
    };

    let before = mask.count_foreground();
    let mask = remove_small_objects(&mask, config.min_object_size, config.connectivity);
    info!(
        changed = mask.count_foreground(),
        removed = before - mask.count_foreground(),
        min_size = config.min_object_size,
        "small objects removed"
    );

    let transitions = match &input.probabilities {
        Some(probs) => {
            let n_classes = config.n_classes.unwrap_or_else(|| probs.prob_t1.bands());
            let map = discriminate(&probs.prob_t1, &probs.prob_t2, &mask, n_classes)?;
            info!(n_classes, "transition codes assigned");
            Some(map)
        }
        None => None,
    };
    let transition_counts = transitions.as_ref().map(transition_summary).unwrap_or_default();

    let metrics = match &input.reference_mask {
        Some(reference) => Some(evaluate_binary(&mask, reference)?),
        None => None,
    };

    Ok(PipelineOutput {
        detector: detector.name(),
        magnitude: detection.magnitude,
        threshold,
        mask,
        transitions,
        transition_counts,
        metrics,
    })
}

/// Min-max scale finite values to [0, 1] so the threshold steps do not
/// depend on the detector's units. NaN stays NaN; a constant magnitude maps to 0.
fn unit_scale(magnitude: &Raster<f64>) -> Raster<f64> {
    let (min, max) = magnitude
        .data()
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    magnitude.map(|&m| {
        if !m.is_finite() {
            f64::NAN
        } else if range > 0.0 {
            (m - min) / range
        } else {
            0.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{BlockPcaParams, ChangeDetector};
    use ndarray::Array3;

    /// 3-band pair on a 30x30 grid with a 10x10 shifted block at (10..20, 10..20)
    fn scene() -> RasterPair {
        let t1 = RasterStack::from_array(Array3::from_shape_fn((3, 30, 30), |(b, r, c)| {
            20.0 + ((r * 5 + c * 11 + b * 7) % 13) as f64 + ((r + 2 * c + b) % 5) as f64 * 0.5
        }));
        let mut data = t1.data().clone();
        for ((b, r, c), v) in data.indexed_iter_mut() {
            *v += ((r * 3 + c * 7 + b * 2) % 5) as f64 * 0.3;
        }
        for b in 0..3 {
            for r in 10..20 {
                for c in 10..20 {
                    data[(b, r, c)] += 80.0 + 20.0 * b as f64;
                }
            }
        }
        RasterPair::new(t1, RasterStack::from_array(data)).unwrap()
    }

    fn block_mask() -> BinaryMask {
        let mut mask = Raster::new(30, 30);
        for r in 10..20 {
            for c in 10..20 {
                mask.set(r, c, 1).unwrap();
            }
        }
        mask
    }

    #[test]
    fn test_irmad_pipeline_with_reference() {
        let class_t1 = Raster::filled(30, 30, 1);
        let class_t2 = block_mask().map(|&v| if v == 1 { 2 } else { 1 });
        let input = PipelineInput::new(scene())
            .with_reference(class_t1, class_t2)
            .with_reference_mask(block_mask());

        let output = run_pipeline(&input, &PipelineConfig::default()).unwrap();
        assert_eq!(output.detector, "irmad");
        let threshold = output.threshold.unwrap();
        assert!(threshold.score > 90.0);
        let metrics = output.metrics.unwrap();
        assert!(metrics.iou > 0.9, "iou {}", metrics.iou);
        assert!(output.transitions.is_none());
    }

    #[test]
    fn test_block_pca_pipeline_skips_threshold() {
        let config = PipelineConfig {
            detector: ChangeDetector::BlockPcaKmeans {
                params: BlockPcaParams::default(),
            },
            ..Default::default()
        };
        let input = PipelineInput::new(scene()).with_reference(Raster::filled(30, 30, 0), Raster::filled(30, 30, 1));
        let output = run_pipeline(&input, &config).unwrap();
        assert!(output.threshold.is_none());
        assert!(output.magnitude.is_none());
        assert_eq!(output.mask.shape(), (30, 30));
    }

    #[test]
    fn test_transitions_only_on_mask() {
        let mask = block_mask();
        let prob_t1 = RasterStack::from_array(Array3::from_shape_fn((2, 30, 30), |(b, _, _)| {
            if b == 0 { 0.9 } else { 0.1 }
        }));
        let prob_t2 = RasterStack::from_array(Array3::from_shape_fn((2, 30, 30), |(b, r, c)| {
            let inside = mask.get(r, c).unwrap() == 1;
            match (inside, b) {
                (true, 0) => 0.1,
                (true, _) => 0.9,
                (false, 0) => 0.9,
                (false, _) => 0.1,
            }
        }));
        let input = PipelineInput::new(scene()).with_probabilities(prob_t1, prob_t2);
        let output = run_pipeline(&input, &PipelineConfig::default()).unwrap();

        // Outside the block probabilities do not move, so even masked pixels get 0
        let transitions = output.transitions.unwrap();
        let mut changed_in_block = 0;
        for ((r, c), &code) in transitions.data().indexed_iter() {
            let masked = output.mask.get(r, c).unwrap() != 0;
            let in_block = mask.get(r, c).unwrap() == 1;
            if masked && in_block {
                assert_eq!(code, 1);
                changed_in_block += 1;
            } else {
                assert_eq!(code, 0);
            }
        }
        assert!(changed_in_block > 0);
        assert_eq!(output.transition_counts.get(&1).copied().unwrap_or(0), changed_in_block);
    }

    #[test]
    fn test_unit_scale() {
        let m = Raster::from_vec(vec![2.0, 4.0, f64::NAN, 6.0], 2, 2).unwrap();
        let scaled = unit_scale(&m);
        assert_eq!(scaled.get(0, 0).unwrap(), 0.0);
        assert_eq!(scaled.get(0, 1).unwrap(), 0.5);
        assert!(scaled.get(1, 0).unwrap().is_nan());
        assert_eq!(scaled.get(1, 1).unwrap(), 1.0);
        assert!(unit_scale(&Raster::filled(2, 2, 3.0)).data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            n_classes: Some(200),
            ..Default::default()
        };
        assert!(run_pipeline(&PipelineInput::new(scene()), &config).is_err());
    }
}
