//! Accuracy assessment of binary change masks
//!
//! Compares a predicted mask with a reference mask cell by cell and
//! derives the usual agreement scores. Any nonzero cell counts as change,
//! so {0, 1} and {0, 255} masks can be mixed freely.

use serde::{Deserialize, Serialize};
use altermap_core::raster::Raster;
use altermap_core::{Error, Result};

/// Confusion counts between a predicted and a reference mask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    /// Count agreement between `predicted` and `reference`
    pub fn from_masks(predicted: &Raster<u8>, reference: &Raster<u8>) -> Result<Self> {
        predicted.ensure_same_shape(reference)?;

        let mut cm = ConfusionMatrix::default();
        for (&p, &r) in predicted.data().iter().zip(reference.data().iter()) {
            match (p != 0, r != 0) {
                (true, true) => cm.true_positive += 1,
                (true, false) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_negative += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// Agreement scores for one scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub confusion: ConfusionMatrix,
    /// Jaccard index (intersection over union)
    pub iou: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub accuracy: f64,
    /// Cohen's kappa
    pub kappa: f64,
}

/// Mean of each score over several scenes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanMetrics {
    pub scenes: usize,
    pub iou: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub accuracy: f64,
    pub kappa: f64,
}

/// Ratio that yields 0 when the denominator is 0
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Score a predicted mask against a reference mask.
///
/// Scores with an empty denominator (no predicted change for precision, no
/// reference change for recall, empty union for IoU) are reported as 0.
/// Kappa is 0 when the expected agreement is already perfect.
pub fn evaluate_binary(predicted: &Raster<u8>, reference: &Raster<u8>) -> Result<BinaryMetrics> {
    let cm = ConfusionMatrix::from_masks(predicted, reference)?;
    let n = cm.total();
    if n == 0 {
        return Err(Error::EmptyInput { what: "masks" });
    }

    let tp = cm.true_positive as f64;
    let fp = cm.false_positive as f64;
    let tn = cm.true_negative as f64;
    let fn_ = cm.false_negative as f64;
    let n = n as f64;

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = ratio(2.0 * tp, 2.0 * tp + fp + fn_);
    let iou = ratio(tp, tp + fp + fn_);
    let accuracy = (tp + tn) / n;

    let expected = ((tp + fp) * (tp + fn_) + (fn_ + tn) * (fp + tn)) / (n * n);
    let kappa = ratio(accuracy - expected, 1.0 - expected);

    Ok(BinaryMetrics {
        confusion: cm,
        iou,
        f1,
        precision,
        recall,
        accuracy,
        kappa,
    })
}

/// Average scores over scenes; `None` for an empty slice
pub fn mean_metrics(scenes: &[BinaryMetrics]) -> Option<MeanMetrics> {
    if scenes.is_empty() {
        return None;
    }
    let n = scenes.len() as f64;
    let mean = |f: fn(&BinaryMetrics) -> f64| scenes.iter().map(f).sum::<f64>() / n;

    Some(MeanMetrics {
        scenes: scenes.len(),
        iou: mean(|m| m.iou),
        f1: mean(|m| m.f1),
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        accuracy: mean(|m| m.accuracy),
        kappa: mean(|m| m.kappa),
    })
}
