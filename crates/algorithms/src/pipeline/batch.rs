//! Many independent scenes through the same pipeline

use tracing::{info, warn};

use super::{run_pipeline, PipelineConfig, PipelineInput, PipelineOutput};
use crate::maybe_rayon::*;
use crate::statistics::{mean_metrics, MeanMetrics};
use altermap_core::Result;

/// Per-scene results of a batch, in input order
#[derive(Debug)]
pub struct BatchReport {
    pub outputs: Vec<Result<PipelineOutput>>,
    /// Mean agreement over the scenes that had a reference mask
    pub mean_metrics: Option<MeanMetrics>,
}

impl BatchReport {
    /// Number of scenes that failed
    pub fn failures(&self) -> usize {
        self.outputs.iter().filter(|o| o.is_err()).count()
    }
}

/// Run every scene in parallel. A failing scene does not stop the others.
pub fn run_batch(inputs: &[PipelineInput], config: &PipelineConfig) -> BatchReport {
    info!(scenes = inputs.len(), "running change pipeline batch");

    let outputs: Vec<Result<PipelineOutput>> = inputs
        .par_iter()
        .map(|input| run_pipeline(input, config))
        .collect();

    for (index, output) in outputs.iter().enumerate() {
        if let Err(e) = output {
            warn!(scene = index, error = %e, "scene failed");
        }
    }

    let scored: Vec<_> = outputs
        .iter()
        .filter_map(|o| o.as_ref().ok().and_then(|out| out.metrics))
        .collect();
    let mean_metrics = mean_metrics(&scored);

    let report = BatchReport {
        outputs,
        mean_metrics,
    };
    info!(
        scenes = inputs.len(),
        failed = report.failures(),
        scored = scored.len(),
        "batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use altermap_core::raster::{Raster, RasterPair, RasterStack};
    use ndarray::Array3;

    fn shifted_pair(shift_rows: std::ops::Range<usize>) -> RasterPair {
        let t1 = RasterStack::from_array(Array3::from_shape_fn((2, 20, 20), |(b, r, c)| {
            5.0 + ((r * 3 + c * 7 + b * 11) % 17) as f64 + ((r * c + b) % 3) as f64
        }));
        let mut data = t1.data().clone();
        for ((b, r, c), v) in data.indexed_iter_mut() {
            *v += ((r + c * 2 + b) % 4) as f64 * 0.25;
            if shift_rows.contains(&r) && c < 10 {
                *v += 60.0 + 15.0 * b as f64;
            }
        }
        RasterPair::new(t1, RasterStack::from_array(data)).unwrap()
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let bad = RasterPair::new(
            RasterStack::from_array(Array3::zeros((2, 20, 20))),
            RasterStack::from_array(Array3::zeros((2, 20, 20))),
        )
        .unwrap();
        let inputs = vec![
            PipelineInput::new(shifted_pair(0..5)),
            PipelineInput::new(bad),
            PipelineInput::new(shifted_pair(10..16)),
        ];

        let report = run_batch(&inputs, &PipelineConfig::default());
        assert_eq!(report.outputs.len(), 3);
        assert_eq!(report.failures(), 1);
        assert!(report.outputs[0].is_ok());
        assert!(report.outputs[1].is_err());
        assert!(report.outputs[2].is_ok());
        assert!(report.mean_metrics.is_none());
    }

    #[test]
    fn test_batch_mean_metrics() {
        let mut reference = Raster::new(20, 20);
        for r in 0..5 {
            for c in 0..10 {
                reference.set(r, c, 1).unwrap();
            }
        }
        let inputs = vec![
            PipelineInput::new(shifted_pair(0..5)).with_reference_mask(reference.clone()),
            PipelineInput::new(shifted_pair(0..5)).with_reference_mask(reference),
        ];
        let report = run_batch(&inputs, &PipelineConfig::default());
        let mean = report.mean_metrics.unwrap();
        assert_eq!(mean.scenes, 2);
    }
}
