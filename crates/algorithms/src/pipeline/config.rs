//! Pipeline configuration
//!
//! Every field has a default, so a partial JSON document such as
//! `{"min_object_size": 25}` is a complete configuration.

use serde::{Deserialize, Serialize};

use crate::change::{ChangeDetector, MAX_CLASSES};
use crate::morphology::Connectivity;
use crate::threshold::ThresholdParams;
use altermap_core::{Error, Result};

/// Settings for one run of the change pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detector producing the change mask (and magnitude, for IRMAD)
    pub detector: ChangeDetector,
    /// Threshold search, used when reference classes and a magnitude exist
    pub threshold: ThresholdParams,
    /// Changed components with fewer pixels are dropped
    pub min_object_size: usize,
    /// Adjacency for the small object filter
    pub connectivity: Connectivity,
    /// Classes in the probability stacks; taken from the stacks when unset
    pub n_classes: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: ChangeDetector::default(),
            threshold: ThresholdParams::default(),
            min_object_size: 10,
            connectivity: Connectivity::Eight,
            n_classes: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Other(format!("invalid pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot run
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.n_classes {
            if !(2..=MAX_CLASSES).contains(&n) {
                return Err(Error::InvalidParameter {
                    name: "n_classes",
                    value: n.to_string(),
                    reason: format!("need between 2 and {} classes", MAX_CLASSES),
                });
            }
        }
        if !(self.threshold.step_coarse > 0.0 && self.threshold.step_fine > 0.0) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: format!("{}/{}", self.threshold.step_coarse, self.threshold.step_fine),
                reason: "threshold steps must be positive".to_string(),
            });
        }
        Ok(())
    }
}
