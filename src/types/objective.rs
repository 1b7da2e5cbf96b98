//! Objective registry types (4.D).

use serde::{Deserialize, Serialize};

/// Named weights for the "weighted" objective, and the base weights the
/// HIL-Tuner's round-1 recall bias scales (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub acceptance: f64,
    pub nonzero_cells: f64,
    pub track_health: f64,
    pub detection_rate: f64,
    pub false_positive: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            acceptance: 0.4,
            nonzero_cells: 0.2,
            track_health: 0.2,
            detection_rate: 0.15,
            false_positive: 0.05,
        }
    }
}

impl Weights {
    /// Scale detection-rate up and false-positive down — the HIL-Tuner's
    /// deliberate round-1 recall bias (spec.md §4.G).
    pub fn with_recall_bias(&self, detection_mult: f64, false_positive_mult: f64) -> Self {
        Self {
            detection_rate: self.detection_rate * detection_mult,
            false_positive: self.false_positive * false_positive_mult,
            ..*self
        }
    }
}

/// Metadata describing a registered scoring function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveDefinition {
    pub name: String,
    pub version: String,
    pub description: String,
    pub required_input_features: Vec<String>,
}
