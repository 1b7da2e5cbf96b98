//! ComboResult — what a single evaluated combination produced.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::parameter::ParamMap;

/// A mean/stddev pair for one tracked metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub stddev: f64,
}

/// The outcome of evaluating one parameter combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboResult {
    pub params: ParamMap,
    pub per_bucket_acceptance: BTreeMap<String, MetricSummary>,
    pub overall_acceptance: MetricSummary,
    pub nonzero_cells: MetricSummary,
    pub track_health: BTreeMap<String, MetricSummary>,
    /// Populated only when the combination produced a capture-file analysis run.
    pub run_id: Option<String>,
}

impl ComboResult {
    pub fn new(params: ParamMap) -> Self {
        Self {
            params,
            per_bucket_acceptance: BTreeMap::new(),
            overall_acceptance: MetricSummary::default(),
            nonzero_cells: MetricSummary::default(),
            track_health: BTreeMap::new(),
            run_id: None,
        }
    }
}

/// The Auto-Tuner's final answer: the best parameter assignment plus every
/// metric summary that produced it and the composite score that won it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub params: ParamMap,
    pub score: f64,
    pub overall_acceptance: MetricSummary,
    pub nonzero_cells: MetricSummary,
    pub per_bucket_acceptance: BTreeMap<String, MetricSummary>,
    pub track_health: BTreeMap<String, MetricSummary>,
}

impl Recommendation {
    pub fn from_scored(combo: &ComboResult, score: f64) -> Self {
        Self {
            params: combo.params.clone(),
            score,
            overall_acceptance: combo.overall_acceptance,
            nonzero_cells: combo.nonzero_cells,
            per_bucket_acceptance: combo.per_bucket_acceptance.clone(),
            track_health: combo.track_health.clone(),
        }
    }
}
