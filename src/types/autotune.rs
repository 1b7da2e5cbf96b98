//! Auto-Tuner request/state types (3 / 4.F).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::parameter::{ParamMap, ScalarKind};
use super::request::DataSource;
use super::result::{ComboResult, Recommendation};
use super::objective::Weights;

/// Parameter-name → `[lo, hi]` bounds, as used by the adaptive round algorithm.
pub type Bounds = BTreeMap<String, (f64, f64)>;

/// One parameter in an [`AutoTuneRequest`] — always numeric (float/int/int64),
/// always described by a `[start, end]` range (no explicit-value lists: the
/// adaptive grid generates its own values per round).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTuneParam {
    pub name: String,
    pub kind: ScalarKind,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTuneRequest {
    pub params: Vec<AutoTuneParam>,
    pub values_per_param: u32,
    pub top_k: u32,
    pub max_rounds: u32,
    #[serde(default = "default_objective")]
    pub objective: String,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub settle_time: String,
    pub data_source: DataSource,
    #[serde(default)]
    pub scene_id: Option<String>,
    /// When set, the recommendation's parameter values are written to the
    /// configured scene store as JSON on completion.
    #[serde(default)]
    pub persist_optimal_params: bool,
}

fn default_objective() -> String {
    "weighted".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    pub combo: ComboResult,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub best_score: f64,
    pub bounds_at_start: Bounds,
    pub best_params: ParamMap,
    pub top_k: Vec<ScoredResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuneStatus {
    Idle,
    Running,
    Complete,
    Error,
    Suspended,
}

impl Default for TuneStatus {
    fn default() -> Self {
        TuneStatus::Idle
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoTuneState {
    pub sweep_id: String,
    pub status: TuneStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub round_history: Vec<RoundSummary>,
    pub results: Vec<ComboResult>,
    pub recommendation: Option<Recommendation>,
    pub error: Option<String>,
    pub bounds: Bounds,
}

impl AutoTuneState {
    pub fn mode() -> &'static str {
        "auto"
    }
}
