//! Human-in-the-Loop Tuner types (3 / 4.G).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::autotune::{AutoTuneParam, AutoTuneState, RoundSummary};
use super::parameter::ParamMap;
use super::result::Recommendation;

/// A scene the HIL-Tuner optimises against. Consumed from (and written back
/// to) the scene store — see [`crate::persistence::SceneStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub sensor_id: String,
    pub capture_file: String,
    #[serde(default)]
    pub start_offset_secs: Option<f64>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub reference_run_id: Option<String>,
    #[serde(default)]
    pub optimal_params: Option<ParamMap>,
    /// Per-class minimum labelled-track floor for the class-coverage gate.
    #[serde(default)]
    pub min_class_coverage: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelProgress {
    pub total_tracks: u32,
    pub labelled_tracks: u32,
    pub by_class: BTreeMap<String, u32>,
}

impl LabelProgress {
    pub fn percent(&self) -> f64 {
        if self.total_tracks == 0 {
            0.0
        } else {
            self.labelled_tracks as f64 / self.total_tracks as f64
        }
    }
}

/// Signal sent via the `Continue` RPC to wake the tuner from `awaiting-labels`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContinueSignal {
    pub next_sweep_duration_mins: u32,
    pub add_round: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HilStatus {
    Idle,
    RunningReference,
    AwaitingLabels,
    RunningSweep,
    Complete,
    Failed,
}

impl Default for HilStatus {
    fn default() -> Self {
        HilStatus::Idle
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HilRequest {
    pub scene_id: String,
    pub params: Vec<AutoTuneParam>,
    pub top_k: u32,
    pub max_rounds: u32,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub settle_time: String,
    #[serde(default = "default_min_label_threshold")]
    pub min_label_threshold: f64,
    #[serde(default)]
    pub min_temporal_spread_secs: f64,
    #[serde(default)]
    pub carry_over_labels: bool,
    #[serde(default = "default_label_poll_secs")]
    pub safety_net_poll_secs: u64,
    #[serde(default = "default_sweep_duration_mins")]
    pub default_sweep_duration_mins: u32,
}

fn default_min_label_threshold() -> f64 {
    crate::config::defaults::DEFAULT_MIN_LABEL_THRESHOLD
}
fn default_label_poll_secs() -> u64 {
    crate::config::defaults::DEFAULT_LABEL_POLL_SECS
}
fn default_sweep_duration_mins() -> u32 {
    30
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HilState {
    pub sweep_id: String,
    pub status: HilStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub reference_run_id: Option<String>,
    pub label_progress: Option<LabelProgress>,
    pub label_wait_deadline: Option<DateTime<Utc>>,
    pub sweep_deadline: Option<DateTime<Utc>>,
    pub auto_tune_state: Option<AutoTuneState>,
    pub round_history: Vec<RoundSummary>,
    pub recommendation: Option<Recommendation>,
    pub error: Option<String>,
    pub min_label_fraction: f64,
    pub labels_carried_over: u32,
    pub next_sweep_duration_mins: u32,
    pub current_params: ParamMap,
}

impl HilState {
    pub fn mode() -> &'static str {
        "hil"
    }
}
