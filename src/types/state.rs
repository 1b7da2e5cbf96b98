//! SweepState — the Runner's polled snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::SweepRequest;
use super::result::ComboResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Idle,
    Running,
    Complete,
    Error,
}

impl Default for SweepStatus {
    fn default() -> Self {
        SweepStatus::Idle
    }
}

/// Every field here is plain owned data (`String`, `Vec`, `Option`, no
/// `Arc`/`Rc`) precisely so that `#[derive(Clone)]` *is* the deep copy
/// [`crate::runner::SweepRunner::snapshot`] promises callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepState {
    pub sweep_id: String,
    pub status: SweepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_combos: usize,
    pub completed_combos: usize,
    pub current_combo: Option<usize>,
    pub results: Vec<ComboResult>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub request: Option<SweepRequest>,
}
