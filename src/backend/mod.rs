//! Sensor Backend Port — the abstraction boundary between the tuning control
//! plane and whatever drives the actual LiDAR sensor (spec.md §4.B).
//!
//! Grounded on the teacher's `acquisition::SensorSource` trait: a small
//! `async_trait` interface with a dedicated error enum, implemented in this
//! crate by [`mock::MockSensorBackend`] and (in production deployments) by a
//! process-boundary-crossing adapter outside this crate's scope.

pub mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::parameter::ScalarValue;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("sensor connection failed: {0}")]
    ConnectionFailed(String),

    #[error("sensor backend timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("tuning key '{0}' rejected by backend: {1}")]
    InvalidTuningKey(String, String),

    #[error("capture file '{0}' not found")]
    CaptureFileNotFound(String),

    #[error("replay failed: {0}")]
    ReplayFailed(String),

    #[error("metrics unavailable: {0}")]
    MetricsUnavailable(String),
}

/// Four parallel per-bucket arrays, as the backend reports them — accept and
/// total counts overall, and accept/total per spatial bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcceptanceMetrics {
    pub accept: Vec<f64>,
    pub total: Vec<f64>,
    pub bucket_accept: BTreeMap<String, f64>,
    pub bucket_total: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GridStatus {
    pub nonzero_cells: f64,
    pub total_cells: f64,
    pub settled: bool,
}

/// Tracking health metrics, one field per name in
/// [`crate::config::defaults::TRACK_HEALTH_FIELDS`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    pub track_count: f64,
    pub track_duration_avg_s: f64,
    pub track_switch_rate: f64,
    pub id_swap_rate: f64,
    pub fragmentation_rate: f64,
    pub false_track_rate: f64,
    pub miss_rate: f64,
    pub confirmed_track_ratio: f64,
}

impl TrackingMetrics {
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        let mut m = BTreeMap::new();
        m.insert("track_count".into(), self.track_count);
        m.insert("track_duration_avg_s".into(), self.track_duration_avg_s);
        m.insert("track_switch_rate".into(), self.track_switch_rate);
        m.insert("id_swap_rate".into(), self.id_swap_rate);
        m.insert("fragmentation_rate".into(), self.fragmentation_rate);
        m.insert("false_track_rate".into(), self.false_track_rate);
        m.insert("miss_rate".into(), self.miss_rate);
        m.insert("confirmed_track_ratio".into(), self.confirmed_track_ratio);
        m
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SpeedMode {
    Fastest,
    Realtime,
    Ratio(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub filename: String,
    pub start_offset_secs: f64,
    pub duration_secs: f64,
    pub max_retries: u32,
    pub analysis_mode: bool,
    pub speed: SpeedMode,
    pub disable_recording: bool,
}

/// The Sensor Backend Port. spec.md §4.B names 13 operations, including
/// `reset acceptance counters` and `reset grid` as two independent calls
/// (the Runner must be able to warn on each failure separately rather than
/// collapsing them into one `reset_metrics`).
#[async_trait]
pub trait SensorBackend: Send + Sync {
    /// 1. Identify the sensor this backend instance is bound to.
    async fn sensor_id(&self) -> String;

    /// 2. Apply a batch of tuning-key assignments to the live sensor.
    async fn apply_tuning_keys(&self, keys: &BTreeMap<String, ScalarValue>) -> Result<(), BackendError>;

    /// 3. Re-seed the sensor's internal RNG/state (used by `seed_control`).
    async fn reseed(&self, seed: bool) -> Result<(), BackendError>;

    /// 4. Start a live acquisition stream.
    async fn start_live(&self) -> Result<(), BackendError>;

    /// 5. Start replaying a capture file.
    async fn start_replay(&self, config: &ReplayConfig) -> Result<String, BackendError>;

    /// 6. Block until the named replay run completes or the timeout elapses.
    async fn wait_replay_complete(&self, run_id: &str, timeout: std::time::Duration) -> Result<bool, BackendError>;

    /// 7. Stop whatever acquisition/replay is currently active.
    async fn stop(&self) -> Result<(), BackendError>;

    /// 8. Fetch the current acceptance metrics snapshot.
    async fn fetch_acceptance(&self) -> Result<AcceptanceMetrics, BackendError>;

    /// 9. List the spatial bucket names the acceptance metrics are keyed by.
    async fn list_acceptance_buckets(&self) -> Result<Vec<String>, BackendError>;

    /// 10. Fetch the current occupancy-grid status.
    async fn fetch_grid_status(&self) -> Result<GridStatus, BackendError>;

    /// 11. Block until the occupancy grid reports settled or the timeout
    /// elapses. `Ok(true)` means settled, `Ok(false)` means the timeout
    /// elapsed without settling (not a hard error).
    async fn block_until_grid_settled(&self, timeout: std::time::Duration) -> Result<bool, BackendError>;

    /// 12. Fetch the current tracking-health metrics.
    async fn fetch_tracking(&self) -> Result<TrackingMetrics, BackendError>;

    /// 13. Reset accumulated acceptance counters between combinations.
    async fn reset_acceptance(&self) -> Result<(), BackendError>;

    /// 14. Reset the occupancy grid between combinations.
    async fn reset_grid(&self) -> Result<(), BackendError>;

    /// 15. Report whether the backend is presently connected.
    async fn is_connected(&self) -> bool;

    /// 16. Fetch ground-truth labelled tracks for a scene (HIL-Tuner only).
    async fn fetch_ground_truth(&self, scene_id: &str) -> Result<Vec<crate::hil::gates::LabelledTrack>, BackendError>;

    /// 17. Fetch current label progress for a scene (HIL-Tuner only).
    async fn fetch_label_progress(&self, scene_id: &str) -> Result<crate::types::hil::LabelProgress, BackendError>;
}
