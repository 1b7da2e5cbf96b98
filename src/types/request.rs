//! SweepRequest and its supporting enums (3.A / 4.E / 6).

use serde::{Deserialize, Serialize};

use super::parameter::ParameterDescriptor;

/// Runner traversal mode. `Single`/`Multi` drive the legacy 3-axis
/// (noise/closeness/neighbour) product; `Generic` drives an N-ary
/// `params` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    Single,
    Multi,
    Generic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleMode {
    #[default]
    PerCombo,
    Once,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedControl {
    #[default]
    False,
    True,
    AlternateEachCombo,
}

impl SeedControl {
    /// Resolve the boolean seed flag to apply for combination `index` (0-based).
    pub fn resolve(&self, index: usize) -> bool {
        match self {
            SeedControl::True => true,
            SeedControl::False => false,
            SeedControl::AlternateEachCombo => index % 2 != 0,
        }
    }
}

/// `-1` duration in `CaptureFile::duration_secs` means "play the full file".
pub const FULL_FILE_DURATION: f64 = -1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Live,
    CaptureFile {
        /// Basename only — path traversal is rejected upstream of this type.
        filename: String,
        #[serde(default)]
        start_offset_secs: f64,
        #[serde(default = "default_full_duration")]
        duration_secs: f64,
        #[serde(default)]
        max_retries: u32,
    },
}

fn default_full_duration() -> f64 {
    FULL_FILE_DURATION
}

impl DataSource {
    pub fn is_capture_file(&self) -> bool {
        matches!(self, DataSource::CaptureFile { .. })
    }
}

/// Input to [`crate::runner::SweepRunner::start`] — either the canonical
/// typed request or an untyped map, converted by round-tripping through
/// `serde_json` so tag-based decoding remains the single source of truth
/// for field names and defaults (see spec.md §6/§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRequest {
    pub mode: SweepMode,

    #[serde(default)]
    pub noise_values: Vec<f64>,
    #[serde(default)]
    pub closeness_values: Vec<f64>,
    #[serde(default)]
    pub neighbour_values: Vec<i64>,

    #[serde(default)]
    pub params: Vec<ParameterDescriptor>,

    pub data_source: DataSource,

    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub settle_time: String,
    #[serde(default)]
    pub settle_mode: SettleMode,
    #[serde(default)]
    pub seed_control: SeedControl,
    #[serde(default)]
    pub enable_recording: bool,
}

/// Decode a [`SweepRequest`] from either a typed value or an untyped JSON
/// map. Non-serialisable values (functions, channels — not representable
/// in `serde_json::Value` to begin with) surface as a marshalling error.
pub fn decode_request(value: serde_json::Value) -> Result<SweepRequest, crate::TunerError> {
    serde_json::from_value(value).map_err(|e| crate::TunerError::Marshalling(e.to_string()))
}
