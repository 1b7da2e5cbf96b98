//! System-wide default constants, grouped by subsystem.
//!
//! Centralises the magic numbers spec.md scatters through §3/§4/§5/§6.

// ============================================================================
// Parameter Model (4.A)
// ============================================================================

/// Cap on a single descriptor's expanded value list.
pub const MAX_EXPANDED_VALUES: usize = 10_000;

/// Cap on a Cartesian product's total combination count.
pub const MAX_COMBOS: u128 = 1_000;

/// Cap on the number of parameters in generic mode.
pub const MAX_GENERIC_PARAMS: usize = 10;

/// Cap on tuning keys applied per combination.
pub const MAX_TUNING_KEYS_PER_APPLY: usize = 50;

// ============================================================================
// Sweep Runner (4.E)
// ============================================================================

/// Default sampling iterations per combination when unset/zero.
pub const DEFAULT_ITERATIONS: u32 = 30;

/// Hard ceiling on sampling iterations per combination.
pub const MAX_ITERATIONS: u32 = 500;

/// Replay completion wait timeout (seconds) — expiry is a warning, not fatal.
pub const REPLAY_COMPLETE_TIMEOUT_SECS: u64 = 120;

/// Settle wait used for combos after the first one in "settle-once" mode.
pub const SETTLE_ONCE_SUBSEQUENT_SECS: u64 = 2;

// ============================================================================
// Auto-Tuner (4.F)
// ============================================================================

pub const MIN_AUTOTUNE_PARAMS: usize = 1;
pub const MAX_AUTOTUNE_PARAMS: usize = 10;
pub const MIN_VALUES_PER_PARAM: u32 = 2;
pub const MAX_VALUES_PER_PARAM: u32 = 20;
pub const MIN_TOP_K: u32 = 1;
pub const MAX_TOP_K: u32 = 50;
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 10;

/// Minimum margin fraction applied to narrowed bounds (`max(range * 0.1, margin_floor)`).
pub const NARROW_MARGIN_FRACTION: f64 = 0.1;
pub const NARROW_MARGIN_FLOOR: f64 = 0.001;

// ============================================================================
// Human-in-the-Loop Tuner (4.G)
// ============================================================================

/// Default minimum acceptable label fraction before `Continue` is accepted.
pub const DEFAULT_MIN_LABEL_THRESHOLD: f64 = 0.9;

/// Safety-net poll interval while `awaiting-labels`.
pub const DEFAULT_LABEL_POLL_SECS: u64 = 10;

/// Minimum acceptable temporal IoU for label carry-over between reference runs.
pub const CARRYOVER_MIN_IOU: f64 = 0.5;

/// Labeller identity recorded on carried-over labels.
pub const CARRYOVER_LABELLER: &str = "hil-carryover";

/// Confidence recorded on carried-over labels.
pub const CARRYOVER_CONFIDENCE: f64 = 1.0;

/// Round-1 detection-rate weight multiplier (favours recall on the first pass).
pub const ROUND1_DETECTION_RATE_MULTIPLIER: f64 = 1.5;

/// Round-1 false-positive weight multiplier.
pub const ROUND1_FALSE_POSITIVE_MULTIPLIER: f64 = 0.5;

// ============================================================================
// Sampler (4.C)
// ============================================================================

/// Track-health metric names, in stable report order.
pub const TRACK_HEALTH_FIELDS: [&str; 8] = [
    "track_count",
    "track_duration_avg_s",
    "track_switch_rate",
    "id_swap_rate",
    "fragmentation_rate",
    "false_track_rate",
    "miss_rate",
    "confirmed_track_ratio",
];
