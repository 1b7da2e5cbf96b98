//! Crate-wide error type.
//!
//! Sentinel variants exist because callers (and the testable properties in
//! `spec.md` §8) match on exact substrings rather than enum discriminants —
//! the `Display` impl below is load-bearing, not decorative.

use thiserror::Error;

use crate::backend::BackendError;
use crate::params::ParamError;
use crate::persistence::PersistenceError;

#[derive(Error, Debug)]
pub enum TunerError {
    /// A tuner was asked to `Start` while already running.
    #[error("sweep already in progress")]
    SweepAlreadyRunning,

    #[error("max_rounds must not exceed 10, got {0}")]
    MaxRoundsExceeded(u32),

    #[error("values_per_param out of range: {0}")]
    ValuesPerParamOutOfRange(u32),

    #[error("too many parameters: {0}")]
    TooManyParameters(usize),

    #[error("parameter range too large: {0}")]
    ParameterRangeTooLarge(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid settle_time: {0}")]
    InvalidSettleTime(String),

    #[error("iterations must not exceed 500, got {0}")]
    IterationsOutOfRange(u32),

    #[error("top_k out of range: {0}")]
    TopKOutOfRange(u32),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("marshalling sweep request: {0}")]
    Marshalling(String),

    #[error("sweep stopped at combination {0}")]
    Cancelled(usize),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("no persister configured")]
    NoPersister,

    #[error("checkpoint not found for id {0}")]
    CheckpointNotFound(String),

    #[error("corrupted checkpoint: {0}")]
    CorruptedCheckpoint(String),

    #[error("scene fetch failed: {0}")]
    SceneFetch(String),

    #[error("ground-truth scorer not configured")]
    ScorerNotConfigured,

    #[error("gate failure: {0}")]
    Gate(#[from] crate::hil::gates::GateError),

    #[error("deadline expired")]
    DeadlineExpired,
}
