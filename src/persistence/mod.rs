//! Persistence Layer — pluggable sweep-checkpoint and scene storage
//! (spec.md §4.H).
//!
//! Grounded on the teacher's `storage::persistence::PersistenceLayer` trait
//! and `InMemoryDAL`: a small trait abstracting the storage backend plus an
//! in-memory default, here made `async_trait` since callers already run
//! inside `tokio` tasks.

pub mod memory;
#[cfg(feature = "sled-persister")]
pub mod sled_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::autotune::{AutoTuneRequest, AutoTuneState, Bounds};
use crate::types::hil::HilState;
use crate::types::parameter::ParamMap;
use crate::types::state::SweepState;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found")]
    NotFound,
}

/// A suspended sweep's resumable state — what the Auto-Tuner writes before
/// yielding and what `GetSuspendedSweep`/`LoadSweepCheckpoint` read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepCheckpoint {
    pub sweep_id: String,
    pub round: u32,
    pub bounds: Bounds,
    pub auto_tune_state: AutoTuneState,
    /// The serialised original request — `Resume` re-validates this before
    /// continuing from `round + 1`.
    pub request: AutoTuneRequest,
}

/// Pluggable persistence backend for sweep history and checkpoints.
///
/// Implementations must be `Send + Sync` for shared access across tasks.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn save_sweep_start(&self, state: &SweepState) -> Result<(), PersistenceError>;

    async fn save_sweep_complete(&self, state: &SweepState) -> Result<(), PersistenceError>;

    /// Record the terminal state of an Auto-Tuner run. Every terminal
    /// transition (complete or error) attempts exactly one call here when a
    /// persister is configured, mirroring `save_sweep_complete`'s contract.
    async fn save_autotune_complete(&self, state: &AutoTuneState) -> Result<(), PersistenceError>;

    /// Record the terminal state of a HIL-Tuner run, same contract as
    /// `save_autotune_complete`.
    async fn save_hil_complete(&self, state: &HilState) -> Result<(), PersistenceError>;

    async fn save_sweep_checkpoint(&self, checkpoint: &SweepCheckpoint) -> Result<(), PersistenceError>;

    async fn load_sweep_checkpoint(&self, sweep_id: &str) -> Result<SweepCheckpoint, PersistenceError>;

    /// The most recently suspended sweep, if any — used to offer resume on
    /// restart.
    async fn get_suspended_sweep(&self) -> Result<Option<SweepCheckpoint>, PersistenceError>;

    fn backend_name(&self) -> &'static str;
}

/// Storage for HIL-Tuner scenes and their optimal-parameter results.
#[async_trait]
pub trait SceneStore: Send + Sync {
    async fn get_scene(&self, scene_id: &str) -> Result<crate::types::hil::Scene, PersistenceError>;

    async fn set_optimal_params(&self, scene_id: &str, params: &ParamMap) -> Result<(), PersistenceError>;
}
