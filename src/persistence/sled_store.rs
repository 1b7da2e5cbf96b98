//! Durable `sled`-backed persister, enabled by the `sled-persister` feature.
//!
//! Grounded on the teacher's note that `InMemoryDAL` is the testing backend
//! and "current sled backend can implement this trait" — here that promise
//! is made real. Each sweep/checkpoint is serialised with `serde_json` and
//! stored under its id in a dedicated tree.

use async_trait::async_trait;
use sled::Db;

use crate::types::autotune::AutoTuneState;
use crate::types::hil::HilState;
use crate::types::state::SweepState;

use super::{Persister, PersistenceError, SweepCheckpoint};

pub struct SledPersister {
    db: Db,
}

impl SledPersister {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PersistenceError> {
        let db = sled::open(path).map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    fn sweeps_tree(&self) -> Result<sled::Tree, PersistenceError> {
        self.db.open_tree("sweeps").map_err(|e| PersistenceError::Storage(e.to_string()))
    }

    fn checkpoints_tree(&self) -> Result<sled::Tree, PersistenceError> {
        self.db.open_tree("checkpoints").map_err(|e| PersistenceError::Storage(e.to_string()))
    }

    fn meta_tree(&self) -> Result<sled::Tree, PersistenceError> {
        self.db.open_tree("meta").map_err(|e| PersistenceError::Storage(e.to_string()))
    }

    fn autotune_tree(&self) -> Result<sled::Tree, PersistenceError> {
        self.db.open_tree("autotune_runs").map_err(|e| PersistenceError::Storage(e.to_string()))
    }

    fn hil_tree(&self) -> Result<sled::Tree, PersistenceError> {
        self.db.open_tree("hil_runs").map_err(|e| PersistenceError::Storage(e.to_string()))
    }
}

#[async_trait]
impl Persister for SledPersister {
    async fn save_sweep_start(&self, state: &SweepState) -> Result<(), PersistenceError> {
        let tree = self.sweeps_tree()?;
        let bytes = serde_json::to_vec(state).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        tree.insert(state.sweep_id.as_bytes(), bytes)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn save_sweep_complete(&self, state: &SweepState) -> Result<(), PersistenceError> {
        self.save_sweep_start(state).await
    }

    async fn save_autotune_complete(&self, state: &AutoTuneState) -> Result<(), PersistenceError> {
        let tree = self.autotune_tree()?;
        let bytes = serde_json::to_vec(state).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        tree.insert(state.sweep_id.as_bytes(), bytes)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn save_hil_complete(&self, state: &HilState) -> Result<(), PersistenceError> {
        let tree = self.hil_tree()?;
        let bytes = serde_json::to_vec(state).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        tree.insert(state.sweep_id.as_bytes(), bytes)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn save_sweep_checkpoint(&self, checkpoint: &SweepCheckpoint) -> Result<(), PersistenceError> {
        let tree = self.checkpoints_tree()?;
        let bytes = serde_json::to_vec(checkpoint).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        tree.insert(checkpoint.sweep_id.as_bytes(), bytes)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        let meta = self.meta_tree()?;
        meta.insert("last_suspended", checkpoint.sweep_id.as_bytes())
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn load_sweep_checkpoint(&self, sweep_id: &str) -> Result<SweepCheckpoint, PersistenceError> {
        let tree = self.checkpoints_tree()?;
        let bytes = tree
            .get(sweep_id.as_bytes())
            .map_err(|e| PersistenceError::Storage(e.to_string()))?
            .ok_or(PersistenceError::NotFound)?;
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Serialization(e.to_string()))
    }

    async fn get_suspended_sweep(&self) -> Result<Option<SweepCheckpoint>, PersistenceError> {
        let meta = self.meta_tree()?;
        let id_bytes = match meta.get("last_suspended").map_err(|e| PersistenceError::Storage(e.to_string()))? {
            Some(b) => b,
            None => return Ok(None),
        };
        let sweep_id = String::from_utf8_lossy(&id_bytes).to_string();
        match self.load_sweep_checkpoint(&sweep_id).await {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(PersistenceError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
