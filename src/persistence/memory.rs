//! In-memory persistence — the default backend, grounded on the teacher's
//! `InMemoryDAL` (RwLock-guarded `Vec`s, eviction beyond a max size).

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::types::autotune::{AutoTuneState, Bounds};
use crate::types::hil::{HilState, Scene};
use crate::types::parameter::ParamMap;
use crate::types::state::SweepState;

use super::{Persister, PersistenceError, SceneStore, SweepCheckpoint};

/// Thread-safe, non-durable persister. Data is lost on restart.
pub struct InMemoryPersister {
    sweeps: RwLock<BTreeMap<String, SweepState>>,
    autotune_runs: RwLock<BTreeMap<String, AutoTuneState>>,
    hil_runs: RwLock<BTreeMap<String, HilState>>,
    checkpoints: RwLock<BTreeMap<String, SweepCheckpoint>>,
    last_suspended: RwLock<Option<String>>,
    max_sweeps: usize,
}

impl InMemoryPersister {
    pub fn new() -> Self {
        Self {
            sweeps: RwLock::new(BTreeMap::new()),
            autotune_runs: RwLock::new(BTreeMap::new()),
            hil_runs: RwLock::new(BTreeMap::new()),
            checkpoints: RwLock::new(BTreeMap::new()),
            last_suspended: RwLock::new(None),
            max_sweeps: 1000,
        }
    }
}

impl Default for InMemoryPersister {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Persister for InMemoryPersister {
    async fn save_sweep_start(&self, state: &SweepState) -> Result<(), PersistenceError> {
        let mut store = self.sweeps.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.insert(state.sweep_id.clone(), state.clone());
        if store.len() > self.max_sweeps {
            if let Some(oldest) = store.keys().next().cloned() {
                store.remove(&oldest);
            }
        }
        Ok(())
    }

    async fn save_sweep_complete(&self, state: &SweepState) -> Result<(), PersistenceError> {
        let mut store = self.sweeps.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.insert(state.sweep_id.clone(), state.clone());
        Ok(())
    }

    async fn save_autotune_complete(&self, state: &AutoTuneState) -> Result<(), PersistenceError> {
        let mut store = self.autotune_runs.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.insert(state.sweep_id.clone(), state.clone());
        Ok(())
    }

    async fn save_hil_complete(&self, state: &HilState) -> Result<(), PersistenceError> {
        let mut store = self.hil_runs.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.insert(state.sweep_id.clone(), state.clone());
        Ok(())
    }

    async fn save_sweep_checkpoint(&self, checkpoint: &SweepCheckpoint) -> Result<(), PersistenceError> {
        let mut store = self.checkpoints.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.insert(checkpoint.sweep_id.clone(), checkpoint.clone());
        let mut last = self.last_suspended.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        *last = Some(checkpoint.sweep_id.clone());
        Ok(())
    }

    async fn load_sweep_checkpoint(&self, sweep_id: &str) -> Result<SweepCheckpoint, PersistenceError> {
        let store = self.checkpoints.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.get(sweep_id).cloned().ok_or(PersistenceError::NotFound)
    }

    async fn get_suspended_sweep(&self) -> Result<Option<SweepCheckpoint>, PersistenceError> {
        let last = self.last_suspended.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        match last.as_ref() {
            Some(id) => {
                let store = self.checkpoints.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
                Ok(store.get(id).cloned())
            }
            None => Ok(None),
        }
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

/// In-memory scene store, keyed by scene id. Seeded in tests/CLI rather than
/// backed by any external catalogue.
pub struct InMemorySceneStore {
    scenes: RwLock<BTreeMap<String, Scene>>,
}

impl InMemorySceneStore {
    pub fn new() -> Self {
        Self {
            scenes: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, scene: Scene) {
        let mut store = self.scenes.write().unwrap_or_else(|e| e.into_inner());
        store.insert(scene.id.clone(), scene);
    }
}

impl Default for InMemorySceneStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SceneStore for InMemorySceneStore {
    async fn get_scene(&self, scene_id: &str) -> Result<Scene, PersistenceError> {
        let store = self.scenes.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.get(scene_id).cloned().ok_or(PersistenceError::NotFound)
    }

    async fn set_optimal_params(&self, scene_id: &str, params: &ParamMap) -> Result<(), PersistenceError> {
        let mut store = self.scenes.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        let scene = store.get_mut(scene_id).ok_or(PersistenceError::NotFound)?;
        scene.optimal_params = Some(params.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::state::SweepStatus;

    fn sample_state(id: &str) -> SweepState {
        SweepState {
            sweep_id: id.to_string(),
            status: SweepStatus::Running,
            ..Default::default()
        }
    }

    fn sample_request() -> crate::types::autotune::AutoTuneRequest {
        crate::types::autotune::AutoTuneRequest {
            params: vec![crate::types::autotune::AutoTuneParam {
                name: "noise".to_string(),
                kind: crate::types::parameter::ScalarKind::Float,
                start: 0.0,
                end: 1.0,
            }],
            values_per_param: 2,
            top_k: 1,
            max_rounds: 1,
            objective: "weighted".to_string(),
            weights: Default::default(),
            iterations: 1,
            interval: "1ms".to_string(),
            settle_time: "1ms".to_string(),
            data_source: crate::types::request::DataSource::Live,
            scene_id: None,
            persist_optimal_params: false,
        }
    }

    #[tokio::test]
    async fn save_and_checkpoint_roundtrip() {
        let persister = InMemoryPersister::new();
        persister.save_sweep_start(&sample_state("s1")).await.unwrap();

        let checkpoint = SweepCheckpoint {
            sweep_id: "s1".to_string(),
            round: 2,
            bounds: Bounds::new(),
            auto_tune_state: Default::default(),
            request: sample_request(),
        };
        persister.save_sweep_checkpoint(&checkpoint).await.unwrap();

        let loaded = persister.load_sweep_checkpoint("s1").await.unwrap();
        assert_eq!(loaded.round, 2);

        let suspended = persister.get_suspended_sweep().await.unwrap();
        assert_eq!(suspended.unwrap().sweep_id, "s1");
    }

    #[tokio::test]
    async fn missing_checkpoint_is_not_found() {
        let persister = InMemoryPersister::new();
        let err = persister.load_sweep_checkpoint("nope").await.unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound));
    }
}
