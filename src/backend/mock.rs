//! In-process mock sensor backend, grounded on the teacher's
//! `StdinSensorSource` / Python simulator pattern — a source that produces
//! statistically plausible readings instead of a real connection, for tests
//! and the CLI's `--mock` mode.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::hil::gates::LabelledTrack;
use crate::types::hil::LabelProgress;
use crate::types::parameter::ScalarValue;

use super::{AcceptanceMetrics, BackendError, GridStatus, ReplayConfig, SensorBackend, TrackingMetrics};

/// Deterministic-ish mock backend: acceptance improves as `noise` tuning keys
/// shrink, modelled as a smooth sigmoid plus Gaussian jitter so combinations
/// produce stable, comparable scores across iterations.
pub struct MockSensorBackend {
    id: String,
    connected: AtomicBool,
    run_counter: AtomicU64,
    applied: Mutex<BTreeMap<String, ScalarValue>>,
}

impl MockSensorBackend {
    pub fn new() -> Self {
        Self {
            id: "mock-sensor".to_string(),
            connected: AtomicBool::new(false),
            run_counter: AtomicU64::new(0),
            applied: Mutex::new(BTreeMap::new()),
        }
    }

    fn noise_level(&self) -> f64 {
        self.applied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get("noise")
            .and_then(ScalarValue::as_f64)
            .unwrap_or(0.5)
    }
}

impl Default for MockSensorBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorBackend for MockSensorBackend {
    async fn sensor_id(&self) -> String {
        self.id.clone()
    }

    async fn apply_tuning_keys(&self, keys: &BTreeMap<String, ScalarValue>) -> Result<(), BackendError> {
        let mut applied = self.applied.lock().unwrap_or_else(|e| e.into_inner());
        for (k, v) in keys {
            applied.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn reseed(&self, _seed: bool) -> Result<(), BackendError> {
        Ok(())
    }

    async fn start_live(&self) -> Result<(), BackendError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start_replay(&self, config: &ReplayConfig) -> Result<String, BackendError> {
        self.connected.store(true, Ordering::SeqCst);
        let id = self.run_counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock-run-{id}-{}", config.filename))
    }

    async fn wait_replay_complete(&self, _run_id: &str, _timeout: std::time::Duration) -> Result<bool, BackendError> {
        Ok(true)
    }

    async fn stop(&self) -> Result<(), BackendError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_acceptance(&self) -> Result<AcceptanceMetrics, BackendError> {
        let mut rng = rand::thread_rng();
        let noise = self.noise_level().clamp(0.0, 1.0);
        let base = 1.0 - noise;
        let dist = Normal::new(base, 0.05).map_err(|e| BackendError::MetricsUnavailable(e.to_string()))?;

        let mut accept = Vec::with_capacity(4);
        let mut total = Vec::with_capacity(4);
        let mut bucket_accept = BTreeMap::new();
        let mut bucket_total = BTreeMap::new();
        for i in 0..4 {
            let ratio: f64 = dist.sample(&mut rng).clamp(0.0, 1.0);
            let t = 100.0;
            accept.push(ratio * t);
            total.push(t);
            bucket_accept.insert(format!("bucket_{i}"), ratio * t);
            bucket_total.insert(format!("bucket_{i}"), t);
        }

        Ok(AcceptanceMetrics {
            accept,
            total,
            bucket_accept,
            bucket_total,
        })
    }

    async fn fetch_grid_status(&self) -> Result<GridStatus, BackendError> {
        let mut rng = rand::thread_rng();
        let noise = self.noise_level().clamp(0.0, 1.0);
        let total_cells = 256.0;
        let nonzero_cells = (total_cells * (1.0 - noise * 0.6)).max(0.0) + rng.gen_range(-5.0..5.0);
        Ok(GridStatus {
            nonzero_cells: nonzero_cells.clamp(0.0, total_cells),
            total_cells,
            settled: true,
        })
    }

    async fn list_acceptance_buckets(&self) -> Result<Vec<String>, BackendError> {
        Ok((0..4).map(|i| format!("bucket_{i}")).collect())
    }

    async fn block_until_grid_settled(&self, _timeout: std::time::Duration) -> Result<bool, BackendError> {
        Ok(true)
    }

    async fn fetch_tracking(&self) -> Result<TrackingMetrics, BackendError> {
        let mut rng = rand::thread_rng();
        let noise = self.noise_level().clamp(0.0, 1.0);
        Ok(TrackingMetrics {
            track_count: rng.gen_range(5.0..20.0),
            track_duration_avg_s: rng.gen_range(2.0..30.0),
            track_switch_rate: noise * rng.gen_range(0.0..0.2),
            id_swap_rate: noise * rng.gen_range(0.0..0.1),
            fragmentation_rate: noise * rng.gen_range(0.0..0.15),
            false_track_rate: noise * rng.gen_range(0.0..0.1),
            miss_rate: noise * rng.gen_range(0.0..0.2),
            confirmed_track_ratio: (1.0 - noise).clamp(0.0, 1.0),
        })
    }

    async fn reset_acceptance(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn reset_grid(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn fetch_ground_truth(&self, _scene_id: &str) -> Result<Vec<LabelledTrack>, BackendError> {
        Ok(Vec::new())
    }

    async fn fetch_label_progress(&self, _scene_id: &str) -> Result<LabelProgress, BackendError> {
        Ok(LabelProgress {
            total_tracks: 10,
            labelled_tracks: 10,
            by_class: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn apply_then_acceptance_reflects_noise() {
        let backend = MockSensorBackend::new();
        let mut keys = BTreeMap::new();
        keys.insert("noise".to_string(), ScalarValue::Float(0.0));
        backend.apply_tuning_keys(&keys).await.unwrap();
        let metrics = backend.fetch_acceptance().await.unwrap();
        assert_eq!(metrics.accept.len(), 4);
    }

    #[tokio::test]
    async fn connection_lifecycle() {
        let backend = MockSensorBackend::new();
        assert!(!backend.is_connected().await);
        backend.start_live().await.unwrap();
        assert!(backend.is_connected().await);
        backend.stop().await.unwrap();
        assert!(!backend.is_connected().await);
    }
}
