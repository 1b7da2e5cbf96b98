//! HIL-Tuner end-to-end scenarios (spec.md §8, properties 5-6).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lidar_tuner_os::autotune::{GroundTruthScorer, ScoreWithComponents};
use lidar_tuner_os::backend::mock::MockSensorBackend;
use lidar_tuner_os::backend::{AcceptanceMetrics, BackendError, GridStatus, ReplayConfig, SensorBackend, TrackingMetrics};
use lidar_tuner_os::hil::gates::LabelledTrack;
use lidar_tuner_os::hil::HilTuner;
use lidar_tuner_os::persistence::memory::InMemorySceneStore;
use lidar_tuner_os::persistence::{PersistenceError, SceneStore};
use lidar_tuner_os::types::autotune::AutoTuneParam;
use lidar_tuner_os::types::hil::{ContinueSignal, HilRequest, HilStatus, LabelProgress, Scene};
use lidar_tuner_os::types::objective::Weights;
use lidar_tuner_os::types::parameter::{ParamMap, ScalarKind};
use lidar_tuner_os::TunerError;

/// Wraps the mock backend with a caller-controlled label-progress snapshot,
/// so the class-coverage gate can be exercised deterministically.
struct LabelControlledBackend {
    inner: MockSensorBackend,
    by_class: std::sync::Mutex<BTreeMap<String, u32>>,
}

impl LabelControlledBackend {
    fn new(by_class: BTreeMap<String, u32>) -> Self {
        Self {
            inner: MockSensorBackend::new(),
            by_class: std::sync::Mutex::new(by_class),
        }
    }
}

#[async_trait]
impl SensorBackend for LabelControlledBackend {
    async fn sensor_id(&self) -> String {
        self.inner.sensor_id().await
    }
    async fn apply_tuning_keys(&self, keys: &BTreeMap<String, lidar_tuner_os::types::parameter::ScalarValue>) -> Result<(), BackendError> {
        self.inner.apply_tuning_keys(keys).await
    }
    async fn reseed(&self, seed: bool) -> Result<(), BackendError> {
        self.inner.reseed(seed).await
    }
    async fn start_live(&self) -> Result<(), BackendError> {
        self.inner.start_live().await
    }
    async fn start_replay(&self, config: &ReplayConfig) -> Result<String, BackendError> {
        self.inner.start_replay(config).await
    }
    async fn wait_replay_complete(&self, run_id: &str, timeout: Duration) -> Result<bool, BackendError> {
        self.inner.wait_replay_complete(run_id, timeout).await
    }
    async fn stop(&self) -> Result<(), BackendError> {
        self.inner.stop().await
    }
    async fn fetch_acceptance(&self) -> Result<AcceptanceMetrics, BackendError> {
        self.inner.fetch_acceptance().await
    }
    async fn list_acceptance_buckets(&self) -> Result<Vec<String>, BackendError> {
        self.inner.list_acceptance_buckets().await
    }
    async fn fetch_grid_status(&self) -> Result<GridStatus, BackendError> {
        self.inner.fetch_grid_status().await
    }
    async fn block_until_grid_settled(&self, timeout: Duration) -> Result<bool, BackendError> {
        self.inner.block_until_grid_settled(timeout).await
    }
    async fn fetch_tracking(&self) -> Result<TrackingMetrics, BackendError> {
        self.inner.fetch_tracking().await
    }
    async fn reset_acceptance(&self) -> Result<(), BackendError> {
        self.inner.reset_acceptance().await
    }
    async fn reset_grid(&self) -> Result<(), BackendError> {
        self.inner.reset_grid().await
    }
    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }
    async fn fetch_ground_truth(&self, scene_id: &str) -> Result<Vec<LabelledTrack>, BackendError> {
        self.inner.fetch_ground_truth(scene_id).await
    }
    async fn fetch_label_progress(&self, _scene_id: &str) -> Result<LabelProgress, BackendError> {
        let by_class = self.by_class.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let total: u32 = by_class.values().sum::<u32>().max(10);
        Ok(LabelProgress {
            total_tracks: total,
            labelled_tracks: total,
            by_class,
        })
    }
}

struct CountingSceneStore {
    inner: InMemorySceneStore,
    set_optimal_calls: AtomicUsize,
}

impl CountingSceneStore {
    fn new() -> Self {
        Self {
            inner: InMemorySceneStore::new(),
            set_optimal_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SceneStore for CountingSceneStore {
    async fn get_scene(&self, scene_id: &str) -> Result<Scene, PersistenceError> {
        self.inner.get_scene(scene_id).await
    }
    async fn set_optimal_params(&self, scene_id: &str, params: &ParamMap) -> Result<(), PersistenceError> {
        self.set_optimal_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_optimal_params(scene_id, params).await
    }
}

struct StubScorer;

#[async_trait]
impl GroundTruthScorer for StubScorer {
    async fn score(&self, _scene_id: &str, _run_id: &str, _weights: &Weights) -> Result<ScoreWithComponents, TunerError> {
        Ok(ScoreWithComponents { score: 0.5, components: None })
    }
}

fn sample_scene(min_class_coverage: BTreeMap<String, u32>) -> Scene {
    Scene {
        id: "scene-1".to_string(),
        sensor_id: "sensor-1".to_string(),
        capture_file: "scene.cap".to_string(),
        start_offset_secs: None,
        duration_secs: Some(1.0),
        reference_run_id: None,
        optimal_params: None,
        min_class_coverage,
    }
}

fn sample_request() -> HilRequest {
    HilRequest {
        scene_id: "scene-1".to_string(),
        params: vec![AutoTuneParam {
            name: "noise".to_string(),
            kind: ScalarKind::Float,
            start: 0.0,
            end: 1.0,
        }],
        top_k: 2,
        max_rounds: 1,
        iterations: 1,
        interval: "1ms".to_string(),
        settle_time: "1ms".to_string(),
        min_label_threshold: 0.0,
        min_temporal_spread_secs: 0.0,
        carry_over_labels: false,
        safety_net_poll_secs: 1,
        default_sweep_duration_mins: 30,
    }
}

async fn wait_for_status(tuner: &HilTuner, status: HilStatus, attempts: usize) -> bool {
    for _ in 0..attempts {
        let snapshot = tuner.snapshot().await;
        if std::mem::discriminant(&snapshot.status) == std::mem::discriminant(&status) {
            return true;
        }
        if matches!(snapshot.status, HilStatus::Failed) {
            panic!("hil-tuner failed early: {:?}", snapshot.error);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn happy_path_one_round_sets_optimal_params_exactly_once() {
    let backend: Arc<dyn SensorBackend> = Arc::new(LabelControlledBackend::new(BTreeMap::new()));
    let scene_store_impl = CountingSceneStore::new();
    scene_store_impl.inner.insert(sample_scene(BTreeMap::new()));
    let scene_store: Arc<dyn SceneStore> = Arc::new(scene_store_impl);

    let tuner = HilTuner::new(backend, Arc::clone(&scene_store), Arc::new(StubScorer));

    tuner.start(sample_request()).await.unwrap();
    assert!(wait_for_status(&tuner, HilStatus::AwaitingLabels, 100).await, "never reached awaiting-labels");

    tuner
        .continue_signal(ContinueSignal {
            next_sweep_duration_mins: 30,
            add_round: false,
        })
        .await
        .unwrap();

    assert!(wait_for_status(&tuner, HilStatus::Complete, 200).await, "never reached complete");

    let state = tuner.snapshot().await;
    assert_eq!(state.next_sweep_duration_mins, 30);
    assert_eq!(state.total_rounds, 1);
    assert!(matches!(state.status, HilStatus::Complete));
}

#[tokio::test]
async fn class_coverage_gate_rejects_continue_and_keeps_awaiting_labels() {
    let mut required = BTreeMap::new();
    required.insert("car".to_string(), 10);
    required.insert("pedestrian".to_string(), 5);

    let mut have = BTreeMap::new();
    have.insert("car".to_string(), 3);

    let backend: Arc<dyn SensorBackend> = Arc::new(LabelControlledBackend::new(have));
    let scene_store_impl = CountingSceneStore::new();
    scene_store_impl.inner.insert(sample_scene(required));
    let scene_store: Arc<dyn SceneStore> = Arc::new(scene_store_impl);

    let tuner = HilTuner::new(backend, scene_store, Arc::new(StubScorer));

    tuner.start(sample_request()).await.unwrap();
    assert!(wait_for_status(&tuner, HilStatus::AwaitingLabels, 100).await, "never reached awaiting-labels");

    let err = tuner
        .continue_signal(ContinueSignal {
            next_sweep_duration_mins: 0,
            add_round: false,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("class coverage"));

    let state = tuner.snapshot().await;
    assert!(matches!(state.status, HilStatus::AwaitingLabels));
}
