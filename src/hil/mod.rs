//! Human-in-the-Loop Tuner — reference-run + label-wait + auto-tune
//! orchestration across multiple rounds (spec.md §4.G).

pub mod carryover;
pub mod gates;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::autotune::{AutoTuner, GroundTruthScorer};
use crate::backend::{ReplayConfig, SensorBackend, SpeedMode};
use crate::config::defaults;
use crate::persistence::{Persister, SceneStore};
use crate::types::autotune::{AutoTuneParam, AutoTuneRequest};
use crate::types::hil::{ContinueSignal, HilRequest, HilState, HilStatus};
use crate::types::objective::Weights;
use crate::types::parameter::{ParamMap, ScalarKind, ScalarValue};
use crate::types::request::{DataSource, FULL_FILE_DURATION};
use crate::TunerError;

use gates::{check_class_coverage, check_label_fraction, check_temporal_spread};

pub struct HilTuner {
    backend: Arc<dyn SensorBackend>,
    persister: Option<Arc<dyn Persister>>,
    scene_store: Arc<dyn SceneStore>,
    ground_truth_scorer: Arc<dyn GroundTruthScorer>,
    state: Arc<RwLock<HilState>>,
    current_request: std::sync::Mutex<Option<HilRequest>>,
    cancel: std::sync::Mutex<Option<CancellationToken>>,
    continue_tx: std::sync::Mutex<Option<mpsc::Sender<ContinueSignal>>>,
    label_update_tx: std::sync::Mutex<Option<mpsc::Sender<()>>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl HilTuner {
    pub fn new(backend: Arc<dyn SensorBackend>, scene_store: Arc<dyn SceneStore>, ground_truth_scorer: Arc<dyn GroundTruthScorer>) -> Self {
        Self {
            backend,
            persister: None,
            scene_store,
            ground_truth_scorer,
            state: Arc::new(RwLock::new(HilState::default())),
            current_request: std::sync::Mutex::new(None),
            cancel: std::sync::Mutex::new(None),
            continue_tx: std::sync::Mutex::new(None),
            label_update_tx: std::sync::Mutex::new(None),
            task: std::sync::Mutex::new(None),
        }
    }

    pub fn with_persister(mut self, persister: Arc<dyn Persister>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub async fn get_sweep_id(&self) -> String {
        self.state.read().await.sweep_id.clone()
    }

    pub async fn snapshot(&self) -> HilState {
        self.state.read().await.clone()
    }

    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }

    /// Push notification that new labels landed — wakes Phase 2 to re-poll,
    /// without itself attempting the gates.
    pub fn notify_label_update(&self) {
        if let Some(tx) = self.label_update_tx.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = tx.try_send(());
        }
    }

    pub async fn start(&self, request: HilRequest) -> Result<(), TunerError> {
        {
            let state = self.state.read().await;
            if matches!(
                state.status,
                HilStatus::RunningReference | HilStatus::AwaitingLabels | HilStatus::RunningSweep
            ) {
                return Err(TunerError::SweepAlreadyRunning);
            }
        }

        validate_request(&request)?;

        let sweep_id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());

        let (continue_tx, continue_rx) = mpsc::channel(1);
        let (label_tx, label_rx) = mpsc::channel(1);
        *self.continue_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(continue_tx);
        *self.label_update_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(label_tx);
        *self.current_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        {
            let mut state = self.state.write().await;
            *state = HilState {
                sweep_id: sweep_id.clone(),
                status: HilStatus::RunningReference,
                total_rounds: request.max_rounds,
                min_label_fraction: request.min_label_threshold,
                next_sweep_duration_mins: request.default_sweep_duration_mins,
                ..Default::default()
            };
        }

        let backend = self.backend.clone();
        let scene_store = self.scene_store.clone();
        let scorer = self.ground_truth_scorer.clone();
        let state = self.state.clone();
        let persister = self.persister.clone();

        let body = tokio::spawn(async move {
            run_hil(backend, scene_store, scorer, persister, state, sweep_id, request, continue_rx, label_rx, token).await
        });

        // Panic-safety boundary: a separate supervisor awaits the worker and,
        // if it panicked rather than returned, transitions state → failed and
        // still attempts the one completion-persistence call the normal path
        // would have made.
        let supervised_state = self.state.clone();
        let supervised_persister = self.persister.clone();
        tokio::spawn(async move {
            if let Err(join_err) = body.await {
                if join_err.is_panic() {
                    let snapshot = {
                        let mut guard = supervised_state.write().await;
                        guard.status = HilStatus::Failed;
                        guard.error = Some(format!("hil-tuner panicked: {join_err}"));
                        guard.clone()
                    };
                    if let Some(persister) = &supervised_persister {
                        if let Err(e) = persister.save_hil_complete(&snapshot).await {
                            tracing::warn!(error = %e, "failed to persist hil-tuner panic completion");
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Accept or reject a `Continue` signal. Gates run synchronously here so
    /// the caller gets an immediate, descriptive error; only a passing
    /// signal is forwarded to the background task.
    pub async fn continue_signal(&self, signal: ContinueSignal) -> Result<(), TunerError> {
        let request = self
            .current_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| TunerError::Validation("no hil sweep in progress".to_string()))?;

        {
            let state = self.state.read().await;
            if !matches!(state.status, HilStatus::AwaitingLabels) {
                return Err(TunerError::Validation("not awaiting labels".to_string()));
            }
        }

        let scene = self
            .scene_store
            .get_scene(&request.scene_id)
            .await
            .map_err(|e| TunerError::SceneFetch(e.to_string()))?;

        let progress = self.backend.fetch_label_progress(&request.scene_id).await.map_err(TunerError::from)?;

        check_label_fraction(&progress, request.min_label_threshold).map_err(TunerError::from)?;
        check_class_coverage(&progress, &scene.min_class_coverage).map_err(TunerError::from)?;

        let tracks = self.backend.fetch_ground_truth(&request.scene_id).await.map_err(TunerError::from)?;
        check_temporal_spread(&tracks, request.min_temporal_spread_secs).map_err(TunerError::from)?;

        {
            let mut state = self.state.write().await;
            state.label_progress = Some(progress);
            if signal.add_round {
                state.total_rounds += 1;
            }
            if signal.next_sweep_duration_mins != 0 {
                state.next_sweep_duration_mins = signal.next_sweep_duration_mins;
            }
        }

        if let Some(tx) = self.continue_tx.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = tx.try_send(signal);
        }
        Ok(())
    }
}

fn validate_request(request: &HilRequest) -> Result<(), TunerError> {
    if request.scene_id.is_empty() {
        return Err(TunerError::Validation("scene_id must not be empty".to_string()));
    }
    if request.params.is_empty() || request.params.len() > defaults::MAX_AUTOTUNE_PARAMS {
        return Err(TunerError::TooManyParameters(request.params.len()));
    }
    if request.top_k < defaults::MIN_TOP_K || request.top_k > defaults::MAX_TOP_K {
        return Err(TunerError::TopKOutOfRange(request.top_k));
    }
    if request.max_rounds < defaults::MIN_ROUNDS || request.max_rounds > defaults::MAX_ROUNDS {
        return Err(TunerError::MaxRoundsExceeded(request.max_rounds));
    }
    for param in &request.params {
        if !(param.start < param.end) {
            return Err(TunerError::Validation(format!("param '{}' requires start < end", param.name)));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_hil(
    backend: Arc<dyn SensorBackend>,
    scene_store: Arc<dyn SceneStore>,
    scorer: Arc<dyn GroundTruthScorer>,
    persister: Option<Arc<dyn Persister>>,
    state: Arc<RwLock<HilState>>,
    sweep_id: String,
    request: HilRequest,
    mut continue_rx: mpsc::Receiver<ContinueSignal>,
    mut label_rx: mpsc::Receiver<()>,
    token: CancellationToken,
) {
    let mut current_params: ParamMap = midpoint_params(&request.params);
    let mut round = 1u32;

    loop {
        let total_rounds_now = state.read().await.total_rounds;
        if round > total_rounds_now {
            break;
        }
        if token.is_cancelled() {
            fail(&state, &persister, "hil-tuner stopped".to_string()).await;
            return;
        }

        // --- Phase 1: reference run -------------------------------------
        {
            let mut guard = state.write().await;
            guard.status = HilStatus::RunningReference;
            guard.current_round = round;
        }

        let scene = match scene_store.get_scene(&request.scene_id).await {
            Ok(scene) => scene,
            Err(e) => {
                fail(&state, &persister, format!("round {round}: scene fetch failed: {e}")).await;
                return;
            }
        };

        if round == 1 {
            if let Some(optimal) = &scene.optimal_params {
                current_params = optimal.clone();
            }
        }

        if let Err(e) = backend.apply_tuning_keys(&current_params).await {
            tracing::warn!(round, error = %e, "applying current params before reference run failed");
        }

        let old_tracks = if request.carry_over_labels && round > 1 {
            backend.fetch_ground_truth(&request.scene_id).await.ok()
        } else {
            None
        };

        let replay_config = ReplayConfig {
            filename: scene.capture_file.clone(),
            start_offset_secs: scene.start_offset_secs.unwrap_or(0.0),
            duration_secs: scene.duration_secs.unwrap_or(FULL_FILE_DURATION),
            max_retries: 0,
            analysis_mode: true,
            speed: SpeedMode::Realtime,
            disable_recording: false,
        };

        let reference_run_id = match backend.start_replay(&replay_config).await {
            Ok(id) => id,
            Err(e) => {
                fail(&state, &persister, format!("round {round}: reference run failed: {e}")).await;
                return;
            }
        };

        if let Some(old_tracks) = old_tracks {
            match backend.fetch_ground_truth(&request.scene_id).await {
                Ok(new_tracks) => match carryover::carry_over_labels(backend.as_ref(), &request.scene_id, &old_tracks, &new_tracks).await {
                    Ok(count) => {
                        let mut guard = state.write().await;
                        guard.labels_carried_over += count;
                    }
                    Err(e) => tracing::warn!(round, error = %e, "label carry-over failed"),
                },
                Err(e) => tracing::warn!(round, error = %e, "could not fetch new tracks for label carry-over"),
            }
        }

        {
            let mut guard = state.write().await;
            guard.reference_run_id = Some(reference_run_id.clone());
            guard.current_params = current_params.clone();
        }

        // --- Phase 2: wait for labels ------------------------------------
        {
            let mut guard = state.write().await;
            guard.status = HilStatus::AwaitingLabels;
        }

        let poll_interval = Duration::from_secs(if request.safety_net_poll_secs == 0 {
            defaults::DEFAULT_LABEL_POLL_SECS
        } else {
            request.safety_net_poll_secs
        });

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    fail(&state, &persister, "hil-tuner stopped while awaiting labels".to_string()).await;
                    return;
                }
                Some(_signal) = continue_rx.recv() => {
                    break;
                }
                Some(()) = label_rx.recv() => {
                    refresh_label_progress(&backend, &state, &request.scene_id).await;
                }
                _ = tokio::time::sleep(poll_interval) => {
                    refresh_label_progress(&backend, &state, &request.scene_id).await;
                }
            }
        }

        // --- Phase 3: auto-tune sweep --------------------------------------
        {
            let mut guard = state.write().await;
            guard.status = HilStatus::RunningSweep;
        }

        let sweep_minutes = state.read().await.next_sweep_duration_mins;
        let deadline = chrono::Utc::now() + chrono::Duration::minutes(sweep_minutes as i64);
        {
            let mut guard = state.write().await;
            guard.sweep_deadline = Some(deadline);
        }

        let weights = if round == 1 {
            Weights::default().with_recall_bias(defaults::ROUND1_DETECTION_RATE_MULTIPLIER, defaults::ROUND1_FALSE_POSITIVE_MULTIPLIER)
        } else {
            Weights::default()
        };

        let bounds_now = state.read().await.auto_tune_state.as_ref().map(|s| s.bounds.clone());
        let params: Vec<AutoTuneParam> = request
            .params
            .iter()
            .map(|p| {
                let (start, end) = bounds_now.as_ref().and_then(|b| b.get(&p.name).copied()).unwrap_or((p.start, p.end));
                AutoTuneParam {
                    name: p.name.clone(),
                    kind: p.kind,
                    start,
                    end,
                }
            })
            .collect();

        let values_per_param = defaults::MIN_VALUES_PER_PARAM.max(5).min(defaults::MAX_VALUES_PER_PARAM);

        let auto_request = AutoTuneRequest {
            params,
            values_per_param,
            top_k: request.top_k,
            max_rounds: defaults::MIN_ROUNDS,
            objective: "ground_truth".to_string(),
            weights,
            iterations: request.iterations,
            interval: request.interval.clone(),
            settle_time: request.settle_time.clone(),
            data_source: DataSource::CaptureFile {
                filename: scene.capture_file.clone(),
                start_offset_secs: scene.start_offset_secs.unwrap_or(0.0),
                duration_secs: scene.duration_secs.unwrap_or(FULL_FILE_DURATION),
                max_retries: 0,
            },
            scene_id: Some(request.scene_id.clone()),
            persist_optimal_params: false,
        };

        let mut auto_tuner = AutoTuner::new(backend.clone());
        auto_tuner.set_ground_truth_scorer(scorer.clone());
        if let Err(e) = auto_tuner.start(auto_request).await {
            fail(&state, &persister, format!("round {round}: inner auto-tune failed to start: {e}")).await;
            return;
        }

        let auto_state = loop {
            if chrono::Utc::now() > deadline {
                auto_tuner.stop();
                fail(&state, &persister, "deadline expired".to_string()).await;
                return;
            }
            let snapshot = auto_tuner.snapshot().await;
            if matches!(
                snapshot.status,
                crate::types::autotune::TuneStatus::Complete | crate::types::autotune::TuneStatus::Error
            ) {
                break snapshot;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        };

        if matches!(auto_state.status, crate::types::autotune::TuneStatus::Error) {
            let message = auto_state.error.clone().unwrap_or_else(|| "inner auto-tune error".to_string());
            fail(&state, &persister, format!("round {round}: {message}")).await;
            return;
        }

        if let Some(recommendation) = &auto_state.recommendation {
            current_params = recommendation.params.clone();
        }

        {
            let mut guard = state.write().await;
            guard.round_history.extend(auto_state.round_history.clone());
            guard.auto_tune_state = Some(auto_state.clone());
            guard.recommendation = auto_state.recommendation.clone();
            guard.current_params = current_params.clone();
        }

        round += 1;
    }

    if !current_params.is_empty() {
        if let Err(e) = scene_store.set_optimal_params(&request.scene_id, &current_params).await {
            tracing::warn!(sweep_id, error = %e, "failed to persist HIL optimal params to scene store");
        }
    }

    let snapshot = {
        let mut guard = state.write().await;
        guard.status = HilStatus::Complete;
        guard.clone()
    };

    if let Some(persister) = &persister {
        if let Err(e) = persister.save_hil_complete(&snapshot).await {
            tracing::warn!(sweep_id, error = %e, "failed to persist hil-tuner completion");
        }
    }
}

fn midpoint_params(params: &[AutoTuneParam]) -> ParamMap {
    let mut map = ParamMap::new();
    for p in params {
        let mid = (p.start + p.end) / 2.0;
        let value = match p.kind {
            ScalarKind::Int | ScalarKind::Int64 => ScalarValue::Int(mid.round() as i64),
            _ => ScalarValue::Float(mid),
        };
        map.insert(p.name.clone(), value);
    }
    map
}

async fn refresh_label_progress(backend: &Arc<dyn SensorBackend>, state: &Arc<RwLock<HilState>>, scene_id: &str) {
    match backend.fetch_label_progress(scene_id).await {
        Ok(progress) => {
            let mut guard = state.write().await;
            guard.label_progress = Some(progress);
        }
        Err(e) => tracing::debug!(scene_id, error = %e, "label progress poll failed"),
    }
}

async fn fail(state: &Arc<RwLock<HilState>>, persister: &Option<Arc<dyn Persister>>, message: String) {
    tracing::error!(%message, "hil-tuner fatal error");
    let snapshot = {
        let mut guard = state.write().await;
        guard.status = HilStatus::Failed;
        guard.error = Some(message);
        guard.clone()
    };
    if let Some(persister) = persister {
        if let Err(e) = persister.save_hil_complete(&snapshot).await {
            tracing::warn!(error = %e, "failed to persist hil-tuner error completion");
        }
    }
}
