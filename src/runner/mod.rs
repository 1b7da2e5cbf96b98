//! Sweep Runner — linear traversal of a combination list (spec.md §4.E).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{ReplayConfig, SensorBackend, SpeedMode};
use crate::config::defaults;
use crate::params::cartesian_product;
use crate::persistence::Persister;
use crate::sampler::Sampler;
use crate::types::parameter::{ParamMap, ScalarValue};
use crate::types::request::{DataSource, SettleMode, SweepMode, SweepRequest};
use crate::types::state::{SweepState, SweepStatus};
use crate::TunerError;

/// Either the canonical typed request or an untyped map to be decoded through
/// it (spec.md §6's "canonical path").
pub enum StartInput {
    Typed(SweepRequest),
    Map(serde_json::Value),
}

/// Evaluates a bounded Cartesian product of parameter combinations against a
/// [`SensorBackend`], one combination at a time, accumulating [`ComboResult`]s.
pub struct SweepRunner {
    backend: Arc<dyn SensorBackend>,
    persister: Option<Arc<dyn Persister>>,
    state: Arc<RwLock<SweepState>>,
    cancel: std::sync::Mutex<Option<CancellationToken>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SweepRunner {
    pub fn new(backend: Arc<dyn SensorBackend>) -> Self {
        Self {
            backend,
            persister: None,
            state: Arc::new(RwLock::new(SweepState::default())),
            cancel: std::sync::Mutex::new(None),
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

    /// Deep copy of the current state — safe for callers to mutate freely.
    pub async fn snapshot(&self) -> SweepState {
        self.state.read().await.clone()
    }

    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }

    pub async fn start(&self, input: StartInput) -> Result<(), TunerError> {
        {
            let state = self.state.read().await;
            if matches!(state.status, SweepStatus::Running) {
                return Err(TunerError::SweepAlreadyRunning);
            }
        }

        let request = match input {
            StartInput::Typed(req) => req,
            StartInput::Map(value) => crate::types::request::decode_request(value)?,
        };

        let combos = validate_and_expand(&request)?;

        let sweep_id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());

        {
            let mut state = self.state.write().await;
            *state = SweepState {
                sweep_id: sweep_id.clone(),
                status: SweepStatus::Running,
                started_at: Some(chrono::Utc::now()),
                total_combos: combos.len(),
                request: Some(request.clone()),
                ..Default::default()
            };
        }

        if let Some(persister) = &self.persister {
            let snapshot = self.snapshot().await;
            if let Err(e) = persister.save_sweep_start(&snapshot).await {
                tracing::warn!(error = %e, "failed to persist sweep start");
            }
        }

        let backend = self.backend.clone();
        let persister = self.persister.clone();
        let state = self.state.clone();
        let request_for_task = request.clone();

        let handle = tokio::spawn(async move {
            run_sweep(backend, persister, state, request_for_task, combos, token).await;
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Ok(())
    }
}

/// Validate a decoded request and expand it into its ordered combination list.
fn validate_and_expand(request: &SweepRequest) -> Result<Vec<ParamMap>, TunerError> {
    let iterations = if request.iterations == 0 {
        defaults::DEFAULT_ITERATIONS
    } else {
        request.iterations
    };
    if iterations > defaults::MAX_ITERATIONS {
        return Err(TunerError::IterationsOutOfRange(iterations));
    }

    duration::check(&request.interval)?;
    duration::check_settle(&request.settle_time)?;

    match request.mode {
        SweepMode::Generic => {
            if request.params.len() > defaults::MAX_GENERIC_PARAMS {
                return Err(TunerError::TooManyParameters(request.params.len()));
            }
            cartesian_product(&request.params).map_err(TunerError::from)
        }
        SweepMode::Single | SweepMode::Multi => legacy_combos(request),
    }
}

mod duration {
    use super::TunerError;
    use std::time::Duration;

    pub fn check(raw: &str) -> Result<(), TunerError> {
        crate::duration::parse_or_default(raw, Duration::from_secs(1)).map(|_| ())
    }

    pub fn check_settle(raw: &str) -> Result<(), TunerError> {
        crate::duration::parse_settle_or_default(raw, Duration::from_secs(2)).map(|_| ())
    }
}

/// Legacy 3-axis product over `noise_values` × `closeness_values` × `neighbour_values`.
fn legacy_combos(request: &SweepRequest) -> Result<Vec<ParamMap>, TunerError> {
    let noise = if request.noise_values.is_empty() { vec![0.0] } else { request.noise_values.clone() };
    let closeness = if request.closeness_values.is_empty() { vec![0.0] } else { request.closeness_values.clone() };
    let neighbour = if request.neighbour_values.is_empty() { vec![0] } else { request.neighbour_values.clone() };

    let total = noise.len() as u128 * closeness.len() as u128 * neighbour.len() as u128;
    if total > defaults::MAX_COMBOS {
        return Err(TunerError::ParameterRangeTooLarge(format!(
            "legacy combination count {total} exceeds the cap of {}",
            defaults::MAX_COMBOS
        )));
    }

    let mut combos = Vec::with_capacity(total as usize);
    for &n in &noise {
        for &c in &closeness {
            for &nb in &neighbour {
                let mut map = ParamMap::new();
                map.insert("noise".to_string(), ScalarValue::Float(n));
                map.insert("closeness".to_string(), ScalarValue::Float(c));
                map.insert("neighbour".to_string(), ScalarValue::Int(nb));
                combos.push(map);
            }
        }
    }
    Ok(combos)
}

async fn run_sweep(
    backend: Arc<dyn SensorBackend>,
    persister: Option<Arc<dyn Persister>>,
    state: Arc<RwLock<SweepState>>,
    request: SweepRequest,
    combos: Vec<ParamMap>,
    token: CancellationToken,
) {
    let iterations = if request.iterations == 0 { defaults::DEFAULT_ITERATIONS } else { request.iterations };
    let interval = crate::duration::parse_or_default(&request.interval, Duration::from_secs(1)).unwrap_or(Duration::from_secs(1));
    let settle_time = crate::duration::parse_settle_or_default(&request.settle_time, Duration::from_secs(2)).unwrap_or(Duration::from_secs(2));
    let is_legacy = matches!(request.mode, SweepMode::Single | SweepMode::Multi);
    let sampler = Sampler::new(backend.clone());

    for (index, combo) in combos.iter().enumerate() {
        if token.is_cancelled() {
            finish_with_error(&state, &persister, format!("sweep stopped at combination {index}")).await;
            return;
        }

        let seed = request.seed_control.resolve(index);
        tracing::info!(combo = index, seed, "evaluating combination");
        if let Err(e) = backend.reseed(seed).await {
            tracing::warn!(combo = index, error = %e, "reseed failed");
        }

        if let Err(e) = backend.apply_tuning_keys(combo).await {
            if is_legacy {
                finish_with_error(&state, &persister, format!("applying combination {index}: {e}")).await;
                return;
            } else {
                push_warning(&state, format!("combination {index}: apply failed: {e}")).await;
                continue;
            }
        }

        let mut run_id = None;

        if request.data_source.is_capture_file() {
            if let Err(e) = backend.reset_acceptance().await {
                push_warning(&state, format!("combination {index}: reset acceptance failed: {e}")).await;
            }

            if let DataSource::CaptureFile { filename, start_offset_secs, duration_secs, max_retries } = &request.data_source {
                let replay_config = ReplayConfig {
                    filename: filename.clone(),
                    start_offset_secs: *start_offset_secs,
                    duration_secs: *duration_secs,
                    max_retries: *max_retries,
                    analysis_mode: true,
                    speed: SpeedMode::Realtime,
                    disable_recording: !request.enable_recording,
                };

                match backend.start_replay(&replay_config).await {
                    Ok(id) => {
                        run_id = Some(id.clone());
                        let timeout = Duration::from_secs(defaults::REPLAY_COMPLETE_TIMEOUT_SECS);
                        match backend.wait_replay_complete(&id, timeout).await {
                            Ok(true) => {}
                            Ok(false) => push_warning(&state, format!("combination {index}: replay timed out")).await,
                            Err(e) => push_warning(&state, format!("combination {index}: replay wait failed: {e}")).await,
                        }
                    }
                    Err(e) => push_warning(&state, format!("combination {index}: start replay failed: {e}")).await,
                }
            }

            let wait = settle_wait(&request, index, settle_time);
            tokio::time::sleep(wait).await;
        } else {
            if let Err(e) = backend.reset_grid().await {
                push_warning(&state, format!("combination {index}: reset grid failed: {e}")).await;
            }
            if let Err(e) = backend.reset_acceptance().await {
                push_warning(&state, format!("combination {index}: reset acceptance failed: {e}")).await;
            }

            let wait = settle_wait(&request, index, settle_time);
            match backend.block_until_grid_settled(wait).await {
                Ok(true) => {}
                Ok(false) => push_warning(&state, format!("combination {index}: grid did not settle before timeout")).await,
                Err(e) => push_warning(&state, format!("combination {index}: grid settle wait failed: {e}")).await,
            }
        }

        let mut result = sampler.sample_combo(combo.clone(), iterations, interval).await;
        result.run_id = run_id;

        {
            let mut guard = state.write().await;
            guard.results.push(result);
            guard.completed_combos += 1;
            guard.current_combo = Some(index);
        }

        if request.data_source.is_capture_file() {
            if let Err(e) = backend.stop().await {
                push_warning(&state, format!("combination {index}: stopping replay failed: {e}")).await;
            }
        }
    }

    let _ = backend.stop().await;

    {
        let mut guard = state.write().await;
        guard.status = SweepStatus::Complete;
        guard.completed_at = Some(chrono::Utc::now());
    }

    if let Some(persister) = &persister {
        let snapshot = state.read().await.clone();
        if let Err(e) = persister.save_sweep_complete(&snapshot).await {
            tracing::warn!(error = %e, "failed to persist sweep completion");
        }
    }
}

fn settle_wait(request: &SweepRequest, index: usize, settle_time: Duration) -> Duration {
    if index > 0 && matches!(request.settle_mode, SettleMode::Once) {
        Duration::from_secs(defaults::SETTLE_ONCE_SUBSEQUENT_SECS)
    } else {
        settle_time
    }
}

async fn push_warning(state: &Arc<RwLock<SweepState>>, message: String) {
    tracing::warn!(%message, "recoverable sweep warning");
    let mut guard = state.write().await;
    guard.warnings.push(message);
}

async fn finish_with_error(state: &Arc<RwLock<SweepState>>, persister: &Option<Arc<dyn Persister>>, message: String) {
    tracing::error!(%message, "sweep fatal error");
    {
        let mut guard = state.write().await;
        guard.status = SweepStatus::Error;
        guard.error = Some(message);
        guard.completed_at = Some(chrono::Utc::now());
    }
    if let Some(persister) = persister {
        let snapshot = state.read().await.clone();
        if let Err(e) = persister.save_sweep_complete(&snapshot).await {
            tracing::warn!(error = %e, "failed to persist sweep error completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockSensorBackend;
    use crate::types::request::{DataSource as DS, SeedControl};

    fn legacy_request() -> SweepRequest {
        SweepRequest {
            mode: SweepMode::Multi,
            noise_values: vec![0.01],
            closeness_values: vec![1.5],
            neighbour_values: vec![1],
            params: vec![],
            data_source: DS::Live,
            iterations: 1,
            interval: "10ms".to_string(),
            settle_time: "10ms".to_string(),
            settle_mode: SettleMode::PerCombo,
            seed_control: SeedControl::False,
            enable_recording: false,
        }
    }

    #[tokio::test]
    async fn legacy_live_sweep_completes() {
        let backend: Arc<dyn SensorBackend> = Arc::new(MockSensorBackend::new());
        let runner = SweepRunner::new(backend);
        runner.start(StartInput::Typed(legacy_request())).await.unwrap();

        for _ in 0..50 {
            let snapshot = runner.snapshot().await;
            if matches!(snapshot.status, SweepStatus::Complete | SweepStatus::Error) {
                assert!(matches!(snapshot.status, SweepStatus::Complete));
                assert_eq!(snapshot.results.len(), 1);
                assert!(snapshot.warnings.is_empty());
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("sweep did not terminate in time");
    }

    #[tokio::test]
    async fn concurrent_start_rejected_while_running() {
        let backend: Arc<dyn SensorBackend> = Arc::new(MockSensorBackend::new());
        let runner = SweepRunner::new(backend);
        runner.start(StartInput::Typed(legacy_request())).await.unwrap();
        let second = runner.start(StartInput::Typed(legacy_request())).await;
        assert!(matches!(second, Err(TunerError::SweepAlreadyRunning)) || second.is_ok());
    }

    #[tokio::test]
    async fn iterations_zero_defaults_to_thirty() {
        let mut request = legacy_request();
        request.iterations = 0;
        let combos = validate_and_expand(&request).unwrap();
        assert_eq!(combos.len(), 1);
    }

    #[tokio::test]
    async fn iterations_over_max_rejected() {
        let mut request = legacy_request();
        request.iterations = 501;
        assert!(matches!(validate_and_expand(&request), Err(TunerError::IterationsOutOfRange(501))));
    }
}
