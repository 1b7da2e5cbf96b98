//! Auto-Tuner — multi-round adaptive search wrapping an internal
//! [`SweepRunner`] (spec.md §4.F).

pub mod checkpoint;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::SensorBackend;
use crate::config::defaults;
use crate::objective::ObjectiveRegistry;
use crate::persistence::{Persister, SceneStore, SweepCheckpoint};
use crate::runner::{StartInput, SweepRunner};
use crate::types::autotune::{AutoTuneParam, AutoTuneRequest, AutoTuneState, Bounds, RoundSummary, ScoredResult, TuneStatus};
use crate::types::objective::Weights;
use crate::types::parameter::{ParamMap, ParameterDescriptor, ScalarKind, ScalarValue};
use crate::types::request::{DataSource, SeedControl, SettleMode, SweepMode, SweepRequest};
use crate::types::result::{ComboResult, Recommendation};
use crate::types::state::SweepStatus;
use crate::TunerError;

/// Ground-truth scoring is a different shape than the pure objective
/// functions: `(sceneID, runID, Weights) -> (score, components?, error)`.
#[async_trait]
pub trait GroundTruthScorer: Send + Sync {
    async fn score(&self, scene_id: &str, run_id: &str, weights: &Weights) -> Result<ScoreWithComponents, TunerError>;
}

#[derive(Debug, Clone)]
pub struct ScoreWithComponents {
    pub score: f64,
    pub components: Option<BTreeMap<String, f64>>,
}

pub struct AutoTuner {
    backend: Arc<dyn SensorBackend>,
    persister: Option<Arc<dyn Persister>>,
    scene_store: Option<Arc<dyn SceneStore>>,
    objectives: Arc<ObjectiveRegistry>,
    ground_truth_scorer: Option<Arc<dyn GroundTruthScorer>>,
    state: Arc<RwLock<AutoTuneState>>,
    cancel: std::sync::Mutex<Option<CancellationToken>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AutoTuner {
    pub fn new(backend: Arc<dyn SensorBackend>) -> Self {
        Self {
            backend,
            persister: None,
            scene_store: None,
            objectives: Arc::new(ObjectiveRegistry::new()),
            ground_truth_scorer: None,
            state: Arc::new(RwLock::new(AutoTuneState::default())),
            cancel: std::sync::Mutex::new(None),
            task: std::sync::Mutex::new(None),
        }
    }

    pub fn set_persister(&mut self, persister: Arc<dyn Persister>) {
        self.persister = Some(persister);
    }

    pub fn set_scene_store(&mut self, scene_store: Arc<dyn SceneStore>) {
        self.scene_store = Some(scene_store);
    }

    pub fn set_ground_truth_scorer(&mut self, scorer: Arc<dyn GroundTruthScorer>) {
        self.ground_truth_scorer = Some(scorer);
    }

    pub async fn get_sweep_id(&self) -> String {
        self.state.read().await.sweep_id.clone()
    }

    pub async fn snapshot(&self) -> AutoTuneState {
        self.state.read().await.clone()
    }

    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }

    pub async fn start(&self, request: AutoTuneRequest) -> Result<(), TunerError> {
        {
            let state = self.state.read().await;
            if matches!(state.status, TuneStatus::Running) {
                return Err(TunerError::SweepAlreadyRunning);
            }
        }

        validate_request(&request, self.ground_truth_scorer.is_some())?;

        let sweep_id = Uuid::new_v4().to_string();
        let bounds: Bounds = request.params.iter().map(|p| (p.name.clone(), (p.start, p.end))).collect();

        {
            let mut state = self.state.write().await;
            *state = AutoTuneState {
                sweep_id: sweep_id.clone(),
                status: TuneStatus::Running,
                total_rounds: request.max_rounds,
                bounds: bounds.clone(),
                ..Default::default()
            };
        }

        self.spawn_round_loop(sweep_id, request, bounds, 1).await;
        Ok(())
    }

    /// Load a checkpoint through the persister and continue from the round
    /// after the one it recorded.
    pub async fn resume(&self, id: &str) -> Result<(), TunerError> {
        if id.is_empty() {
            return Err(TunerError::Validation("resume id must not be empty".to_string()));
        }
        let persister = self.persister.as_ref().ok_or(TunerError::NoPersister)?;
        let checkpoint = persister
            .load_sweep_checkpoint(id)
            .await
            .map_err(|_| TunerError::CheckpointNotFound(id.to_string()))?;

        let request = checkpoint::request_from_checkpoint(&checkpoint)?;

        {
            let mut state = self.state.write().await;
            *state = checkpoint.auto_tune_state.clone();
            state.status = TuneStatus::Running;
        }

        self.spawn_round_loop(checkpoint.sweep_id.clone(), request, checkpoint.bounds.clone(), checkpoint.round + 1)
            .await;
        Ok(())
    }

    async fn spawn_round_loop(&self, sweep_id: String, request: AutoTuneRequest, bounds: Bounds, start_round: u32) {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());

        let backend = self.backend.clone();
        let persister = self.persister.clone();
        let scene_store = self.scene_store.clone();
        let objectives = self.objectives.clone();
        let scorer = self.ground_truth_scorer.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            run_rounds(backend, persister, scene_store, objectives, scorer, state, sweep_id, request, bounds, start_round, token).await;
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }
}

fn validate_request(request: &AutoTuneRequest, has_scorer: bool) -> Result<(), TunerError> {
    if request.params.is_empty() || request.params.len() > defaults::MAX_AUTOTUNE_PARAMS {
        return Err(TunerError::TooManyParameters(request.params.len()));
    }
    if request.values_per_param < defaults::MIN_VALUES_PER_PARAM || request.values_per_param > defaults::MAX_VALUES_PER_PARAM {
        return Err(TunerError::ValuesPerParamOutOfRange(request.values_per_param));
    }
    if request.top_k < defaults::MIN_TOP_K || request.top_k > defaults::MAX_TOP_K {
        return Err(TunerError::TopKOutOfRange(request.top_k));
    }
    if request.max_rounds > defaults::MAX_ROUNDS {
        return Err(TunerError::MaxRoundsExceeded(request.max_rounds));
    }
    if request.max_rounds < defaults::MIN_ROUNDS {
        return Err(TunerError::Validation(format!("max_rounds must be at least {}", defaults::MIN_ROUNDS)));
    }
    for param in &request.params {
        if !(param.start < param.end) {
            return Err(TunerError::Validation(format!("param '{}' requires start < end", param.name)));
        }
        if !matches!(param.kind, ScalarKind::Float | ScalarKind::Int | ScalarKind::Int64) {
            return Err(TunerError::Validation(format!("param '{}' kind {} unsupported in auto-tune", param.name, param.kind)));
        }
    }
    if request.objective == "ground_truth" {
        if request.scene_id.as_deref().unwrap_or_default().is_empty() {
            return Err(TunerError::Validation("ground_truth objective requires a scene_id".to_string()));
        }
        if !has_scorer {
            return Err(TunerError::ScorerNotConfigured);
        }
    }
    Ok(())
}

/// Build a `values_per_param`-point grid across `[lo, hi]`. Ints/int64
/// truncate toward zero after interpolation; duplicates are allowed.
fn build_grid(param: &AutoTuneParam, bounds: &Bounds, values_per_param: u32) -> Vec<ScalarValue> {
    let (lo, hi) = bounds.get(&param.name).copied().unwrap_or((param.start, param.end));
    let n = values_per_param.max(2);
    let mut values = Vec::with_capacity(n as usize);
    for i in 0..n {
        let t = i as f64 / (n - 1) as f64;
        let v = lo + t * (hi - lo);
        let scalar = match param.kind {
            ScalarKind::Float => ScalarValue::Float(v),
            ScalarKind::Int | ScalarKind::Int64 => ScalarValue::Int(v.trunc() as i64),
            _ => ScalarValue::Float(v),
        };
        values.push(scalar);
    }
    values
}

/// Pure: narrow `[lo, hi]` bounds per parameter to the min/max of the
/// winning top-K values, padded by `max(range * 0.1, 0.001)` and clamped to
/// the original request bounds. Integer parameter bounds round outward.
pub fn narrow_bounds(top_k: &[ScoredResult], params: &[AutoTuneParam], original_bounds: &Bounds) -> Bounds {
    let mut next = Bounds::new();
    for param in params {
        let values: Vec<f64> = top_k
            .iter()
            .filter_map(|r| r.combo.params.get(&param.name).and_then(ScalarValue::as_f64))
            .collect();

        let (orig_lo, orig_hi) = original_bounds.get(&param.name).copied().unwrap_or((param.start, param.end));

        let (min_v, max_v) = if values.is_empty() {
            (orig_lo, orig_hi)
        } else {
            (
                values.iter().cloned().fold(f64::INFINITY, f64::min),
                values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        let range = max_v - min_v;
        let margin = (range * defaults::NARROW_MARGIN_FRACTION).max(defaults::NARROW_MARGIN_FLOOR);

        let mut lo = (min_v - margin).max(orig_lo);
        let mut hi = (max_v + margin).min(orig_hi);

        if matches!(param.kind, ScalarKind::Int | ScalarKind::Int64) {
            lo = lo.floor();
            hi = hi.ceil();
        }

        next.insert(param.name.clone(), (lo, hi));
    }
    next
}

/// Pure clone — named per spec.md's helper list.
pub fn copy_bounds(bounds: &Bounds) -> Bounds {
    bounds.clone()
}

/// Pure clone — named per spec.md's helper list.
pub fn copy_param_values(params: &ParamMap) -> ParamMap {
    params.clone()
}

/// Stable sort by score descending; never mutates `results`.
pub fn sort_scored_results(results: &[ScoredResult]) -> Vec<ScoredResult> {
    let mut sorted = results.to_vec();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

#[allow(clippy::too_many_arguments)]
async fn run_rounds(
    backend: Arc<dyn SensorBackend>,
    persister: Option<Arc<dyn Persister>>,
    scene_store: Option<Arc<dyn SceneStore>>,
    objectives: Arc<ObjectiveRegistry>,
    scorer: Option<Arc<dyn GroundTruthScorer>>,
    state: Arc<RwLock<AutoTuneState>>,
    sweep_id: String,
    request: AutoTuneRequest,
    initial_bounds: Bounds,
    start_round: u32,
    token: CancellationToken,
) {
    let mut bounds = initial_bounds;
    let mut best_overall: Option<ScoredResult> = None;
    let mut all_results: Vec<ComboResult> = Vec::new();

    for round in start_round..=request.max_rounds {
        if token.is_cancelled() {
            finish_error(&state, &persister, &sweep_id, "auto-tune stopped".to_string()).await;
            return;
        }

        let bounds_at_start = bounds.clone();
        let descriptors: Vec<ParameterDescriptor> = request
            .params
            .iter()
            .map(|p| ParameterDescriptor {
                name: p.name.clone(),
                kind: p.kind,
                values: Some(build_grid(p, &bounds, request.values_per_param)),
                range: None,
            })
            .collect();

        let inner_request = SweepRequest {
            mode: SweepMode::Generic,
            noise_values: vec![],
            closeness_values: vec![],
            neighbour_values: vec![],
            params: descriptors,
            data_source: request.data_source.clone(),
            iterations: request.iterations,
            interval: request.interval.clone(),
            settle_time: request.settle_time.clone(),
            settle_mode: SettleMode::PerCombo,
            seed_control: SeedControl::False,
            enable_recording: false,
        };

        let inner_runner = SweepRunner::new(backend.clone());
        if let Err(e) = inner_runner.start(StartInput::Typed(inner_request)).await {
            finish_error(&state, &persister, &sweep_id, format!("round {round}: inner sweep failed to start: {e}")).await;
            return;
        }

        let inner_snapshot = loop {
            let snapshot = inner_runner.snapshot().await;
            if matches!(snapshot.status, SweepStatus::Complete | SweepStatus::Error) {
                break snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        };

        if matches!(inner_snapshot.status, SweepStatus::Error) {
            let message = inner_snapshot.error.unwrap_or_else(|| "inner sweep error".to_string());
            finish_error(&state, &persister, &sweep_id, format!("round {round}: {message}")).await;
            return;
        }

        let mut scored = Vec::with_capacity(inner_snapshot.results.len());
        for combo in &inner_snapshot.results {
            let score = score_combo(combo, &request, &objectives, scorer.as_deref()).await;
            scored.push(ScoredResult {
                combo: combo.clone(),
                score,
            });
        }

        let sorted = sort_scored_results(&scored);
        let top_k: Vec<ScoredResult> = sorted.into_iter().take(request.top_k as usize).collect();

        if let Some(best_this_round) = top_k.first() {
            let replace = match &best_overall {
                None => true,
                Some(current) => best_this_round.score > current.score,
            };
            if replace {
                best_overall = Some(best_this_round.clone());
            }
        }

        all_results.extend(inner_snapshot.results.iter().cloned());

        let best_params = top_k.first().map(|r| copy_param_values(&r.combo.params)).unwrap_or_default();
        let round_summary = RoundSummary {
            round,
            best_score: top_k.first().map(|r| r.score).unwrap_or(0.0),
            bounds_at_start: copy_bounds(&bounds_at_start),
            best_params,
            top_k: top_k.clone(),
        };

        bounds = narrow_bounds(&top_k, &request.params, &bounds_at_start);

        {
            let mut guard = state.write().await;
            guard.current_round = round;
            guard.round_history.push(round_summary);
            guard.results = all_results.clone();
            guard.bounds = bounds.clone();
        }

        if let Some(persister) = &persister {
            let auto_tune_state = state.read().await.clone();
            let checkpoint = SweepCheckpoint {
                sweep_id: sweep_id.clone(),
                round,
                bounds: bounds.clone(),
                auto_tune_state,
                request: request.clone(),
            };
            if let Err(e) = persister.save_sweep_checkpoint(&checkpoint).await {
                tracing::warn!(error = %e, "failed to persist auto-tune checkpoint");
            }
        }
    }

    let recommendation = best_overall.map(|r| Recommendation::from_scored(&r.combo, r.score));

    if request.persist_optimal_params {
        if let (Some(scene_store), Some(scene_id), Some(recommendation)) = (&scene_store, &request.scene_id, &recommendation) {
            if let Err(e) = scene_store.set_optimal_params(scene_id, &recommendation.params).await {
                tracing::warn!(error = %e, "failed to persist optimal params to scene store");
            }
        }
    }

    {
        let mut guard = state.write().await;
        guard.status = TuneStatus::Complete;
        guard.recommendation = recommendation;
    }

    if let Some(persister) = &persister {
        let snapshot = state.read().await.clone();
        if let Err(e) = persister.save_autotune_complete(&snapshot).await {
            tracing::warn!(error = %e, "failed to persist auto-tune completion");
        }
    }
}

async fn score_combo(
    combo: &ComboResult,
    request: &AutoTuneRequest,
    objectives: &ObjectiveRegistry,
    scorer: Option<&dyn GroundTruthScorer>,
) -> f64 {
    if request.objective == "ground_truth" {
        let scene_id = request.scene_id.clone().unwrap_or_default();
        let run_id = combo.run_id.clone().unwrap_or_default();
        if let Some(scorer) = scorer {
            return match scorer.score(&scene_id, &run_id, &request.weights).await {
                Ok(result) => result.score,
                Err(e) => {
                    tracing::warn!(error = %e, "ground-truth scorer failed for candidate, scoring 0");
                    0.0
                }
            };
        }
        return 0.0;
    }

    match objectives.get(&request.objective) {
        Ok(objective) => (objective.score)(combo, &request.weights),
        Err(e) => {
            tracing::warn!(error = %e, "unknown objective, scoring 0");
            0.0
        }
    }
}

async fn finish_error(state: &Arc<RwLock<AutoTuneState>>, persister: &Option<Arc<dyn Persister>>, sweep_id: &str, message: String) {
    tracing::error!(sweep_id, %message, "auto-tune fatal error");
    let snapshot = {
        let mut guard = state.write().await;
        guard.status = TuneStatus::Error;
        guard.error = Some(message);
        guard.clone()
    };
    if let Some(persister) = persister {
        if let Err(e) = persister.save_autotune_complete(&snapshot).await {
            tracing::warn!(error = %e, "failed to persist auto-tune error completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, start: f64, end: f64) -> AutoTuneParam {
        AutoTuneParam {
            name: name.to_string(),
            kind: ScalarKind::Float,
            start,
            end,
        }
    }

    fn scored(params: &[(&str, f64)], score: f64) -> ScoredResult {
        let mut map = ParamMap::new();
        for (name, v) in params {
            map.insert(name.to_string(), ScalarValue::Float(*v));
        }
        ScoredResult {
            combo: ComboResult::new(map),
            score,
        }
    }

    #[test]
    fn sort_scored_results_does_not_mutate_input() {
        let results = vec![scored(&[("a", 1.0)], 0.2), scored(&[("a", 2.0)], 0.9), scored(&[("a", 3.0)], 0.5)];
        let original_order: Vec<f64> = results.iter().map(|r| r.score).collect();
        let sorted = sort_scored_results(&results);

        assert_eq!(original_order, vec![0.2, 0.9, 0.5]);
        assert_eq!(sorted.iter().map(|r| r.score).collect::<Vec<_>>(), vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn narrow_bounds_is_idempotent_given_same_top_k() {
        let params = vec![param("noise", 0.0, 1.0)];
        let mut original = Bounds::new();
        original.insert("noise".to_string(), (0.0, 1.0));

        let top_k = vec![scored(&[("noise", 0.4)], 0.9), scored(&[("noise", 0.6)], 0.8)];

        let once = narrow_bounds(&top_k, &params, &original);
        let twice = narrow_bounds(&top_k, &params, &original);
        assert_eq!(once, twice);
    }

    #[test]
    fn narrow_bounds_produces_non_degenerate_interval_for_identical_values() {
        let params = vec![param("noise", 0.0, 1.0)];
        let mut original = Bounds::new();
        original.insert("noise".to_string(), (0.0, 1.0));
        let top_k = vec![scored(&[("noise", 0.5)], 0.9)];
        let narrowed = narrow_bounds(&top_k, &params, &original);
        let (lo, hi) = narrowed["noise"];
        assert!(hi > lo);
    }

    #[test]
    fn build_grid_produces_requested_point_count() {
        let param = param("noise", 0.0, 1.0);
        let mut bounds = Bounds::new();
        bounds.insert("noise".to_string(), (0.0, 1.0));
        let grid = build_grid(&param, &bounds, 5);
        assert_eq!(grid.len(), 5);
    }
}
