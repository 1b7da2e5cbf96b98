//! Checkpoint reconstruction for `AutoTuner::resume` (spec.md §4.F
//! "Suspension and resume").

use crate::persistence::SweepCheckpoint;
use crate::types::autotune::AutoTuneRequest;
use crate::TunerError;

/// Re-validate and return the request embedded in a loaded checkpoint.
///
/// The request is already a typed [`AutoTuneRequest`] by construction (it
/// round-tripped through `serde_json` when the checkpoint was persisted),
/// so "corrupted serialised request" surfaces earlier, at the persister's
/// own deserialisation boundary — here we only check it still parses as a
/// semantically valid request.
pub fn request_from_checkpoint(checkpoint: &SweepCheckpoint) -> Result<AutoTuneRequest, TunerError> {
    let request = &checkpoint.request;
    if request.params.is_empty() {
        return Err(TunerError::CorruptedCheckpoint(format!(
            "checkpoint for sweep {} carries a request with no parameters",
            checkpoint.sweep_id
        )));
    }
    Ok(request.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::autotune::{AutoTuneParam, Bounds};
    use crate::types::parameter::ScalarKind;
    use crate::types::request::DataSource;

    fn sample_checkpoint() -> SweepCheckpoint {
        SweepCheckpoint {
            sweep_id: "s1".to_string(),
            round: 1,
            bounds: Bounds::new(),
            auto_tune_state: Default::default(),
            request: AutoTuneRequest {
                params: vec![AutoTuneParam {
                    name: "noise".to_string(),
                    kind: ScalarKind::Float,
                    start: 0.0,
                    end: 1.0,
                }],
                values_per_param: 2,
                top_k: 1,
                max_rounds: 2,
                objective: "weighted".to_string(),
                weights: Default::default(),
                iterations: 1,
                interval: "1ms".to_string(),
                settle_time: "1ms".to_string(),
                data_source: DataSource::Live,
                scene_id: None,
                persist_optimal_params: false,
            },
        }
    }

    #[test]
    fn valid_checkpoint_parses() {
        let checkpoint = sample_checkpoint();
        assert!(request_from_checkpoint(&checkpoint).is_ok());
    }

    #[test]
    fn empty_params_is_corrupted() {
        let mut checkpoint = sample_checkpoint();
        checkpoint.request.params.clear();
        assert!(matches!(request_from_checkpoint(&checkpoint), Err(TunerError::CorruptedCheckpoint(_))));
    }
}
