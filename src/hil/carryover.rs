//! Label carry-over between consecutive reference runs (spec.md §4.G).

use crate::backend::{BackendError, SensorBackend};
use crate::config::defaults;

use super::gates::{temporal_iou, LabelledTrack};

/// For each labelled track in `old_tracks`, find its best temporal-IoU match
/// in `new_tracks`; if that IoU meets [`defaults::CARRYOVER_MIN_IOU`], ask the
/// backend to copy the label onto the matched track. Per-track failures are
/// logged and do not abort the carry-over; returns the count that succeeded.
pub async fn carry_over_labels(
    backend: &dyn SensorBackend,
    scene_id: &str,
    old_tracks: &[LabelledTrack],
    new_tracks: &[LabelledTrack],
) -> Result<u32, BackendError> {
    let mut carried = 0u32;

    for old in old_tracks.iter().filter(|t| t.has_user_label) {
        let best = new_tracks
            .iter()
            .map(|new| (new, temporal_iou((old.start_secs, old.end_secs), (new.start_secs, new.end_secs))))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let Some((matched, iou)) = best else { continue };
        if iou < defaults::CARRYOVER_MIN_IOU {
            continue;
        }

        match apply_carry_over(backend, scene_id, old, matched).await {
            Ok(()) => carried += 1,
            Err(e) => tracing::warn!(
                scene_id,
                track_id = %matched.track_id,
                error = %e,
                "label carry-over failed for track"
            ),
        }
    }

    Ok(carried)
}

/// Copy `old`'s label onto `new` via the backend, tagging the copy with the
/// configured carry-over labeller identity and confidence.
async fn apply_carry_over(
    backend: &dyn SensorBackend,
    scene_id: &str,
    old: &LabelledTrack,
    new: &LabelledTrack,
) -> Result<(), BackendError> {
    let mut keys = std::collections::BTreeMap::new();
    keys.insert(
        format!("label.{}.{}", scene_id, new.track_id),
        crate::types::parameter::ScalarValue::String(
            old.user_label.clone().unwrap_or_default(),
        ),
    );
    keys.insert(
        format!("label.{}.{}.labeller", scene_id, new.track_id),
        crate::types::parameter::ScalarValue::String(defaults::CARRYOVER_LABELLER.to_string()),
    );
    keys.insert(
        format!("label.{}.{}.confidence", scene_id, new.track_id),
        crate::types::parameter::ScalarValue::Float(defaults::CARRYOVER_CONFIDENCE),
    );
    backend.apply_tuning_keys(&keys).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockSensorBackend;

    fn track(id: &str, start: f64, end: f64, labelled: bool) -> LabelledTrack {
        LabelledTrack {
            track_id: id.to_string(),
            start_secs: start,
            end_secs: end,
            has_user_label: labelled,
            user_label: if labelled { Some("car".to_string()) } else { None },
            quality_label: None,
        }
    }

    #[tokio::test]
    async fn carries_over_well_matched_tracks() {
        let backend = MockSensorBackend::new();
        let old = vec![track("old-1", 0.0, 5.0, true)];
        let new = vec![track("new-1", 0.1, 5.1, false)];
        let count = carry_over_labels(&backend, "scene-1", &old, &new).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn skips_tracks_with_no_overlap() {
        let backend = MockSensorBackend::new();
        let old = vec![track("old-1", 0.0, 1.0, true)];
        let new = vec![track("new-1", 50.0, 51.0, false)];
        let count = carry_over_labels(&backend, "scene-1", &old, &new).await.unwrap();
        assert_eq!(count, 0);
    }
}
