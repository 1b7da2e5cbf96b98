//! Continue gates — the checks a `Continue` signal must pass before the
//! HIL-Tuner leaves `awaiting-labels` (spec.md §4.G Phase 2).

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::hil::LabelProgress;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("label fraction {0:.3} below required threshold {1:.3}")]
    LabelFractionBelowThreshold(f64, f64),

    #[error("class coverage insufficient for class '{0}': have {1}, need {2}")]
    ClassCoverageInsufficient(String, u32, u32),

    #[error("temporal spread {0:.1}s below required minimum {1:.1}s")]
    TemporalSpreadInsufficient(f64, f64),
}

/// A labelled track's time window, as fetched from the backend for the
/// temporal-spread gate and for label carry-over.
#[derive(Debug, Clone)]
pub struct LabelledTrack {
    pub track_id: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub has_user_label: bool,
    pub user_label: Option<String>,
    pub quality_label: Option<String>,
}

/// Label-fraction gate: `labelled / total >= min_label_threshold`.
pub fn check_label_fraction(progress: &LabelProgress, min_label_threshold: f64) -> Result<(), GateError> {
    let fraction = progress.percent();
    if fraction < min_label_threshold {
        return Err(GateError::LabelFractionBelowThreshold(fraction, min_label_threshold));
    }
    Ok(())
}

/// Per-class minimum coverage gate.
pub fn check_class_coverage(progress: &LabelProgress, min_class_coverage: &BTreeMap<String, u32>) -> Result<(), GateError> {
    for (class, &required) in min_class_coverage {
        let have = progress.by_class.get(class).copied().unwrap_or(0);
        if have < required {
            return Err(GateError::ClassCoverageInsufficient(class.clone(), have, required));
        }
    }
    Ok(())
}

/// Temporal-spread gate: the union of labelled tracks' `[start, end)`
/// windows must cover at least `min_temporal_spread_secs`. Computed by
/// sorting windows and merging overlaps — the standard interval-union
/// algorithm.
pub fn check_temporal_spread(tracks: &[LabelledTrack], min_temporal_spread_secs: f64) -> Result<(), GateError> {
    let labelled: Vec<&LabelledTrack> = tracks.iter().filter(|t| t.has_user_label).collect();
    let spread = union_duration(&labelled);
    if spread < min_temporal_spread_secs {
        return Err(GateError::TemporalSpreadInsufficient(spread, min_temporal_spread_secs));
    }
    Ok(())
}

fn union_duration(tracks: &[&LabelledTrack]) -> f64 {
    if tracks.is_empty() {
        return 0.0;
    }
    let mut windows: Vec<(f64, f64)> = tracks.iter().map(|t| (t.start_secs, t.end_secs)).collect();
    windows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut total = 0.0;
    let (mut cur_start, mut cur_end) = windows[0];
    for &(start, end) in &windows[1..] {
        if start <= cur_end {
            cur_end = cur_end.max(end);
        } else {
            total += cur_end - cur_start;
            cur_start = start;
            cur_end = end;
        }
    }
    total += cur_end - cur_start;
    total
}

/// Temporal intersection-over-union of two windows — used for label carry-over.
pub fn temporal_iou(a: (f64, f64), b: (f64, f64)) -> f64 {
    let intersection = (a.1.min(b.1) - a.0.max(b.0)).max(0.0);
    let union = (a.1.max(b.1)) - (a.0.min(b.0));
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn single_track_spread_below_minimum_fails_with_substring() {
        let tracks = vec![track("t1", 0.0, 2.0, true)];
        let err = check_temporal_spread(&tracks, 10.0).unwrap_err();
        assert!(err.to_string().contains("temporal spread"));
    }

    #[test]
    fn overlapping_windows_merge() {
        let tracks = vec![track("t1", 0.0, 5.0, true), track("t2", 3.0, 8.0, true)];
        let err = check_temporal_spread(&tracks, 8.0);
        assert!(err.is_ok());
    }

    #[test]
    fn class_coverage_reports_missing_substring() {
        let mut progress = LabelProgress::default();
        progress.by_class.insert("car".to_string(), 3);
        let mut required = BTreeMap::new();
        required.insert("car".to_string(), 10);
        required.insert("pedestrian".to_string(), 5);
        let err = check_class_coverage(&progress, &required).unwrap_err();
        assert!(err.to_string().contains("class coverage"));
    }

    #[test]
    fn iou_of_disjoint_windows_is_zero() {
        assert_eq!(temporal_iou((0.0, 1.0), (2.0, 3.0)), 0.0);
    }

    #[test]
    fn iou_of_identical_windows_is_one() {
        assert_eq!(temporal_iou((0.0, 4.0), (0.0, 4.0)), 1.0);
    }
}
