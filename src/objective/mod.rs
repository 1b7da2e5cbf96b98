//! Objective-function registry (spec.md §4.D).
//!
//! Grounded on the teacher's use of `dashmap::DashMap` for concurrently
//! accessible registries; scoring functions are plain `fn` pointers rather
//! than trait objects since none of the built-ins need per-instance state.

use dashmap::DashMap;

use crate::types::objective::{ObjectiveDefinition, Weights};
use crate::types::result::ComboResult;
use crate::TunerError;

pub type ScoreFn = fn(&ComboResult, &Weights) -> f64;

#[derive(Clone)]
pub struct Objective {
    pub definition: ObjectiveDefinition,
    pub score: ScoreFn,
}

/// Weighted composite of acceptance, grid coverage and track health — the
/// default objective used when a request does not name one.
pub fn score_weighted(combo: &ComboResult, weights: &Weights) -> f64 {
    let acceptance = combo.overall_acceptance.mean;
    let nonzero = combo.nonzero_cells.mean;
    let track_health = combo
        .track_health
        .get("confirmed_track_ratio")
        .map(|m| m.mean)
        .unwrap_or(0.0);
    let detection_rate = 1.0
        - combo
            .track_health
            .get("miss_rate")
            .map(|m| m.mean)
            .unwrap_or(0.0);
    let false_positive = combo
        .track_health
        .get("false_track_rate")
        .map(|m| m.mean)
        .unwrap_or(0.0);

    weights.acceptance * acceptance + weights.nonzero_cells * nonzero + weights.track_health * track_health
        + weights.detection_rate * detection_rate
        - weights.false_positive * false_positive
}

/// Pure acceptance-rate objective, ignoring grid coverage and tracking.
pub fn score_acceptance(combo: &ComboResult, _weights: &Weights) -> f64 {
    combo.overall_acceptance.mean
}

/// Placeholder for ground-truth-label scoring: not wired to a labelled
/// dataset in this crate, so it always scores zero and callers needing a
/// real ground-truth objective must `register` their own.
pub fn score_ground_truth_sentinel(_combo: &ComboResult, _weights: &Weights) -> f64 {
    0.0
}

/// Thread-safe registry of named objective functions.
pub struct ObjectiveRegistry {
    objectives: DashMap<String, Objective>,
}

impl ObjectiveRegistry {
    pub fn new() -> Self {
        let registry = Self {
            objectives: DashMap::new(),
        };
        registry.register(Objective {
            definition: ObjectiveDefinition {
                name: "weighted".to_string(),
                version: "1.0.0".to_string(),
                description: "Weighted composite of acceptance, grid coverage and track health".to_string(),
                required_input_features: vec![
                    "overall_acceptance".to_string(),
                    "nonzero_cells".to_string(),
                    "track_health".to_string(),
                ],
            },
            score: score_weighted,
        });
        registry.register(Objective {
            definition: ObjectiveDefinition {
                name: "acceptance".to_string(),
                version: "1.0.0".to_string(),
                description: "Raw acceptance rate, unweighted".to_string(),
                required_input_features: vec!["overall_acceptance".to_string()],
            },
            score: score_acceptance,
        });
        registry.register(Objective {
            definition: ObjectiveDefinition {
                name: "ground_truth".to_string(),
                version: "0.0.0".to_string(),
                description: "Ground-truth label scorer (not configured by default)".to_string(),
                required_input_features: vec![],
            },
            score: score_ground_truth_sentinel,
        });
        registry
    }

    pub fn register(&self, objective: Objective) {
        self.objectives.insert(objective.definition.name.clone(), objective);
    }

    pub fn get(&self, name: &str) -> Result<Objective, TunerError> {
        self.objectives
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TunerError::Validation(format!("unknown objective '{name}'")))
    }

    /// All registered objective definitions, sorted by name.
    pub fn list(&self) -> Vec<ObjectiveDefinition> {
        let mut defs: Vec<ObjectiveDefinition> = self.objectives.iter().map(|e| e.value().definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

impl Default for ObjectiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}
