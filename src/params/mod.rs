//! Parameter descriptor expansion and the Cartesian product (spec.md §4.A).

use thiserror::Error;

use crate::config::defaults;
use crate::types::parameter::{ParamMap, ParameterDescriptor, ScalarKind, ScalarValue};

#[derive(Error, Debug)]
pub enum ParamError {
    #[error("parameter '{0}' declares neither values nor range")]
    NoValuesOrRange(String),
    #[error("parameter '{0}' range step must be > 0, got {1}")]
    NonPositiveStep(String, f64),
    #[error("parameter '{0}' range end must be >= start")]
    EndBeforeStart(String),
    #[error("parameter '{0}' expands to {1} values, exceeding the cap of {2}")]
    TooManyExpandedValues(String, usize, usize),
    #[error("parameter '{0}' kind {1} does not support range expansion")]
    RangeKindUnsupported(String, ScalarKind),
    #[error("too many parameters: {0}, max is {1}")]
    TooManyParameters(usize, usize),
    #[error("combination count {0} exceeds the cap of {1}")]
    TooManyCombinations(u128, u128),
}

/// Round to 3 decimal places — keeps expanded float ranges from accumulating
/// floating-point drift across thousands of steps.
fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Expand one descriptor to its concrete value list, per its `values` or
/// `range` field (mutually exclusive at the type level is not enforced;
/// `values` wins if both are present).
pub fn expand(desc: &ParameterDescriptor) -> Result<Vec<ScalarValue>, ParamError> {
    if let Some(values) = &desc.values {
        return Ok(values.clone());
    }

    if matches!(desc.kind, ScalarKind::Bool) {
        return Ok(vec![ScalarValue::Bool(true), ScalarValue::Bool(false)]);
    }

    let range = desc
        .range
        .as_ref()
        .ok_or_else(|| ParamError::NoValuesOrRange(desc.name.clone()))?;

    if range.step <= 0.0 {
        return Err(ParamError::NonPositiveStep(desc.name.clone(), range.step));
    }
    if range.end < range.start {
        return Err(ParamError::EndBeforeStart(desc.name.clone()));
    }

    let count = (((range.end - range.start) / range.step).floor() as usize) + 1;
    if count > defaults::MAX_EXPANDED_VALUES {
        return Err(ParamError::TooManyExpandedValues(
            desc.name.clone(),
            count,
            defaults::MAX_EXPANDED_VALUES,
        ));
    }

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let v = round3(range.start + range.step * i as f64);
        let scalar = match desc.kind {
            ScalarKind::Float => ScalarValue::Float(v),
            ScalarKind::Int => ScalarValue::Int(v.round() as i64),
            ScalarKind::Int64 => ScalarValue::Int(v.round() as i64),
            ScalarKind::Bool => unreachable!("Bool kind is handled before range expansion"),
            ScalarKind::String => {
                return Err(ParamError::RangeKindUnsupported(desc.name.clone(), desc.kind));
            }
        };
        out.push(scalar);
    }
    Ok(out)
}

/// Build the Cartesian product of every descriptor's expanded values, in
/// odometer order — the last descriptor's value varies fastest, matching
/// spec.md §4.A's canonical ordering.
pub fn cartesian_product(descriptors: &[ParameterDescriptor]) -> Result<Vec<ParamMap>, ParamError> {
    if descriptors.len() > defaults::MAX_GENERIC_PARAMS {
        return Err(ParamError::TooManyParameters(descriptors.len(), defaults::MAX_GENERIC_PARAMS));
    }

    let expanded: Vec<Vec<ScalarValue>> = descriptors.iter().map(expand).collect::<Result<_, _>>()?;

    let total: u128 = expanded.iter().map(|v| v.len() as u128).product();
    if total > defaults::MAX_COMBOS {
        return Err(ParamError::TooManyCombinations(total, defaults::MAX_COMBOS));
    }

    let total = total as usize;
    let mut combos = Vec::with_capacity(total);
    if descriptors.is_empty() {
        return Ok(combos);
    }

    let mut indices = vec![0usize; descriptors.len()];
    for _ in 0..total {
        let mut map = ParamMap::new();
        for (dim, d) in descriptors.iter().enumerate() {
            map.insert(d.name.clone(), expanded[dim][indices[dim]].clone());
        }
        combos.push(map);

        // advance odometer, last dimension fastest
        for pos in (0..indices.len()).rev() {
            indices[pos] += 1;
            if indices[pos] < expanded[pos].len() {
                break;
            }
            indices[pos] = 0;
        }
    }

    Ok(combos)
}
