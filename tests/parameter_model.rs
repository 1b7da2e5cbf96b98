//! Parameter-model round-trip/idempotence properties (spec.md §8).

use lidar_tuner_os::params::{cartesian_product, expand};
use lidar_tuner_os::types::parameter::{ParamRange, ParameterDescriptor, ScalarKind, ScalarValue};

fn range_desc(name: &str, start: f64, end: f64, step: f64) -> ParameterDescriptor {
    ParameterDescriptor {
        name: name.to_string(),
        kind: ScalarKind::Float,
        values: None,
        range: Some(ParamRange { start, end, step }),
    }
}

#[test]
fn expansion_respects_bounds_and_length_cap() {
    let desc = range_desc("noise", 0.0, 1.0, 0.3);
    let values = expand(&desc).unwrap();

    let expected_max_len = (((1.0 - 0.0) / 0.3).ceil() as usize) + 1;
    assert!(values.len() <= expected_max_len);

    for v in &values {
        let f = v.as_f64().unwrap();
        assert!(f >= 0.0 - 1e-9 && f <= 1.0 + 1e-9);
    }
}

#[test]
fn cartesian_product_size_matches_product_of_lengths() {
    let a = range_desc("a", 0.0, 1.0, 1.0); // 2 values: 0, 1
    let b = range_desc("b", 0.0, 2.0, 1.0); // 3 values: 0, 1, 2
    let combos = cartesian_product(&[a, b]).unwrap();
    assert_eq!(combos.len(), 2 * 3);
}

#[test]
fn cartesian_product_orders_last_axis_fastest() {
    let a = ParameterDescriptor {
        name: "a".to_string(),
        kind: ScalarKind::Int,
        values: Some(vec![ScalarValue::Int(1), ScalarValue::Int(2)]),
        range: None,
    };
    let b = ParameterDescriptor {
        name: "b".to_string(),
        kind: ScalarKind::Int,
        values: Some(vec![ScalarValue::Int(10), ScalarValue::Int(20)]),
        range: None,
    };
    let combos = cartesian_product(&[a, b]).unwrap();
    let seq: Vec<(i64, i64)> = combos
        .iter()
        .map(|c| {
            let a = match c["a"] {
                ScalarValue::Int(v) => v,
                _ => unreachable!(),
            };
            let b = match c["b"] {
                ScalarValue::Int(v) => v,
                _ => unreachable!(),
            };
            (a, b)
        })
        .collect();
    assert_eq!(seq, vec![(1, 10), (1, 20), (2, 10), (2, 20)]);
}
