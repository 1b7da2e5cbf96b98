//! Sweep Runner end-to-end scenarios (spec.md §8, properties 1-2).

use std::sync::Arc;
use std::time::Duration;

use lidar_tuner_os::backend::mock::MockSensorBackend;
use lidar_tuner_os::backend::SensorBackend;
use lidar_tuner_os::runner::{StartInput, SweepRunner};
use lidar_tuner_os::types::parameter::{ParameterDescriptor, ScalarKind, ScalarValue};
use lidar_tuner_os::types::request::{DataSource, SeedControl, SettleMode, SweepMode, SweepRequest};
use lidar_tuner_os::types::state::SweepStatus;

fn range_values(values: &[f64]) -> Vec<ScalarValue> {
    values.iter().copied().map(ScalarValue::Float).collect()
}

async fn wait_for_terminal(runner: &SweepRunner) -> lidar_tuner_os::types::state::SweepState {
    for _ in 0..200 {
        let snapshot = runner.snapshot().await;
        if matches!(snapshot.status, SweepStatus::Complete | SweepStatus::Error) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sweep did not reach a terminal state in time");
}

#[tokio::test]
async fn legacy_live_sweep_completes_with_single_result_and_no_warnings() {
    let backend: Arc<dyn SensorBackend> = Arc::new(MockSensorBackend::new());
    let runner = SweepRunner::new(backend);

    let request = SweepRequest {
        mode: SweepMode::Multi,
        noise_values: vec![0.01],
        closeness_values: vec![1.5],
        neighbour_values: vec![1],
        params: vec![],
        data_source: DataSource::Live,
        iterations: 1,
        interval: "10ms".to_string(),
        settle_time: "10ms".to_string(),
        settle_mode: SettleMode::PerCombo,
        seed_control: SeedControl::False,
        enable_recording: false,
    };

    runner.start(StartInput::Typed(request)).await.unwrap();
    let snapshot = wait_for_terminal(&runner).await;

    assert!(matches!(snapshot.status, SweepStatus::Complete));
    assert_eq!(snapshot.results.len(), 1);
    assert!(snapshot.warnings.is_empty());
}

#[tokio::test]
async fn stopping_mid_sweep_either_completes_or_reports_the_stopped_combination() {
    let backend: Arc<dyn SensorBackend> = Arc::new(MockSensorBackend::new());
    let runner = Arc::new(SweepRunner::new(backend));

    let request = SweepRequest {
        mode: SweepMode::Generic,
        noise_values: vec![],
        closeness_values: vec![],
        neighbour_values: vec![],
        params: vec![
            ParameterDescriptor {
                name: "a".to_string(),
                kind: ScalarKind::Float,
                values: Some(range_values(&[0.0, 0.2, 0.4, 0.6, 0.8])),
                range: None,
            },
            ParameterDescriptor {
                name: "b".to_string(),
                kind: ScalarKind::Float,
                values: Some(range_values(&[0.0, 0.5, 1.0])),
                range: None,
            },
            ParameterDescriptor {
                name: "c".to_string(),
                kind: ScalarKind::Float,
                values: Some(range_values(&[0.0, 1.0])),
                range: None,
            },
        ],
        data_source: DataSource::Live,
        iterations: 5,
        interval: "50ms".to_string(),
        settle_time: "10ms".to_string(),
        settle_mode: SettleMode::PerCombo,
        seed_control: SeedControl::False,
        enable_recording: false,
    };

    runner.start(StartInput::Typed(request)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    runner.stop();

    let snapshot = wait_for_terminal(&runner).await;
    match snapshot.status {
        SweepStatus::Complete => {}
        SweepStatus::Error => {
            let message = snapshot.error.unwrap_or_default();
            assert!(message.contains("sweep stopped at combination"));
        }
        other => panic!("unexpected terminal status {other:?}"),
    }
    // Invariant: completed_combos never counts the combination interrupted mid-flight.
    assert!(snapshot.completed_combos <= snapshot.total_combos);
}

#[tokio::test]
async fn snapshot_is_a_deep_copy_independent_of_later_progress() {
    let backend: Arc<dyn SensorBackend> = Arc::new(MockSensorBackend::new());
    let runner = SweepRunner::new(backend);

    let request = SweepRequest {
        mode: SweepMode::Multi,
        noise_values: vec![0.01, 0.02],
        closeness_values: vec![1.0],
        neighbour_values: vec![1],
        params: vec![],
        data_source: DataSource::Live,
        iterations: 1,
        interval: "5ms".to_string(),
        settle_time: "5ms".to_string(),
        settle_mode: SettleMode::PerCombo,
        seed_control: SeedControl::False,
        enable_recording: false,
    };

    runner.start(StartInput::Typed(request)).await.unwrap();
    let early = runner.snapshot().await;
    let early_completed = early.completed_combos;

    let _final_snapshot = wait_for_terminal(&runner).await;
    // The earlier snapshot must not have been mutated by later progress.
    assert_eq!(early.completed_combos, early_completed);
}
