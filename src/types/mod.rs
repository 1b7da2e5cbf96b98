//! Shared data-model types (spec.md §3).

pub mod autotune;
pub mod hil;
pub mod objective;
pub mod parameter;
pub mod request;
pub mod result;
pub mod state;

pub use autotune::{AutoTuneParam, AutoTuneRequest, AutoTuneState, Bounds, RoundSummary, ScoredResult, TuneStatus};
pub use hil::{ContinueSignal, HilRequest, HilState, HilStatus, LabelProgress, Scene};
pub use objective::{ObjectiveDefinition, Weights};
pub use parameter::{ParamMap, ParamRange, ParameterDescriptor, ScalarKind, ScalarValue};
pub use request::{decode_request, DataSource, SeedControl, SettleMode, SweepMode, SweepRequest, FULL_FILE_DURATION};
pub use result::{ComboResult, MetricSummary, Recommendation};
pub use state::{SweepState, SweepStatus};
