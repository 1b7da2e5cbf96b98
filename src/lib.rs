//! lidar-tuner-os: LiDAR parameter optimisation control plane
//!
//! Three layered state machines:
//!
//! - [`runner`] — the Sweep Runner: evaluates a bounded Cartesian product of
//!   parameter combinations against a sensor backend.
//! - [`autotune`] — the Auto-Tuner: a multi-round adaptive search that reuses
//!   the Runner as its inner loop and narrows bounds around top scorers.
//! - [`hil`] — the Human-in-the-Loop Tuner: alternates reference runs, label
//!   waiting, and auto-tune sweeps against human-labelled ground truth.
//!
//! The HTTP/RPC layer, the concrete database persister, the analysis-run
//! creator, the label-progress querier, the scene store backend, the
//! ground-truth scoring pipeline, and the sensor's wire protocol are all
//! consumed through traits here ([`persistence`], [`backend`]) rather than
//! implemented — see each trait's doc comment for the production contract.

pub mod config;
pub mod duration;
pub mod error;
pub mod stats;
pub mod types;
pub mod params;
pub mod backend;
pub mod sampler;
pub mod objective;
pub mod persistence;
pub mod runner;
pub mod autotune;
pub mod hil;

pub use error::TunerError;
pub use types::*;
