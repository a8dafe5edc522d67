//! bzrun core - distributed test-run orchestration.
//!
//! Coordinates a distributed end-to-end test run against a remote
//! orchestration service:
//! - Normalizes raw run parameters into an immutable effective configuration
//! - Plans the ordered worker launches (helpers first, master last), each
//!   with a uniquely parameterized URL
//! - Launches each worker as an isolated process, strictly sequentially,
//!   streaming its output to the run log
//! - Folds worker exit statuses into a single run-level result, aborting on
//!   the first failure

pub mod config;
pub mod error;
pub mod fakes;
pub mod launcher;
pub mod pipeline;
pub mod plan;
pub mod sink;
pub mod telemetry;

// Re-export key types
pub use config::{EffectiveConfig, RunConfig};
pub use error::RunError;
pub use launcher::{DockerLauncher, LaunchContext, WorkerLauncher};
pub use pipeline::{RunPipeline, RunReport, WorkerOutcome};
pub use plan::{RunPlan, WorkerRole, WorkerSpec};
pub use sink::{LogSink, StdoutSink};
pub use telemetry::init_tracing;
