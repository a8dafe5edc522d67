//! Sequential run orchestration.
//!
//! [`RunPipeline::run`] ties the pure planner to the effectful launcher:
//! validate and normalize the configuration, compute the plan, then launch
//! each worker strictly one at a time, helpers before master. The first
//! non-zero exit, spawn failure, or cancellation aborts the remainder of
//! the plan and becomes the run's terminal result.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::error::RunError;
use crate::launcher::{LaunchContext, WorkerLauncher};
use crate::plan::{RunPlan, WorkerRole};

/// Outcome of one completed worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOutcome {
    /// Worker key.
    pub key: String,

    /// Master or helper.
    pub role: WorkerRole,

    /// Exit status, always 0 in a report (failures abort the run).
    pub exit_code: i32,

    /// Wall-clock duration of the worker process in milliseconds.
    pub duration_ms: u64,
}

/// Summary of a fully successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique ID assigned to this run.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Deterministic identity of the executed plan.
    pub plan_digest: String,

    /// Per-worker outcomes in launch order.
    pub workers: Vec<WorkerOutcome>,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Always true; failed runs surface as [`RunError`] instead.
    pub success: bool,
}

/// Sequential worker-launch orchestrator.
pub struct RunPipeline;

impl RunPipeline {
    /// Execute a full run: normalize, plan, launch in order, abort on the
    /// first failure.
    ///
    /// The full generated URL and a parameter summary are written to the
    /// context's log sink for every worker before it is launched, so a
    /// failing run can be diagnosed after the fact.
    pub async fn run(
        config: &RunConfig,
        launcher: &dyn WorkerLauncher,
        ctx: &LaunchContext,
    ) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let effective = config.normalize()?;
        let plan = RunPlan::build(&effective);
        let plan_digest = plan.digest();
        let run_id = Uuid::new_v4().to_string();

        info!(run_id = %run_id, plan = %plan_digest, workers = plan.len(), "Starting test run");

        ctx.sink.line("Running with the following parameters:");
        ctx.sink.line(&format!(
            "TEST={}, BRANCH={}, WORKERS={}",
            effective.test, effective.branch, effective.workers
        ));

        let mut outcomes = Vec::with_capacity(plan.len());
        for spec in plan.iter() {
            // Cancellation between launches: stop before starting the next worker.
            if ctx.cancel.is_cancelled() {
                info!(run_id = %run_id, "Run cancelled before worker {}", spec.key);
                return Err(RunError::Cancelled);
            }

            if spec.role == WorkerRole::Master && plan.len() > 1 {
                ctx.sink
                    .line("All helper workers started. Starting master.");
            }
            ctx.sink
                .line(&format!("Starting worker {} with URL: {}", spec.key, spec.url));

            let worker_start = Instant::now();
            let exit_code = launcher.launch(spec, ctx).await?;
            let duration_ms = worker_start.elapsed().as_millis() as u64;

            if exit_code != 0 {
                info!(run_id = %run_id, worker = %spec.key, exit_code, "Worker failed, aborting run");
                return Err(RunError::Worker {
                    key: spec.key.clone(),
                    exit_code,
                });
            }

            outcomes.push(WorkerOutcome {
                key: spec.key.clone(),
                role: spec.role,
                exit_code,
                duration_ms,
            });
        }

        ctx.sink.line("All workers completed.");
        info!(run_id = %run_id, "Test run completed successfully");

        Ok(RunReport {
            run_id,
            started_at,
            plan_digest,
            workers: outcomes,
            duration_ms: start.elapsed().as_millis() as u64,
            success: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemorySink, ScriptedLauncher};
    use std::sync::Arc;

    fn config(workers: u32) -> RunConfig {
        RunConfig {
            workers,
            ..RunConfig::new("t1", "p1")
        }
    }

    #[tokio::test]
    async fn test_report_carries_outcomes_in_launch_order() {
        let launcher = ScriptedLauncher::all_exit(0);
        let ctx = LaunchContext::new(".", Vec::new(), Arc::new(MemorySink::new()));

        let report = RunPipeline::run(&config(3), &launcher, &ctx)
            .await
            .expect("run failed");

        assert!(report.success);
        let keys: Vec<&str> = report.workers.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["2", "3", "1"]);
        assert!(!report.run_id.is_empty());
        assert!(!report.plan_digest.is_empty());
    }

    #[tokio::test]
    async fn test_worker_failure_reports_key_and_code() {
        let launcher = ScriptedLauncher::all_exit(0).with_exit("3", 42);
        let ctx = LaunchContext::new(".", Vec::new(), Arc::new(MemorySink::new()));

        let err = RunPipeline::run(&config(3), &launcher, &ctx)
            .await
            .unwrap_err();

        match err {
            RunError::Worker { key, exit_code } => {
                assert_eq!(key, "3");
                assert_eq!(exit_code, 42);
            }
            other => panic!("expected worker failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_serde_roundtrip_of_report() {
        let launcher = ScriptedLauncher::all_exit(0);
        let ctx = LaunchContext::new(".", Vec::new(), Arc::new(MemorySink::new()));
        let report = RunPipeline::run(&config(1), &launcher, &ctx)
            .await
            .expect("run failed");

        let json = serde_json::to_string(&report).expect("serialize");
        let back: RunReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.run_id, report.run_id);
        assert_eq!(back.workers.len(), 1);
    }
}
