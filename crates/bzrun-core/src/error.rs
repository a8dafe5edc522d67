//! Error types for bzrun.

use thiserror::Error;

/// Fatal conditions that terminate a test run.
///
/// None of these are retried or swallowed: the first one raised aborts the
/// remaining launch plan and becomes the run's terminal result.
#[derive(Error, Debug)]
pub enum RunError {
    /// Required configuration is missing before any worker was launched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The worker process could not be started at all.
    #[error("Failed to start worker {key}: {source}")]
    Launch {
        /// Key of the worker whose process failed to spawn.
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A started worker completed with a non-zero exit status.
    #[error("Worker {key} exited with code {exit_code}")]
    Worker {
        /// Key of the failed worker.
        key: String,
        /// The worker process exit status.
        exit_code: i32,
    },

    /// External cancellation was requested mid-run.
    #[error("Run cancelled")]
    Cancelled,
}
