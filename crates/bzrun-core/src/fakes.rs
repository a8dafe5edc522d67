//! In-memory test doubles for the launcher seam and the log sink.
//!
//! Shipped as a normal module so the crate's integration tests (and
//! downstream consumers) can drive the pipeline without docker.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RunError;
use crate::launcher::{LaunchContext, WorkerLauncher};
use crate::plan::WorkerSpec;
use crate::sink::LogSink;

/// Log sink collecting lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines received so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// Launcher double that records launch order and replays scripted exit codes.
///
/// Every worker exits with the default code unless overridden per key;
/// keys listed as spawn failures return [`RunError::Launch`] instead of
/// an exit status.
pub struct ScriptedLauncher {
    default_code: i32,
    exit_codes: HashMap<String, i32>,
    spawn_failures: HashSet<String>,
    launched: Mutex<Vec<String>>,
}

impl ScriptedLauncher {
    /// Launcher where every worker exits with `code`.
    pub fn all_exit(code: i32) -> Self {
        Self {
            default_code: code,
            exit_codes: HashMap::new(),
            spawn_failures: HashSet::new(),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Override the exit code for one worker key.
    pub fn with_exit(mut self, key: &str, code: i32) -> Self {
        self.exit_codes.insert(key.to_string(), code);
        self
    }

    /// Make spawning fail outright for one worker key.
    pub fn with_spawn_failure(mut self, key: &str) -> Self {
        self.spawn_failures.insert(key.to_string());
        self
    }

    /// Worker keys in the order they were launched.
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerLauncher for ScriptedLauncher {
    async fn launch(&self, spec: &WorkerSpec, _ctx: &LaunchContext) -> Result<i32, RunError> {
        self.launched.lock().unwrap().push(spec.key.clone());

        if self.spawn_failures.contains(&spec.key) {
            return Err(RunError::Launch {
                key: spec.key.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "scripted spawn failure",
                ),
            });
        }

        Ok(self
            .exit_codes
            .get(&spec.key)
            .copied()
            .unwrap_or(self.default_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::WorkerRole;
    use std::sync::Arc;

    fn spec(key: &str) -> WorkerSpec {
        WorkerSpec {
            key: key.to_string(),
            role: WorkerRole::Helper,
            number: 2,
            url: "https://bh.example.com/extension".to_string(),
        }
    }

    fn ctx() -> LaunchContext {
        LaunchContext::new(".", Vec::new(), Arc::new(MemorySink::new()))
    }

    #[tokio::test]
    async fn test_scripted_exit_codes() {
        let launcher = ScriptedLauncher::all_exit(0).with_exit("2", 9);
        let ctx = ctx();

        assert_eq!(launcher.launch(&spec("3"), &ctx).await.unwrap(), 0);
        assert_eq!(launcher.launch(&spec("2"), &ctx).await.unwrap(), 9);
        assert_eq!(launcher.launched(), ["3", "2"]);
    }

    #[tokio::test]
    async fn test_scripted_spawn_failure() {
        let launcher = ScriptedLauncher::all_exit(0).with_spawn_failure("2");
        let err = launcher.launch(&spec("2"), &ctx()).await.unwrap_err();
        assert!(matches!(err, RunError::Launch { .. }));
    }

    #[test]
    fn test_memory_sink_collects_lines() {
        let sink = MemorySink::new();
        sink.line("one");
        sink.line("two");
        assert_eq!(sink.lines(), ["one", "two"]);
    }
}
