//! Run log sinks.

/// Line-oriented sink for a run's log output.
///
/// Worker process output is forwarded here verbatim, one line at a time,
/// interleaved with the orchestrator's own progress lines.
pub trait LogSink: Send + Sync {
    /// Append one line to the run log.
    fn line(&self, line: &str);
}

/// Sink that prints to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn line(&self, line: &str) {
        println!("{line}");
    }
}
