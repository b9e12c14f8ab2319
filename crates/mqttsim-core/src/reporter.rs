//! The Status Reporter (spec §4.6): workers push snapshots and log
//! events through this trait, and a sink (table or log, owned by
//! `mqttsim-cli`) is the only thing that writes to stdout.

use std::time::Duration;

use mqttsim_types::StreamRuntimeState;

/// A consistent, per-stream snapshot — never a partial update of one
/// row (spec §5, "Ordering guarantees").
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    pub id: String,
    pub topic: String,
    pub interval: Duration,
    pub state: StreamRuntimeState,
}

/// One occurrence worth surfacing to a log sink or the file log.
#[derive(Debug, Clone)]
pub enum LogEvent {
    Publish {
        stream_id: String,
        topic: String,
        count: u64,
        bytes: usize,
        preview: Option<String>,
    },
    Error {
        stream_id: String,
        topic: String,
        kind: String,
        message: String,
    },
}

/// Implemented by whatever renders run status. All instances handed to
/// the scheduler must be `Send + Sync`: every stream worker pushes
/// updates concurrently (spec §5, "Shared resources").
pub trait Reporter: Send + Sync {
    fn update(&self, snapshot: StreamSnapshot);
    fn log(&self, event: LogEvent);
}

/// Discards everything; used by tests and library callers that don't
/// need status output.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn update(&self, _snapshot: StreamSnapshot) {}
    fn log(&self, _event: LogEvent) {}
}
