//! Append-only JSONL file log at `.mqtt-sim/logs/mqtt-sim.log` (spec
//! §6 "File logs", §7 "structured entry with timestamp, stream id,
//! kind, and message").

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

use crate::reporter::LogEvent;

pub const LOG_DIR: &str = ".mqtt-sim/logs";
pub const LOG_FILE: &str = "mqtt-sim.log";

pub fn default_log_path() -> PathBuf {
    Path::new(LOG_DIR).join(LOG_FILE)
}

#[derive(Debug, Serialize)]
struct FileLogRecord<'a> {
    timestamp: String,
    stream_id: &'a str,
    kind: &'a str,
    message: String,
}

/// One writer shared by every worker task; appends are serialized
/// behind a mutex since JSONL lines must not interleave.
pub struct EventLog {
    writer: Mutex<BufWriter<File>>,
}

impl EventLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn record(&self, event: &LogEvent) {
        let record = match event {
            LogEvent::Publish {
                stream_id,
                topic,
                count,
                bytes,
                ..
            } => FileLogRecord {
                timestamp: Utc::now().to_rfc3339(),
                stream_id,
                kind: "publish",
                message: format!("topic={topic} count={count} bytes={bytes}"),
            },
            LogEvent::Error {
                stream_id,
                topic,
                kind,
                message,
            } => FileLogRecord {
                timestamp: Utc::now().to_rfc3339(),
                stream_id,
                kind,
                message: format!("topic={topic} msg={message}"),
            },
        };
        if let Ok(line) = serde_json::to_string(&record) {
            if let Ok(mut w) = self.writer.lock() {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_jsonl_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mqtt-sim.log");
        let log = EventLog::open(&path).unwrap();
        log.record(&LogEvent::Publish {
            stream_id: "0".into(),
            topic: "t".into(),
            count: 1,
            bytes: 5,
            preview: None,
        });
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"kind\":\"publish\""));
    }
}
