//! The two status sinks selected by `--output` (spec §4.6): a
//! periodically repainted table for interactive terminals, and
//! structured log lines otherwise. Both are the only things that write
//! to stdout while the engine runs, mirroring the teacher's progress
//! module (`shipper-cli::progress`) in spirit if not in specifics.

use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use mqttsim_core::{LogEvent, Reporter, StreamSnapshot};
use mqttsim_types::StreamState;

/// Repaints at up to 5 Hz (200 ms), which is indicatif's own redraw
/// cadence; concurrent `set_message` calls between frames are coalesced
/// by indicatif itself rather than by this reporter.
const TABLE_REFRESH_HZ: u8 = 5;

pub fn is_stdout_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub struct TableReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl TableReporter {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stdout_with_hz(TABLE_REFRESH_HZ));
        multi.println(format!(
            "{:<28} {:<8} {:>9} {:>6} {:>24} {:<24} {:<20}",
            "TOPIC", "STATE", "INTERVAL", "COUNT", "LAST PUB", "PAYLOAD", "ERR"
        ))
        .ok();
        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar_for(&self, id: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap();
        bars.entry(id.to_string())
            .or_insert_with(|| {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            })
            .clone()
    }
}

impl Default for TableReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TableReporter {
    fn update(&self, snapshot: StreamSnapshot) {
        let pb = self.bar_for(&snapshot.id);
        let state = &snapshot.state;
        let state_label = match state.state {
            StreamState::Pending => "PENDING",
            StreamState::Running => "RUNNING",
            StreamState::Errored => "ERRORED",
            StreamState::Stopped => "STOPPED",
        };
        let last_pub = state
            .last_published_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".to_string());
        let payload = state.last_payload_preview.as_deref().unwrap_or("-");
        let err = state.last_error.as_deref().unwrap_or("-");
        let line = format!(
            "{:<28} {:<8} {:>8.3}s {:>6} {:>24} {:<24} {:<20}",
            snapshot.topic,
            state_label,
            snapshot.interval.as_secs_f64(),
            state.publish_count,
            last_pub,
            truncate(payload, 24),
            truncate(err, 20),
        );
        pb.set_message(line);
    }

    fn log(&self, _event: LogEvent) {
        // The table's own rows already carry publish/error state;
        // individual log lines would duplicate what a row shows.
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max.saturating_sub(1)).collect::<String>() + "\u{2026}"
    }
}

pub struct LogReporter {
    verbose: bool,
}

impl LogReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for LogReporter {
    fn update(&self, _snapshot: StreamSnapshot) {
        // The log sink is event-driven (one line per outcome), not
        // snapshot-driven; see `log` below.
    }

    fn log(&self, event: LogEvent) {
        let now = chrono::Utc::now().to_rfc3339();
        match event {
            LogEvent::Publish {
                stream_id,
                topic,
                count,
                bytes,
                preview,
            } => {
                let mut line = format!(
                    "INFO {now} stream={stream_id} PUBLISH topic={topic} count={count} bytes={bytes}"
                );
                if self.verbose {
                    if let Some(preview) = preview {
                        line.push_str(&format!(" payload={preview}"));
                    }
                }
                println!("{line}");
            }
            LogEvent::Error {
                stream_id,
                topic,
                kind,
                message,
            } => {
                println!("ERROR {now} stream={stream_id} topic={topic} kind={kind} msg={message}");
            }
        }
    }
}
