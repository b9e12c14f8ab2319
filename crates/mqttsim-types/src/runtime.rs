use serde::{Deserialize, Serialize};

/// The tiny per-stream state machine the scheduler drives (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Pending,
    Running,
    Errored,
    Stopped,
}

/// Mutated only by the owning stream's own worker task; the Reporter
/// only ever reads a cloned snapshot (spec §3 Ownership & lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRuntimeState {
    pub state: StreamState,
    pub publish_count: u64,
    pub last_published_ms: Option<i64>,
    pub last_payload_preview: Option<String>,
    pub last_error: Option<String>,
    pub cumulative_errors: u64,
}

impl Default for StreamRuntimeState {
    fn default() -> Self {
        Self {
            state: StreamState::Pending,
            publish_count: 0,
            last_published_ms: None,
            last_payload_preview: None,
            last_error: None,
            cumulative_errors: 0,
        }
    }
}

impl StreamRuntimeState {
    pub fn record_success(&mut self, preview: String, now_ms: i64) {
        self.state = StreamState::Running;
        self.publish_count += 1;
        self.last_published_ms = Some(now_ms);
        self.last_payload_preview = Some(preview);
    }

    pub fn record_error(&mut self, message: String) {
        self.state = StreamState::Errored;
        self.last_error = Some(message);
        self.cumulative_errors += 1;
    }

    pub fn record_stopped(&mut self) {
        self.state = StreamState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Tick {
        Success,
        Error,
        Stopped,
    }

    fn tick() -> impl Strategy<Value = Tick> {
        prop_oneof![
            Just(Tick::Success),
            Just(Tick::Error),
            Just(Tick::Stopped),
        ]
    }

    proptest! {
        // publish_count and cumulative_errors never go backwards no
        // matter what sequence of events the worker records (spec §8,
        // "monotone state").
        #[test]
        fn counters_never_decrease(ticks in prop::collection::vec(tick(), 0..50)) {
            let mut state = StreamRuntimeState::default();
            let mut last_publishes = 0;
            let mut last_errors = 0;
            for (i, t) in ticks.into_iter().enumerate() {
                match t {
                    Tick::Success => state.record_success(format!("p{i}"), i as i64),
                    Tick::Error => state.record_error(format!("e{i}")),
                    Tick::Stopped => state.record_stopped(),
                }
                prop_assert!(state.publish_count >= last_publishes);
                prop_assert!(state.cumulative_errors >= last_errors);
                last_publishes = state.publish_count;
                last_errors = state.cumulative_errors;
            }
        }
    }
}
