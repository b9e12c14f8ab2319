//! Engine wiring for mqtt-sim: assembling resolved streams, opening
//! brokers, and driving the scheduler (spec §4.5–§4.8).
//!
//! `mqttsim-cli` is the only thing above this crate; it loads and
//! validates the `Plan` (via `mqttsim-config`), then hands it to
//! [`open_publishers`] and [`resolved::build_resolved_streams`] before
//! calling [`scheduler::run`].

pub mod event_log;
pub mod reporter;
pub mod resolved;
pub mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;

use mqttsim_publisher::MqttPublisher;
use mqttsim_types::{Plan, TransportError};

pub use event_log::EventLog;
pub use mqttsim_publisher::Transport;
pub use reporter::{LogEvent, NullReporter, Reporter, StreamSnapshot};
pub use resolved::{build_resolved_streams, BuildError, ResolvedStream};
pub use scheduler::{FailurePolicy, RunOutcome};

/// Open one [`MqttPublisher`] per broker declared in `plan`. A
/// connection failure is fatal only for streams bound to that broker
/// (spec §7): the caller decides whether to proceed with the brokers
/// that did connect or abort entirely.
pub async fn open_publishers(
    plan: &Plan,
) -> HashMap<String, Result<Arc<MqttPublisher>, TransportError>> {
    let mut out = HashMap::with_capacity(plan.brokers.len());
    for broker in &plan.brokers {
        let opened = MqttPublisher::open(broker).await.map(Arc::new);
        out.insert(broker.name.clone(), opened);
    }
    out
}
