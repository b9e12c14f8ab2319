//! Turns the expander's template-free [`ExpandedStream`]s into fully
//! armed [`ResolvedStream`]s: one `PayloadBuilder` and one
//! `StreamRuntimeState` per stream, owned exclusively by the worker
//! that will drive it (spec §5, "Shared resources").

use std::time::Duration;

use mqttsim_expand::{expand_plan, ExpandedStream};
use mqttsim_gen::{build_payload_builder, PayloadBuilder};
use mqttsim_types::{ConfigError, PayloadError, Plan, StreamRuntimeState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

pub struct ResolvedStream {
    pub id: String,
    pub broker: String,
    pub topic: String,
    pub interval: Duration,
    pub qos: u8,
    pub retain: bool,
    pub payload_builder: Box<dyn PayloadBuilder>,
    pub state: StreamRuntimeState,
}

pub fn build_resolved_streams(plan: &Plan) -> Result<Vec<ResolvedStream>, BuildError> {
    let expanded = expand_plan(plan)?;
    expanded
        .into_iter()
        .map(resolve_one)
        .collect::<Result<Vec<_>, BuildError>>()
}

fn resolve_one(stream: ExpandedStream) -> Result<ResolvedStream, BuildError> {
    let payload_builder = build_payload_builder(&stream.payload)?;
    Ok(ResolvedStream {
        id: stream.id,
        broker: stream.broker,
        topic: stream.topic,
        interval: stream.interval,
        qos: stream.qos,
        retain: stream.retain,
        payload_builder,
        state: StreamRuntimeState::default(),
    })
}
