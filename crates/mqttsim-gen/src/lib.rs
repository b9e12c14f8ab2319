//! Generator algebra and payload builders (spec §4.3).
//!
//! `mqttsim-core` attaches one [`payload::PayloadBuilder`] per resolved
//! stream and calls it once per tick; `json_fields` payloads in turn own
//! one [`generator::ValueGenerator`] per field. Both traits are
//! object-safe so the scheduler can hold a homogeneous
//! `Vec<Box<dyn PayloadBuilder>>` without knowing which payload kind
//! backs each stream.

pub mod generator;
pub mod payload;

pub use generator::{build_generator, GenContext, ValueGenerator};
pub use payload::{build_payload_builder, BuiltPayload, PayloadBuilder};
