//! # mqttsim-types
//!
//! Core domain types for the mqtt-sim traffic generator: the `Plan` data
//! model produced by the config loader, the generator/payload-builder
//! algebra's tagged variants, the per-stream runtime state the scheduler
//! mutates, and the closed error taxonomy shared across the engine.
//!
//! Nothing in this crate does I/O or holds stateful generator instances —
//! it is the vocabulary the other `mqttsim-*` crates share.

pub mod error;
pub mod plan;
pub mod runtime;
pub mod value;

pub use error::{ConfigError, GeneratorError, PayloadError, TransportError};
pub use plan::{
    BrokerSpec, BytesEncoding, Expansion, FieldSpec, Generator, NumericType, PayloadSpec, Plan,
    SequenceEncoding, StreamTemplate, TimestampMode,
};
pub use runtime::{StreamRuntimeState, StreamState};
pub use value::Value;
