use thiserror::Error;

/// Fatal at load time: schema, validation, template-variable, and
/// path-resolution failures. The loader/expander stop at the first one
/// encountered (spec §4.1) and surface a JSON-pointer-qualified message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{pointer}: {message}")]
pub struct ConfigError {
    /// JSON pointer to the offending node, e.g. `streams[3].payload.kind`.
    pub pointer: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            message: message.into(),
        }
    }
}

/// Generator misuse: invalid bounds, an expression that failed to
/// evaluate, or an exhausted closed-form domain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("invalid bounds: min {min} > max {max}")]
    InvalidBounds { min: String, max: String },
    #[error("expression evaluation failed: {0}")]
    Expression(String),
    #[error("generator produced no values: {0}")]
    Empty(String),
}

/// Failure while turning a `PayloadSpec` into publish bytes: file I/O,
/// decoding, generation, or serialization.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {encoding} payload: {message}")]
    Decode { encoding: String, message: String },
    #[error("failed to serialize payload as JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Broker connection or publish failure, surfaced by the Publisher
/// capability (spec §4.4).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to broker {broker}: {message}")]
    Connect { broker: String, message: String },
    #[error("failed to publish to {topic} on broker {broker}: {message}")]
    Publish {
        broker: String,
        topic: String,
        message: String,
    },
    #[error("failed to disconnect from broker {broker}: {message}")]
    Disconnect { broker: String, message: String },
}
