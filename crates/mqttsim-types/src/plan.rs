use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The fully validated, immutable configuration tree produced by the
/// config loader. Read-only from the moment it is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub schema_version: u32,
    pub brokers: Vec<BrokerSpec>,
    pub streams: Vec<StreamTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerSpec {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_keepalive")]
    pub keepalive: u16,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_port() -> u16 {
    1883
}

fn default_keepalive() -> u16 {
    60
}

/// A stream declaration that may expand into multiple resolved streams
/// (spec §4.2). `topic` and every string-valued payload field are
/// templates over the variable named by `expand`, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamTemplate {
    #[serde(default)]
    pub name: Option<String>,
    pub broker: String,
    pub topic: String,
    pub interval: f64,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
    pub payload: PayloadSpec,
    #[serde(default)]
    pub expand: Option<Expansion>,
}

/// The rule producing resolved streams from a template: `range` or
/// `list` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Expansion {
    Range {
        var: String,
        start: i64,
        stop: i64,
        #[serde(default = "default_step")]
        step: i64,
        #[serde(default = "default_true")]
        inclusive: bool,
    },
    List {
        var: String,
        values: Vec<String>,
    },
}

fn default_step() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

/// Closed set of ways to produce publish bytes from a tick (spec §3/4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PayloadSpec {
    Text {
        value: String,
    },
    Bytes {
        value: String,
        encoding: BytesEncoding,
    },
    File {
        path: String,
    },
    PickleFile {
        path: String,
    },
    Sequence {
        items: Vec<serde_json::Value>,
        encoding: SequenceEncoding,
        #[serde(rename = "loop", default = "default_true")]
        loop_: bool,
    },
    JsonFields {
        fields: Vec<FieldSpec>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BytesEncoding {
    Utf8,
    Hex,
    Base64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceEncoding {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub generator: Generator,
}

/// A stateful single-value producer used inside `json_fields` (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Generator {
    Const {
        value: Value,
    },
    BoolToggle {
        #[serde(default)]
        start: bool,
    },
    NumberWalk {
        min: f64,
        max: f64,
        step: f64,
        numeric_type: NumericType,
        #[serde(default)]
        start: Option<f64>,
    },
    NumberRandom {
        min: f64,
        max: f64,
        numeric_type: NumericType,
        #[serde(default)]
        precision: Option<u32>,
    },
    Choice {
        values: Vec<Value>,
    },
    Sequence {
        values: Vec<Value>,
        #[serde(rename = "loop", default = "default_true")]
        loop_: bool,
    },
    Expression {
        expression: String,
    },
    Timestamp {
        mode: TimestampMode,
    },
    Uuid {},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericType {
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    Iso,
    Unix,
}
