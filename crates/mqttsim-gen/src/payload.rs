//! Payload builders: turn a (substituted) `PayloadSpec` into publish
//! bytes plus a short human-readable preview for the Reporter (spec
//! §4.3, §4.6).

use base64::Engine;
use mqttsim_types::{BytesEncoding, FieldSpec, PayloadError, PayloadSpec, SequenceEncoding, Value};

use crate::generator::{build_generator, GenContext, ValueGenerator};

const PREVIEW_MAX_CHARS: usize = 120;

pub struct BuiltPayload {
    pub bytes: Vec<u8>,
    pub preview: String,
}

pub trait PayloadBuilder: Send {
    fn build(&mut self, ctx: &GenContext) -> Result<BuiltPayload, PayloadError>;
}

pub fn build_payload_builder(
    spec: &PayloadSpec,
) -> Result<Box<dyn PayloadBuilder>, PayloadError> {
    Ok(match spec {
        PayloadSpec::Text { value } => Box::new(TextBuilder {
            value: value.clone(),
        }),
        PayloadSpec::Bytes { value, encoding } => Box::new(BytesBuilder {
            value: value.clone(),
            encoding: *encoding,
        }),
        PayloadSpec::File { path } => Box::new(FileBuilder { path: path.clone() }),
        PayloadSpec::PickleFile { path } => Box::new(PickleFileBuilder { path: path.clone() }),
        PayloadSpec::Sequence {
            items,
            encoding,
            loop_,
        } => Box::new(SequenceBuilder {
            items: items.clone(),
            encoding: *encoding,
            loop_: *loop_,
            idx: 0,
        }),
        PayloadSpec::JsonFields { fields } => Box::new(JsonFieldsBuilder::new(fields)?),
    })
}

fn preview_of(s: &str) -> String {
    if s.chars().count() <= PREVIEW_MAX_CHARS {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{truncated}\u{2026}")
    }
}

struct TextBuilder {
    value: String,
}

impl PayloadBuilder for TextBuilder {
    fn build(&mut self, _ctx: &GenContext) -> Result<BuiltPayload, PayloadError> {
        Ok(BuiltPayload {
            preview: preview_of(&self.value),
            bytes: self.value.clone().into_bytes(),
        })
    }
}

struct BytesBuilder {
    value: String,
    encoding: BytesEncoding,
}

impl PayloadBuilder for BytesBuilder {
    fn build(&mut self, _ctx: &GenContext) -> Result<BuiltPayload, PayloadError> {
        let bytes = match self.encoding {
            BytesEncoding::Utf8 => self.value.clone().into_bytes(),
            BytesEncoding::Hex => {
                let cleaned: String = self.value.chars().filter(|c| !c.is_whitespace()).collect();
                hex::decode(&cleaned).map_err(|e| PayloadError::Decode {
                    encoding: "hex".into(),
                    message: e.to_string(),
                })?
            }
            BytesEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(&self.value)
                .map_err(|e| PayloadError::Decode {
                    encoding: "base64".into(),
                    message: e.to_string(),
                })?,
        };
        let preview = preview_of(&String::from_utf8_lossy(&bytes));
        Ok(BuiltPayload { bytes, preview })
    }
}

struct FileBuilder {
    path: String,
}

impl PayloadBuilder for FileBuilder {
    fn build(&mut self, _ctx: &GenContext) -> Result<BuiltPayload, PayloadError> {
        let bytes = std::fs::read(&self.path).map_err(|source| PayloadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let preview = preview_of(&String::from_utf8_lossy(&bytes));
        Ok(BuiltPayload { bytes, preview })
    }
}

struct PickleFileBuilder {
    path: String,
}

impl PayloadBuilder for PickleFileBuilder {
    fn build(&mut self, _ctx: &GenContext) -> Result<BuiltPayload, PayloadError> {
        let bytes = std::fs::read(&self.path).map_err(|source| PayloadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let preview = format!("<pickle {}B>", bytes.len());
        Ok(BuiltPayload { bytes, preview })
    }
}

struct SequenceBuilder {
    items: Vec<serde_json::Value>,
    encoding: SequenceEncoding,
    loop_: bool,
    idx: usize,
}

impl PayloadBuilder for SequenceBuilder {
    fn build(&mut self, _ctx: &GenContext) -> Result<BuiltPayload, PayloadError> {
        let item = self.items[self.idx].clone();
        self.idx += 1;
        if self.idx >= self.items.len() {
            self.idx = if self.loop_ { 0 } else { self.items.len() - 1 };
        }
        let bytes = match self.encoding {
            SequenceEncoding::Text => match item.as_str() {
                Some(s) => s.to_string().into_bytes(),
                None => item.to_string().into_bytes(),
            },
            SequenceEncoding::Json => serde_json::to_vec(&item)?,
        };
        let preview = preview_of(&String::from_utf8_lossy(&bytes));
        Ok(BuiltPayload { bytes, preview })
    }
}

struct JsonFieldsBuilder {
    fields: Vec<(String, Box<dyn ValueGenerator>)>,
}

impl JsonFieldsBuilder {
    fn new(fields: &[FieldSpec]) -> Result<Self, PayloadError> {
        let built = fields
            .iter()
            .map(|f| Ok((f.name.clone(), build_generator(&f.generator)?)))
            .collect::<Result<Vec<_>, mqttsim_types::GeneratorError>>()?;
        Ok(Self { fields: built })
    }
}

impl PayloadBuilder for JsonFieldsBuilder {
    fn build(&mut self, ctx: &GenContext) -> Result<BuiltPayload, PayloadError> {
        let mut pairs = Vec::with_capacity(self.fields.len());
        for (name, gen) in &mut self.fields {
            let value = gen.next(ctx)?;
            pairs.push((name.clone(), value));
        }
        let bytes = encode_ordered_object(&pairs);
        let preview = preview_of(&String::from_utf8_lossy(&bytes));
        Ok(BuiltPayload { bytes, preview })
    }
}

/// Serialize `pairs` as a JSON object with keys in the given order.
/// `serde_json::Map` without the `preserve_order` feature sorts keys, so
/// the object text is assembled directly instead (spec §4.3: "keys
/// emitted in declaration order").
fn encode_ordered_object(pairs: &[(String, Value)]) -> Vec<u8> {
    let mut out = String::from("{");
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json::to_string(key).expect("string keys always serialize"));
        out.push(':');
        out.push_str(&value.to_json().to_string());
    }
    out.push('}');
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqttsim_rng::SharedRng;
    use mqttsim_types::{Generator, NumericType};

    fn ctx(rng: &SharedRng) -> GenContext<'_> {
        GenContext { rng, now: 1_700_000_000.0 }
    }

    #[test]
    fn text_builder_roundtrips_bytes() {
        let rng = SharedRng::seeded(1);
        let mut b = build_payload_builder(&PayloadSpec::Text {
            value: "hello".into(),
        })
        .unwrap();
        let built = b.build(&ctx(&rng)).unwrap();
        assert_eq!(built.bytes, b"hello");
        assert_eq!(built.preview, "hello");
    }

    #[test]
    fn hex_bytes_decode_ignoring_whitespace() {
        let rng = SharedRng::seeded(1);
        let mut b = build_payload_builder(&PayloadSpec::Bytes {
            value: "68 65 6c 6c 6f".into(),
            encoding: BytesEncoding::Hex,
        })
        .unwrap();
        let built = b.build(&ctx(&rng)).unwrap();
        assert_eq!(built.bytes, b"hello");
    }

    #[test]
    fn base64_bytes_decode() {
        let rng = SharedRng::seeded(1);
        let mut b = build_payload_builder(&PayloadSpec::Bytes {
            value: "aGVsbG8=".into(),
            encoding: BytesEncoding::Base64,
        })
        .unwrap();
        let built = b.build(&ctx(&rng)).unwrap();
        assert_eq!(built.bytes, b"hello");
    }

    #[test]
    fn pickle_file_passthrough_byte_for_byte() {
        use std::io::Write;

        let rng = SharedRng::seeded(1);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"\x80\x04arbitrary-pickle-bytes\x00").unwrap();
        let mut b = build_payload_builder(&PayloadSpec::PickleFile {
            path: tmp.path().to_string_lossy().into_owned(),
        })
        .unwrap();
        let built = b.build(&ctx(&rng)).unwrap();
        assert_eq!(built.bytes, b"\x80\x04arbitrary-pickle-bytes\x00");
        assert_eq!(built.preview, format!("<pickle {}B>", built.bytes.len()));
    }

    #[test]
    fn sequence_builder_json_encoding() {
        let rng = SharedRng::seeded(1);
        let mut b = build_payload_builder(&PayloadSpec::Sequence {
            items: vec![serde_json::json!({"n": 1}), serde_json::json!({"n": 2})],
            encoding: SequenceEncoding::Json,
            loop_: true,
        })
        .unwrap();
        let first = b.build(&ctx(&rng)).unwrap();
        assert_eq!(first.bytes, br#"{"n":1}"#);
        let second = b.build(&ctx(&rng)).unwrap();
        assert_eq!(second.bytes, br#"{"n":2}"#);
        let third = b.build(&ctx(&rng)).unwrap();
        assert_eq!(third.bytes, br#"{"n":1}"#);
    }

    #[test]
    fn json_fields_preserves_declaration_order() {
        let rng = SharedRng::seeded(1);
        let mut b = build_payload_builder(&PayloadSpec::JsonFields {
            fields: vec![
                FieldSpec {
                    name: "b".into(),
                    generator: Generator::Const {
                        value: Value::Int(2),
                    },
                },
                FieldSpec {
                    name: "a".into(),
                    generator: Generator::Const {
                        value: Value::Int(1),
                    },
                },
            ],
        })
        .unwrap();
        let built = b.build(&ctx(&rng)).unwrap();
        assert_eq!(String::from_utf8(built.bytes).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn json_fields_rejects_invalid_bounds_at_construction() {
        let err = build_payload_builder(&PayloadSpec::JsonFields {
            fields: vec![FieldSpec {
                name: "x".into(),
                generator: Generator::NumberWalk {
                    min: 10.0,
                    max: 0.0,
                    step: 1.0,
                    numeric_type: NumericType::Float,
                    start: None,
                },
            }],
        })
        .unwrap_err();
        assert!(matches!(err, PayloadError::Generator(_)));
    }

}
