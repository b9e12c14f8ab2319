//! Stream template expansion (spec §4.2).
//!
//! Turns each `StreamTemplate` in a validated [`Plan`] into one or more
//! [`ExpandedStream`]s: `range`/`list` expansion produces the finite
//! ordered sequence of substitution contexts, and `{name}`-style
//! substitution resolves `topic` and every string-valued payload
//! position against that context.

use std::collections::HashMap;
use std::time::Duration;

use mqttsim_types::{ConfigError, Expansion, FieldSpec, Generator, PayloadSpec, Plan, Value};

/// One concrete publisher instance: one topic, one interval, one
/// (still-template-free) payload spec. Stateful generators and
/// `StreamRuntimeState` are attached by the scheduler, not here (spec §3
/// Ownership & lifecycle — the expander only produces the template-free
/// shape).
#[derive(Debug, Clone)]
pub struct ExpandedStream {
    pub id: String,
    pub name: Option<String>,
    pub broker: String,
    pub topic: String,
    pub interval: Duration,
    pub qos: u8,
    pub retain: bool,
    pub payload: PayloadSpec,
}

/// Expand every template in `plan`, in template order then expansion
/// order, producing a deterministic, pure-function-of-the-plan sequence
/// (spec §8, invariant 1).
pub fn expand_plan(plan: &Plan) -> Result<Vec<ExpandedStream>, ConfigError> {
    let mut out = Vec::new();
    for (idx, template) in plan.streams.iter().enumerate() {
        out.extend(expand_template(idx, template)?);
    }
    Ok(out)
}

fn expand_template(
    idx: usize,
    template: &mqttsim_types::StreamTemplate,
) -> Result<Vec<ExpandedStream>, ConfigError> {
    let contexts: Vec<(String, HashMap<String, String>)> = match &template.expand {
        None => vec![(idx.to_string(), HashMap::new())],
        Some(Expansion::Range {
            var,
            start,
            stop,
            step,
            inclusive,
        }) => range_values(*start, *stop, *step, *inclusive)
            .into_iter()
            .map(|v| {
                let mut ctx = HashMap::new();
                ctx.insert(var.clone(), v.to_string());
                (format!("{idx}:{v}"), ctx)
            })
            .collect(),
        Some(Expansion::List { var, values }) => values
            .iter()
            .map(|v| {
                let mut ctx = HashMap::new();
                ctx.insert(var.clone(), v.clone());
                (format!("{idx}:{v}"), ctx)
            })
            .collect(),
    };

    let pointer = format!("streams[{idx}]");
    let mut out = Vec::with_capacity(contexts.len());
    for (id, ctx) in contexts {
        let topic = substitute(&template.topic, &ctx, &pointer)?;
        let payload = substitute_payload(&template.payload, &ctx, &pointer)?;
        out.push(ExpandedStream {
            id,
            name: template.name.clone(),
            broker: template.broker.clone(),
            topic,
            interval: Duration::from_secs_f64(template.interval),
            qos: template.qos,
            retain: template.retain,
            payload,
        });
    }
    Ok(out)
}

/// Enumerate integers from `start`, adding `step` each iteration, until
/// `stop` would be passed; includes `stop` itself when `inclusive` and
/// `stop` lies on the `start + k*step` lattice. Negative `step`
/// enumerates downward (spec §4.2).
pub fn range_values(start: i64, stop: i64, step: i64, inclusive: bool) -> Vec<i64> {
    let mut out = Vec::new();
    let mut v = start;
    if step > 0 {
        while v < stop || (inclusive && v == stop) {
            out.push(v);
            v += step;
        }
    } else if step < 0 {
        while v > stop || (inclusive && v == stop) {
            out.push(v);
            v += step;
        }
    }
    out
}

fn substitute(s: &str, ctx: &HashMap<String, String>, pointer: &str) -> Result<String, ConfigError> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                out.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                out.push('}');
                i += 2;
            }
            '{' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ConfigError::new(pointer, format!("unterminated '{{' in '{s}'")));
                }
                let name: String = chars[start..j].iter().collect();
                let value = ctx.get(&name).ok_or_else(|| {
                    ConfigError::new(
                        pointer,
                        format!("Missing template variable '{name}' in stream template."),
                    )
                })?;
                out.push_str(value);
                i = j + 1;
            }
            '}' => {
                return Err(ConfigError::new(pointer, format!("unmatched '}}' in '{s}'")));
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn substitute_payload(
    payload: &PayloadSpec,
    ctx: &HashMap<String, String>,
    pointer: &str,
) -> Result<PayloadSpec, ConfigError> {
    Ok(match payload {
        PayloadSpec::Text { value } => PayloadSpec::Text {
            value: substitute(value, ctx, pointer)?,
        },
        PayloadSpec::Bytes { value, encoding } => PayloadSpec::Bytes {
            value: substitute(value, ctx, pointer)?,
            encoding: *encoding,
        },
        PayloadSpec::File { path } => PayloadSpec::File {
            path: substitute(path, ctx, pointer)?,
        },
        PayloadSpec::PickleFile { path } => PayloadSpec::PickleFile {
            path: substitute(path, ctx, pointer)?,
        },
        PayloadSpec::Sequence {
            items,
            encoding,
            loop_,
        } => PayloadSpec::Sequence {
            items: substitute_json_items(items, ctx, pointer)?,
            encoding: *encoding,
            loop_: *loop_,
        },
        PayloadSpec::JsonFields { fields } => PayloadSpec::JsonFields {
            fields: fields
                .iter()
                .map(|f| {
                    Ok(FieldSpec {
                        name: f.name.clone(),
                        generator: substitute_generator(&f.generator, ctx, pointer)?,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?,
        },
    })
}

fn substitute_json_items(
    items: &[serde_json::Value],
    ctx: &HashMap<String, String>,
    pointer: &str,
) -> Result<Vec<serde_json::Value>, ConfigError> {
    items
        .iter()
        .map(|item| match item.as_str() {
            Some(s) => Ok(serde_json::Value::String(substitute(s, ctx, pointer)?)),
            None => Ok(item.clone()),
        })
        .collect()
}

fn substitute_generator(
    generator: &Generator,
    ctx: &HashMap<String, String>,
    pointer: &str,
) -> Result<Generator, ConfigError> {
    Ok(match generator {
        Generator::Const {
            value: Value::Str(s),
        } => Generator::Const {
            value: Value::Str(substitute(s, ctx, pointer)?),
        },
        Generator::Expression { expression } => Generator::Expression {
            expression: substitute(expression, ctx, pointer)?,
        },
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqttsim_types::{BrokerSpec, StreamTemplate};

    fn plan_with_range() -> Plan {
        Plan {
            schema_version: 1,
            brokers: vec![BrokerSpec {
                name: "main".into(),
                host: "localhost".into(),
                port: 1883,
                keepalive: 60,
                client_id: None,
                username: None,
                password: None,
            }],
            streams: vec![StreamTemplate {
                name: None,
                broker: "main".into(),
                topic: "devices/{id}/status".into(),
                interval: 0.1,
                qos: 0,
                retain: false,
                payload: PayloadSpec::Text {
                    value: "hello-{id}".into(),
                },
                expand: Some(Expansion::Range {
                    var: "id".into(),
                    start: 1,
                    stop: 3,
                    step: 1,
                    inclusive: true,
                }),
            }],
        }
    }

    #[test]
    fn range_expansion_produces_three_streams() {
        let plan = plan_with_range();
        let streams = expand_plan(&plan).unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].topic, "devices/1/status");
        assert_eq!(streams[1].topic, "devices/2/status");
        assert_eq!(streams[2].topic, "devices/3/status");
        match &streams[0].payload {
            PayloadSpec::Text { value } => assert_eq!(value, "hello-1"),
            _ => panic!("expected text payload"),
        }
    }

    #[test]
    fn expansion_is_deterministic() {
        let plan = plan_with_range();
        let a = expand_plan(&plan).unwrap();
        let b = expand_plan(&plan).unwrap();
        let topics_a: Vec<_> = a.iter().map(|s| s.topic.clone()).collect();
        let topics_b: Vec<_> = b.iter().map(|s| s.topic.clone()).collect();
        assert_eq!(topics_a, topics_b);
    }

    #[test]
    fn no_expand_yields_single_stream_with_empty_context() {
        let mut plan = plan_with_range();
        plan.streams[0].expand = None;
        plan.streams[0].topic = "static/topic".into();
        plan.streams[0].payload = PayloadSpec::Text {
            value: "static".into(),
        };
        let streams = expand_plan(&plan).unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].topic, "static/topic");
    }

    #[test]
    fn range_descending_step() {
        assert_eq!(range_values(5, 1, -1, true), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn range_exclusive_stop() {
        assert_eq!(range_values(1, 3, 1, false), vec![1, 2]);
    }

    #[test]
    fn list_expansion_preserves_order() {
        let mut plan = plan_with_range();
        plan.streams[0].expand = Some(Expansion::List {
            var: "id".into(),
            values: vec!["a".into(), "b".into(), "c".into()],
        });
        let streams = expand_plan(&plan).unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[1].topic, "devices/b/status");
    }

    use proptest::prelude::*;

    proptest! {
        // Every element range_values produces lies strictly between
        // start and stop (inclusive per `inclusive`) and walks in the
        // direction `step` points (spec §8, "deterministic expansion").
        #[test]
        fn range_values_stays_in_bounds_and_direction(
            start in -200i64..200,
            stop in -200i64..200,
            step in -20i64..20,
            inclusive in any::<bool>(),
        ) {
            let out = range_values(start, stop, step, inclusive);
            if step == 0 {
                prop_assert!(out.is_empty());
            } else {
                for &v in &out {
                    if step > 0 {
                        prop_assert!(v >= start && (v < stop || (inclusive && v == stop)));
                    } else {
                        prop_assert!(v <= start && (v > stop || (inclusive && v == stop)));
                    }
                }
                // Monotone in the direction of `step`.
                for w in out.windows(2) {
                    if step > 0 {
                        prop_assert!(w[1] > w[0]);
                    } else {
                        prop_assert!(w[1] < w[0]);
                    }
                }
            }
        }

        // Expanding the same plan twice is a pure function: identical
        // topics in identical order every time (spec §8, "deterministic
        // expansion").
        #[test]
        fn expand_plan_is_deterministic_for_arbitrary_ranges(
            start in 0i64..20,
            stop in 0i64..20,
            step in 1i64..5,
        ) {
            let mut plan = plan_with_range();
            plan.streams[0].expand = Some(Expansion::Range {
                var: "id".into(),
                start,
                stop,
                step,
                inclusive: true,
            });
            let a = expand_plan(&plan).unwrap();
            let b = expand_plan(&plan).unwrap();
            let topics_a: Vec<_> = a.iter().map(|s| s.topic.clone()).collect();
            let topics_b: Vec<_> = b.iter().map(|s| s.topic.clone()).collect();
            prop_assert_eq!(topics_a, topics_b);
        }
    }
}
