//! The nine stateful generators behind `json_fields` and behind the
//! `sequence`/`expression`/etc. payload-adjacent value production (spec
//! §4.3).

use chrono::{SecondsFormat, TimeZone, Utc};
use mqttsim_expr::Expression;
use mqttsim_rng::{ExprRngHandle, SharedRng};
use mqttsim_types::{Generator, GeneratorError, NumericType, TimestampMode, Value};
use uuid::Uuid;

/// Shared per-tick context every generator draws from: the engine RNG and
/// the current wall-clock instant (seconds since epoch), sampled once per
/// publish so every generator and payload builder agrees on "now".
pub struct GenContext<'a> {
    pub rng: &'a SharedRng,
    pub now: f64,
}

pub trait ValueGenerator: Send {
    fn next(&mut self, ctx: &GenContext) -> Result<Value, GeneratorError>;
}

pub fn build_generator(spec: &Generator) -> Result<Box<dyn ValueGenerator>, GeneratorError> {
    Ok(match spec {
        Generator::Const { value } => Box::new(ConstGen {
            value: value.clone(),
        }),
        Generator::BoolToggle { start } => Box::new(BoolToggleGen { next_value: *start }),
        Generator::NumberWalk {
            min,
            max,
            step,
            numeric_type,
            start,
        } => {
            if min > max {
                return Err(GeneratorError::InvalidBounds {
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            Box::new(NumberWalkGen {
                min: *min,
                max: *max,
                step: *step,
                numeric_type: *numeric_type,
                current: start.unwrap_or(*min),
                direction: 1.0,
            })
        }
        Generator::NumberRandom {
            min,
            max,
            numeric_type,
            precision,
        } => {
            if min > max {
                return Err(GeneratorError::InvalidBounds {
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            Box::new(NumberRandomGen {
                min: *min,
                max: *max,
                numeric_type: *numeric_type,
                precision: *precision,
            })
        }
        Generator::Choice { values } => {
            if values.is_empty() {
                return Err(GeneratorError::Empty("choice values must not be empty".into()));
            }
            Box::new(ChoiceGen {
                values: values.clone(),
            })
        }
        Generator::Sequence { values, loop_ } => {
            if values.is_empty() {
                return Err(GeneratorError::Empty("sequence values must not be empty".into()));
            }
            Box::new(SequenceGen {
                values: values.clone(),
                loop_: *loop_,
                idx: 0,
            })
        }
        Generator::Expression { expression } => Box::new(ExpressionGen {
            expr: Expression::compile(expression)?,
        }),
        Generator::Timestamp { mode } => Box::new(TimestampGen { mode: *mode }),
        Generator::Uuid {} => Box::new(UuidGen),
    })
}

struct ConstGen {
    value: Value,
}

impl ValueGenerator for ConstGen {
    fn next(&mut self, _ctx: &GenContext) -> Result<Value, GeneratorError> {
        Ok(self.value.clone())
    }
}

struct BoolToggleGen {
    next_value: bool,
}

impl ValueGenerator for BoolToggleGen {
    fn next(&mut self, _ctx: &GenContext) -> Result<Value, GeneratorError> {
        let v = self.next_value;
        self.next_value = !self.next_value;
        Ok(Value::Bool(v))
    }
}

struct NumberWalkGen {
    min: f64,
    max: f64,
    step: f64,
    numeric_type: NumericType,
    current: f64,
    direction: f64,
}

impl ValueGenerator for NumberWalkGen {
    fn next(&mut self, _ctx: &GenContext) -> Result<Value, GeneratorError> {
        let result = self.current;
        let mut candidate = self.current + self.direction * self.step;
        if candidate > self.max || candidate < self.min {
            self.direction = -self.direction;
            candidate = self.current + self.direction * self.step;
        }
        self.current = candidate.clamp(self.min, self.max);
        Ok(match self.numeric_type {
            NumericType::Int => Value::Int(result.round() as i64),
            NumericType::Float => Value::Float(result),
        })
    }
}

struct NumberRandomGen {
    min: f64,
    max: f64,
    numeric_type: NumericType,
    precision: Option<u32>,
}

impl ValueGenerator for NumberRandomGen {
    fn next(&mut self, ctx: &GenContext) -> Result<Value, GeneratorError> {
        Ok(match self.numeric_type {
            NumericType::Int => {
                Value::Int(ctx.rng.random_range_i64(self.min as i64, self.max as i64))
            }
            NumericType::Float => {
                let v = ctx.rng.random_range_f64(self.min, self.max);
                let rounded = match self.precision {
                    Some(p) => {
                        let factor = 10f64.powi(p as i32);
                        (v * factor).round() / factor
                    }
                    None => v,
                };
                Value::Float(rounded)
            }
        })
    }
}

struct ChoiceGen {
    values: Vec<Value>,
}

impl ValueGenerator for ChoiceGen {
    fn next(&mut self, ctx: &GenContext) -> Result<Value, GeneratorError> {
        let idx = ctx.rng.choice_index(self.values.len());
        Ok(self.values[idx].clone())
    }
}

struct SequenceGen {
    values: Vec<Value>,
    loop_: bool,
    idx: usize,
}

impl ValueGenerator for SequenceGen {
    fn next(&mut self, _ctx: &GenContext) -> Result<Value, GeneratorError> {
        let v = self.values[self.idx].clone();
        self.idx += 1;
        if self.idx >= self.values.len() {
            self.idx = if self.loop_ { 0 } else { self.values.len() - 1 };
        }
        Ok(v)
    }
}

struct ExpressionGen {
    expr: Expression,
}

impl ValueGenerator for ExpressionGen {
    fn next(&mut self, ctx: &GenContext) -> Result<Value, GeneratorError> {
        let random = ctx.rng.random_f64();
        let mut handle = ExprRngHandle(ctx.rng);
        self.expr.next(&mut handle, random, ctx.now)
    }
}

struct TimestampGen {
    mode: TimestampMode,
}

impl ValueGenerator for TimestampGen {
    fn next(&mut self, ctx: &GenContext) -> Result<Value, GeneratorError> {
        Ok(match self.mode {
            TimestampMode::Unix => Value::Float(ctx.now),
            TimestampMode::Iso => {
                let secs = ctx.now.floor() as i64;
                let nanos = ((ctx.now - ctx.now.floor()) * 1e9) as u32;
                let dt = Utc
                    .timestamp_opt(secs, nanos)
                    .single()
                    .unwrap_or_else(Utc::now);
                Value::Str(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        })
    }
}

struct UuidGen;

impl ValueGenerator for UuidGen {
    fn next(&mut self, _ctx: &GenContext) -> Result<Value, GeneratorError> {
        Ok(Value::Str(Uuid::new_v4().to_string()))
    }
}
