use mqttsim_types::Value;

use crate::parser::{ArithOp, Call, CmpOp, Expr};

/// The randomness surface the expression interpreter needs. Implemented
/// by `mqttsim-rng`'s shared RNG handle so `random`/`randint`/`uniform`
/// draw from the same seeded source as every other generator.
pub trait RngSource {
    fn randint(&mut self, lo: i64, hi: i64) -> i64;
    fn uniform(&mut self, lo: f64, hi: f64) -> f64;
}

/// Per-call evaluation context: `prev`/`count` are the per-instance state
/// the engine threads through; `random`/`time` are sampled once by the
/// caller before evaluation (spec §4.3).
pub struct EvalContext<'a> {
    pub prev: Value,
    pub count: i64,
    pub random: f64,
    pub time: f64,
    pub rng: &'a mut dyn RngSource,
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
    }
}

fn as_f64(v: &Value) -> Result<f64, String> {
    v.as_f64()
        .ok_or_else(|| format!("expected a number, got {v:?}"))
}

fn is_int(v: &Value) -> bool {
    matches!(v, Value::Int(_))
}

pub fn eval(expr: &Expr, ctx: &mut EvalContext) -> Result<Value, String> {
    match expr {
        Expr::Number(v) => Ok(v.clone()),
        Expr::Prev => Ok(ctx.prev.clone()),
        Expr::Count => Ok(Value::Int(ctx.count)),
        Expr::Random => Ok(Value::Float(ctx.random)),
        Expr::Time => Ok(Value::Float(ctx.time)),
        Expr::MathConst(name) => match name.as_str() {
            "pi" => Ok(Value::Float(std::f64::consts::PI)),
            "e" => Ok(Value::Float(std::f64::consts::E)),
            other => Err(format!("unknown math constant '{other}'")),
        },
        Expr::Call(call) => eval_call(call, ctx),
        Expr::Neg(inner) => {
            let v = eval(inner, ctx)?;
            match v {
                Value::Int(i) => Ok(Value::Int(-i)),
                other => Ok(Value::Float(-as_f64(&other)?)),
            }
        }
        Expr::Not(inner) => {
            let v = eval(inner, ctx)?;
            Ok(Value::Bool(!truthy(&v)))
        }
        Expr::Arith(op, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            eval_arith(*op, l, r)
        }
        Expr::Cmp(op, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            eval_cmp(*op, &l, &r)
        }
        Expr::And(lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            if !truthy(&l) {
                Ok(l)
            } else {
                eval(rhs, ctx)
            }
        }
        Expr::Or(lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            if truthy(&l) {
                Ok(l)
            } else {
                eval(rhs, ctx)
            }
        }
    }
}

fn eval_call(call: &Call, ctx: &mut EvalContext) -> Result<Value, String> {
    match call {
        Call::RandInt(a, b) => {
            let lo = eval(a, ctx)?;
            let hi = eval(b, ctx)?;
            let lo = as_f64(&lo)? as i64;
            let hi = as_f64(&hi)? as i64;
            Ok(Value::Int(ctx.rng.randint(lo, hi)))
        }
        Call::Uniform(a, b) => {
            let lo = eval(a, ctx)?;
            let hi = eval(b, ctx)?;
            Ok(Value::Float(ctx.rng.uniform(as_f64(&lo)?, as_f64(&hi)?)))
        }
        Call::Math(name, args) => {
            let values: Result<Vec<f64>, String> = args
                .iter()
                .map(|a| eval(a, ctx).and_then(|v| as_f64(&v)))
                .collect();
            let values = values?;
            eval_math(name, &values)
        }
    }
}

fn eval_math(name: &str, args: &[f64]) -> Result<Value, String> {
    let one = || -> Result<f64, String> {
        args.first()
            .copied()
            .ok_or_else(|| format!("math.{name} requires 1 argument"))
    };
    let result = match name {
        "sin" => one()?.sin(),
        "cos" => one()?.cos(),
        "tan" => one()?.tan(),
        "sqrt" => one()?.sqrt(),
        "exp" => one()?.exp(),
        "floor" => one()?.floor(),
        "ceil" => one()?.ceil(),
        "fabs" => one()?.abs(),
        "log" => one()?.ln(),
        "pow" => {
            if args.len() != 2 {
                return Err("math.pow requires 2 arguments".to_string());
            }
            args[0].powf(args[1])
        }
        other => return Err(format!("unknown math function 'math.{other}'")),
    };
    Ok(Value::Float(result))
}

fn eval_arith(op: ArithOp, l: Value, r: Value) -> Result<Value, String> {
    if op == ArithOp::Pow {
        let base = as_f64(&l)?;
        let exp = as_f64(&r)?;
        return Ok(Value::Float(base.powf(exp)));
    }
    if is_int(&l) && is_int(&r) {
        let (Value::Int(a), Value::Int(b)) = (l, r) else {
            unreachable!()
        };
        return match op {
            ArithOp::Add => Ok(Value::Int(a + b)),
            ArithOp::Sub => Ok(Value::Int(a - b)),
            ArithOp::Mul => Ok(Value::Int(a * b)),
            ArithOp::Div => {
                if b == 0 {
                    Err("division by zero".to_string())
                } else {
                    Ok(Value::Float(a as f64 / b as f64))
                }
            }
            ArithOp::Mod => {
                if b == 0 {
                    Err("modulo by zero".to_string())
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            ArithOp::Pow => unreachable!(),
        };
    }
    let a = as_f64(&l)?;
    let b = as_f64(&r)?;
    match op {
        ArithOp::Add => Ok(Value::Float(a + b)),
        ArithOp::Sub => Ok(Value::Float(a - b)),
        ArithOp::Mul => Ok(Value::Float(a * b)),
        ArithOp::Div => Ok(Value::Float(a / b)),
        ArithOp::Mod => Ok(Value::Float(a % b)),
        ArithOp::Pow => unreachable!(),
    }
}

fn eval_cmp(op: CmpOp, l: &Value, r: &Value) -> Result<Value, String> {
    let a = as_f64(l)?;
    let b = as_f64(r)?;
    let result = match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
        CmpOp::Eq => a == b,
        CmpOp::NotEq => a != b,
    };
    Ok(Value::Bool(result))
}
