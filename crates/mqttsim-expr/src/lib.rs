//! A small, restricted arithmetic expression DSL for the `expression`
//! generator (spec §4.3, design note §9 "Expression evaluation").
//!
//! The surface is deliberately narrow: numbers, the five exposed names
//! (`prev`, `count`, `random`, `time`, `math.*`), the two RNG calls
//! (`randint`, `uniform`), arithmetic, comparison, and `and`/`or`/`not`
//! with Python-style truthy semantics. No assignment, no attribute
//! access beyond `math.*`, no user-defined functions.

mod eval;
mod lexer;
mod parser;

pub use eval::RngSource;
use mqttsim_types::{GeneratorError, Value};

/// A parsed expression together with the `prev`/`count` state the
/// contract in spec §4.3 requires: updated only after a successful
/// evaluation.
#[derive(Debug, Clone)]
pub struct Expression {
    ast: parser::Expr,
    prev: Value,
    count: i64,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, GeneratorError> {
        if source.trim().is_empty() {
            return Err(GeneratorError::Expression(
                "expression must not be empty".to_string(),
            ));
        }
        let tokens = lexer::lex(source).map_err(GeneratorError::Expression)?;
        let ast = parser::Parser::new(tokens)
            .parse()
            .map_err(GeneratorError::Expression)?;
        Ok(Self {
            ast,
            prev: Value::Null,
            count: 0,
        })
    }

    /// Evaluate once. `random`/`time` are sampled by the caller so the
    /// engine's RNG usage stays centralized (spec §4.7). On error,
    /// `prev`/`count` are left untouched per the generator contract.
    pub fn next(
        &mut self,
        rng: &mut dyn RngSource,
        random: f64,
        time: f64,
    ) -> Result<Value, GeneratorError> {
        let mut ctx = eval::EvalContext {
            prev: self.prev.clone(),
            count: self.count,
            random,
            time,
            rng,
        };
        let result = eval::eval(&self.ast, &mut ctx).map_err(GeneratorError::Expression)?;
        self.prev = result.clone();
        self.count += 1;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRng;
    impl RngSource for FixedRng {
        fn randint(&mut self, lo: i64, _hi: i64) -> i64 {
            lo
        }
        fn uniform(&mut self, lo: f64, _hi: f64) -> f64 {
            lo
        }
    }

    #[test]
    fn stateful_prev_or_default() {
        let mut expr = Expression::compile("(prev or 10) + 1").unwrap();
        let mut rng = FixedRng;
        let mut results = Vec::new();
        for _ in 0..4 {
            let v = expr.next(&mut rng, 0.0, 0.0).unwrap();
            results.push(v.as_f64().unwrap());
        }
        assert_eq!(results, vec![11.0, 12.0, 13.0, 14.0]);
    }

    #[test]
    fn rejects_assignment() {
        assert!(Expression::compile("x = 1").is_err());
    }

    #[test]
    fn rejects_unknown_identifier() {
        assert!(Expression::compile("os.getenv('PATH')").is_err());
    }

    #[test]
    fn math_namespace_works() {
        let mut expr = Expression::compile("math.sqrt(9)").unwrap();
        let mut rng = FixedRng;
        let v = expr.next(&mut rng, 0.0, 0.0).unwrap();
        assert_eq!(v.as_f64().unwrap(), 3.0);
    }

    #[test]
    fn count_increments_on_success_only() {
        let mut expr = Expression::compile("count").unwrap();
        let mut rng = FixedRng;
        assert_eq!(expr.next(&mut rng, 0.0, 0.0).unwrap(), Value::Int(0));
        assert_eq!(expr.next(&mut rng, 0.0, 0.0).unwrap(), Value::Int(1));
    }

    use proptest::prelude::*;

    proptest! {
        // A bare numeric literal evaluates to itself no matter how many
        // times it's re-evaluated (spec §8, "template closure").
        #[test]
        fn numeric_literal_evaluates_to_itself(n in -10_000i64..10_000) {
            let mut expr = Expression::compile(&n.to_string()).unwrap();
            let mut rng = FixedRng;
            let v = expr.next(&mut rng, 0.0, 0.0).unwrap();
            prop_assert_eq!(v.as_f64().unwrap(), n as f64);
        }

        // `count` increases by exactly one per successful evaluation,
        // for any number of calls (spec §8, "monotone state").
        #[test]
        fn count_increases_by_one_each_call(calls in 1usize..50) {
            let mut expr = Expression::compile("count").unwrap();
            let mut rng = FixedRng;
            for i in 0..calls {
                let v = expr.next(&mut rng, 0.0, 0.0).unwrap();
                prop_assert_eq!(v, Value::Int(i as i64));
            }
        }
    }
}
