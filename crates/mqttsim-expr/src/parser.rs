use crate::lexer::Token;
use mqttsim_types::Value;

/// Comparison operators. Kept separate from arithmetic so the evaluator
/// can short-circuit truthiness checks for `and`/`or`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// The allowed call targets: the three free functions and the `math.*`
/// namespace. No other attribute access or call is representable.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RandInt(Box<Expr>, Box<Expr>),
    Uniform(Box<Expr>, Box<Expr>),
    Math(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Value),
    Prev,
    Count,
    Random,
    Time,
    MathConst(String),
    Call(Call),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

const MATH_FNS: &[&str] = &["sin", "cos", "tan", "sqrt", "pow", "log", "exp", "floor", "ceil", "fabs"];
const MATH_CONSTS: &[&str] = &["pi", "e"];

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        self.expect_eof()?;
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_eof(&self) -> Result<(), String> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(format!("unexpected trailing token {:?}", self.peek()))
        }
    }

    fn eat_ident_if(&mut self, name: &str) -> bool {
        if let Token::Ident(id) = self.peek() {
            if id == name {
                self.advance();
                return true;
            }
        }
        false
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.eat_ident_if("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_not()?;
        while self.eat_ident_if("and") {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.eat_ident_if("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_sum()?;
        let op = match self.peek() {
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
            Token::EqEq => CmpOp::Eq,
            Token::NotEq => CmpOp::NotEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_sum()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_sum(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => ArithOp::Mul,
                Token::Slash => ArithOp::Div,
                Token::Percent => ArithOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if *self.peek() == Token::Minus {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if *self.peek() == Token::Plus {
            self.advance();
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, String> {
        let base = self.parse_atom()?;
        if *self.peek() == Token::StarStar {
            self.advance();
            // right-associative
            let exp = self.parse_unary()?;
            return Ok(Expr::Arith(ArithOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Number(Value::Int(n))),
            Token::Float(n) => Ok(Expr::Number(Value::Float(n))),
            Token::LParen => {
                let inner = self.parse_or()?;
                if self.advance() != Token::RParen {
                    return Err("expected ')'".to_string());
                }
                Ok(inner)
            }
            Token::Ident(name) => self.parse_ident_atom(name),
            other => Err(format!("unexpected token {other:?}")),
        }
    }

    fn parse_ident_atom(&mut self, name: String) -> Result<Expr, String> {
        match name.as_str() {
            "prev" => Ok(Expr::Prev),
            "count" => Ok(Expr::Count),
            "random" => Ok(Expr::Random),
            "time" => Ok(Expr::Time),
            "math" => {
                if self.advance() != Token::Dot {
                    return Err("expected '.' after 'math'".to_string());
                }
                let member = match self.advance() {
                    Token::Ident(m) => m,
                    other => return Err(format!("expected identifier after 'math.', got {other:?}")),
                };
                if MATH_CONSTS.contains(&member.as_str()) {
                    return Ok(Expr::MathConst(member));
                }
                if !MATH_FNS.contains(&member.as_str()) {
                    return Err(format!("unknown math function 'math.{member}'"));
                }
                if *self.peek() != Token::LParen {
                    return Err(format!("expected '(' after 'math.{member}'"));
                }
                let args = self.parse_call_args()?;
                Ok(Expr::Call(Call::Math(member, args)))
            }
            "randint" => {
                let mut args = self.parse_call_args()?;
                if args.len() != 2 {
                    return Err("randint() takes exactly 2 arguments".to_string());
                }
                let b = args.pop().unwrap();
                let a = args.pop().unwrap();
                Ok(Expr::Call(Call::RandInt(Box::new(a), Box::new(b))))
            }
            "uniform" => {
                let mut args = self.parse_call_args()?;
                if args.len() != 2 {
                    return Err("uniform() takes exactly 2 arguments".to_string());
                }
                let b = args.pop().unwrap();
                let a = args.pop().unwrap();
                Ok(Expr::Call(Call::Uniform(Box::new(a), Box::new(b))))
            }
            other => Err(format!("unknown identifier '{other}'")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, String> {
        if self.advance() != Token::LParen {
            return Err("expected '('".to_string());
        }
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            args.push(self.parse_or()?);
            while *self.peek() == Token::Comma {
                self.advance();
                args.push(self.parse_or()?);
            }
        }
        if self.advance() != Token::RParen {
            return Err("expected ')'".to_string());
        }
        Ok(args)
    }
}
