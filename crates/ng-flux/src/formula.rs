//! Single-variable formula engine for the `function` flux mode.
//!
//! Parses an analytic expression over the variable `x` (neutrino energy in
//! GeV) and evaluates it when binning the functional flux. Supports
//! arithmetic (+, -, *, /), and the functions abs, sqrt, log, exp, pow,
//! sin, cos, min, max.

use ng_core::{Error, Result};

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Var,
    Neg(Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Sin,
    Cos,
    Min,
    Max,
}

impl Func {
    fn arity(&self) -> usize {
        match self {
            Func::Pow | Func::Min | Func::Max => 2,
            _ => 1,
        }
    }
}

/// A compiled single-variable formula.
#[derive(Debug, Clone)]
pub struct Formula {
    ast: Expr,
}

impl Formula {
    /// Parse and compile a formula string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens: &tokens, pos: 0 };
        let ast = parser.parse_add()?;
        if parser.pos < parser.tokens.len() {
            return Err(Error::Config(format!(
                "unexpected token after formula: {:?}",
                parser.tokens[parser.pos]
            )));
        }
        Ok(Formula { ast })
    }

    /// Evaluate at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        eval_expr(&self.ast, x)
    }

    /// Evaluate the formula at the center of each of `n_bins` equal bins
    /// over `[lo, hi]`, clamping negative values to zero.
    pub fn bin(&self, lo: f64, hi: f64, n_bins: usize) -> Result<Vec<f64>> {
        if n_bins == 0 || !(lo < hi) {
            return Err(Error::Config(format!(
                "functional flux binning needs lo < hi and n > 0, got [{lo}, {hi}] / {n_bins}"
            )));
        }
        let w = (hi - lo) / n_bins as f64;
        Ok((0..n_bins)
            .map(|i| {
                let center = lo + (i as f64 + 0.5) * w;
                self.eval(center).max(0.0)
            })
            .collect())
    }
}

fn eval_expr(e: &Expr, x: f64) -> f64 {
    match e {
        Expr::Number(n) => *n,
        Expr::Var => x,
        Expr::Neg(a) => -eval_expr(a, x),
        Expr::BinOp(op, a, b) => {
            let lhs = eval_expr(a, x);
            let rhs = eval_expr(b, x);
            match op {
                BinOp::Add => lhs + rhs,
                BinOp::Sub => lhs - rhs,
                BinOp::Mul => lhs * rhs,
                BinOp::Div => lhs / rhs,
            }
        }
        Expr::Call(f, args) => {
            let a0 = eval_expr(&args[0], x);
            match f {
                Func::Abs => a0.abs(),
                Func::Sqrt => a0.sqrt(),
                Func::Log => a0.ln(),
                Func::Exp => a0.exp(),
                Func::Sin => a0.sin(),
                Func::Cos => a0.cos(),
                Func::Pow => a0.powf(eval_expr(&args[1], x)),
                Func::Min => a0.min(eval_expr(&args[1], x)),
                Func::Max => a0.max(eval_expr(&args[1], x)),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '+' || chars[i] == '-')
                            && i > start
                            && (chars[i - 1] == 'e' || chars[i - 1] == 'E')))
                {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n: f64 = s
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid number in formula: '{s}'")))?;
                tokens.push(Token::Num(n));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(Error::Config(format!("unexpected character in formula: '{c}'"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => Err(Error::Config(format!("formula: expected {expected:?}, got {other:?}"))),
        }
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if matches!(self.peek(), Some(Token::Plus)) {
            self.advance();
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance().cloned() {
            Some(Token::Num(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let e = self.parse_add()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    let f = match name.as_str() {
                        "abs" => Func::Abs,
                        "sqrt" => Func::Sqrt,
                        "log" => Func::Log,
                        "exp" => Func::Exp,
                        "pow" => Func::Pow,
                        "sin" => Func::Sin,
                        "cos" => Func::Cos,
                        "min" => Func::Min,
                        "max" => Func::Max,
                        _ => {
                            return Err(Error::Config(format!("unknown formula function '{name}'")))
                        }
                    };
                    self.advance(); // (
                    let mut args = vec![self.parse_add()?];
                    while matches!(self.peek(), Some(Token::Comma)) {
                        self.advance();
                        args.push(self.parse_add()?);
                    }
                    self.expect(&Token::RParen)?;
                    if args.len() != f.arity() {
                        return Err(Error::Config(format!(
                            "formula function '{name}' takes {} argument(s), got {}",
                            f.arity(),
                            args.len()
                        )));
                    }
                    return Ok(Expr::Call(f, args));
                }
                if name == "x" {
                    Ok(Expr::Var)
                } else {
                    Err(Error::Config(format!(
                        "unknown identifier '{name}' in formula (only 'x' is available)"
                    )))
                }
            }
            other => Err(Error::Config(format!("formula: unexpected token {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear() {
        let f = Formula::compile("x").unwrap();
        assert_relative_eq!(f.eval(2.5), 2.5);
    }

    #[test]
    fn test_precedence_and_functions() {
        let f = Formula::compile("2 + 3 * x").unwrap();
        assert_relative_eq!(f.eval(4.0), 14.0);
        let g = Formula::compile("exp(-x) * pow(x, 2)").unwrap();
        assert_relative_eq!(g.eval(1.0), (-1.0f64).exp());
    }

    #[test]
    fn test_bin_monotone_for_identity() {
        let f = Formula::compile("x").unwrap();
        let bins = f.bin(0.0, 10.0, 20).unwrap();
        assert_eq!(bins.len(), 20);
        for w in bins.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_negative_values_clamped() {
        let f = Formula::compile("x - 5").unwrap();
        let bins = f.bin(0.0, 10.0, 10).unwrap();
        assert!(bins[0] == 0.0);
        assert!(bins[9] > 0.0);
    }

    #[test]
    fn test_unknown_identifier_rejected() {
        assert!(Formula::compile("energy * 2").is_err());
        assert!(Formula::compile("foo(x)").is_err());
    }
}
