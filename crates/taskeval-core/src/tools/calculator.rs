//! Arithmetic for the `calculator` tool: `+ - * / // ** ( )` over integers
//! and decimals. Integer arithmetic stays integral until it leaves the `i64`
//! range, then continues in decimal; `/` always produces a decimal. Nesting
//! (parentheses, sign runs, exponent chains) is capped at [`MAX_DEPTH`].

use std::fmt;

use crate::error::ToolError;

const ALLOWED: &str = "0123456789+-*/.() ";

/// Deepest nesting the parser descends into before giving up.
pub const MAX_DEPTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

pub fn evaluate(expression: &str) -> Result<Number, ToolError> {
    if !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(ToolError::InvalidArgument {
            name: "expression",
            reason: "contains disallowed characters".to_string(),
        });
    }
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ToolError::Evaluation("empty expression".into()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(tok) => Err(ToolError::Evaluation(format!("unexpected token {tok:?}"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    FloorDiv,
    Pow,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            ' ' => {}
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' if next == Some('*') => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '*' => tokens.push(Token::Star),
            '/' if next == Some('/') => {
                tokens.push(Token::FloorDiv);
                i += 1;
            }
            '/' => tokens.push(Token::Slash),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            _ => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(number(&literal)?));
                continue;
            }
        }
        i += 1;
    }
    Ok(tokens)
}

fn number(literal: &str) -> Result<Number, ToolError> {
    let invalid = || ToolError::Evaluation(format!("invalid number {literal:?}"));
    if literal.contains('.') {
        if literal == "." || literal.matches('.').count() > 1 {
            return Err(invalid());
        }
        literal.parse::<f64>().map(Number::Float).map_err(|_| invalid())
    } else {
        literal.parse::<i64>().map(Number::Int).map_err(|_| invalid())
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> Result<Number, ToolError> {
        let mut lhs = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.bump();
            let rhs = self.term()?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Number, ToolError> {
        let mut lhs = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::FloorDiv)) = self.peek() {
            self.bump();
            let rhs = self.unary()?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    // Every recursive path (a parenthesis, a sign, an exponent) passes
    // through here, so this is where depth is counted.
    fn unary(&mut self) -> Result<Number, ToolError> {
        if self.depth >= MAX_DEPTH {
            return Err(ToolError::Evaluation("expression too deeply nested".into()));
        }
        self.depth += 1;
        let value = match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                self.unary().map(negate)
            }
            Some(Token::Plus) => {
                self.bump();
                self.unary()
            }
            _ => self.power(),
        };
        self.depth -= 1;
        value
    }

    // `**` binds tighter than a unary minus on its left and is right-associative
    fn power(&mut self) -> Result<Number, ToolError> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Pow) {
            self.bump();
            let exponent = self.unary()?;
            return apply(Token::Pow, base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Number, ToolError> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ToolError::Evaluation("unbalanced parentheses".into())),
                }
            }
            Some(tok) => Err(ToolError::Evaluation(format!("unexpected token {tok:?}"))),
            None => Err(ToolError::Evaluation("unexpected end of expression".into())),
        }
    }
}

fn division_by_zero() -> ToolError {
    ToolError::Evaluation("division by zero".into())
}

fn negate(value: Number) -> Number {
    match value {
        Number::Int(i) => i
            .checked_neg()
            .map(Number::Int)
            .unwrap_or(Number::Float(-(i as f64))),
        Number::Float(f) => Number::Float(-f),
    }
}

fn apply(op: Token, lhs: Number, rhs: Number) -> Result<Number, ToolError> {
    use Number::{Float, Int};

    match (op, lhs, rhs) {
        (Token::Plus, Int(a), Int(b)) => Ok(a
            .checked_add(b)
            .map(Int)
            .unwrap_or_else(|| Float(a as f64 + b as f64))),
        (Token::Minus, Int(a), Int(b)) => Ok(a
            .checked_sub(b)
            .map(Int)
            .unwrap_or_else(|| Float(a as f64 - b as f64))),
        (Token::Star, Int(a), Int(b)) => Ok(a
            .checked_mul(b)
            .map(Int)
            .unwrap_or_else(|| Float(a as f64 * b as f64))),
        (Token::FloorDiv, Int(_), Int(0)) => Err(division_by_zero()),
        (Token::FloorDiv, Int(a), Int(b)) => match a.checked_div(b) {
            Some(q) => Ok(Int(if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q })),
            None => Ok(Float((a as f64 / b as f64).floor())),
        },
        (Token::Pow, Int(a), Int(b)) if b >= 0 => Ok(u32::try_from(b)
            .ok()
            .and_then(|exp| a.checked_pow(exp))
            .map(Int)
            .unwrap_or_else(|| Float((a as f64).powf(b as f64)))),
        (Token::Pow, Int(0), Int(_)) => Err(division_by_zero()),
        (Token::Pow, _, _) => {
            let (a, b) = (lhs.as_f64(), rhs.as_f64());
            if a == 0.0 && b < 0.0 {
                return Err(division_by_zero());
            }
            let v = a.powf(b);
            if v.is_nan() {
                return Err(ToolError::Evaluation("complex result".into()));
            }
            Ok(Float(v))
        }
        (Token::Slash | Token::FloorDiv, _, _) if rhs.as_f64() == 0.0 => Err(division_by_zero()),
        (Token::Slash, _, _) => Ok(Float(lhs.as_f64() / rhs.as_f64())),
        (Token::FloorDiv, _, _) => Ok(Float((lhs.as_f64() / rhs.as_f64()).floor())),
        (Token::Plus, _, _) => Ok(Float(lhs.as_f64() + rhs.as_f64())),
        (Token::Minus, _, _) => Ok(Float(lhs.as_f64() - rhs.as_f64())),
        (Token::Star, _, _) => Ok(Float(lhs.as_f64() * rhs.as_f64())),
        _ => Err(ToolError::Evaluation(format!("unsupported operator {op:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> String {
        evaluate(expr).unwrap().to_string()
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(eval("2+2"), "4");
        assert_eq!(eval("2 + 3 * 4"), "14");
        assert_eq!(eval("(2 + 3) * 4"), "20");
        assert_eq!(eval("-3 - -2"), "-1");
        assert_eq!(eval("2**10"), "1024");
        assert_eq!(eval("-2**2"), "-4");
        assert_eq!(eval("7//2"), "3");
        assert_eq!(eval("-7//2"), "-4");
    }

    #[test]
    fn test_division_yields_decimal() {
        assert_eq!(eval("10/2"), "5.0");
        assert_eq!(eval("7/2"), "3.5");
        assert_eq!(eval("1.5*2"), "3.0");
        assert_eq!(eval("0.1+0.2"), "0.30000000000000004");
        assert_eq!(eval("2**-1"), "0.5");
    }

    #[test]
    fn test_disallowed_characters() {
        let err = evaluate("__import__('os')").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { name: "expression", .. }));
        assert!(evaluate("2^3").is_err());
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(evaluate("1/0").unwrap_err(), division_by_zero());
        assert_eq!(evaluate("1//0").unwrap_err(), division_by_zero());
        assert_eq!(evaluate("1.0/0.0").unwrap_err(), division_by_zero());
    }

    #[test]
    fn test_malformed_expressions() {
        for expr in ["", "   ", "2+", "(1+2", "1+2)", "1..2", "()", "3 4"] {
            assert!(evaluate(expr).is_err(), "{expr:?} should fail");
        }
    }

    #[test]
    fn test_integer_overflow_continues_in_decimal() {
        assert_eq!(evaluate("9223372036854775807+1").unwrap(), Number::Float(9223372036854775808.0));
        assert_eq!(evaluate("-9223372036854775807-2").unwrap(), Number::Float(-9223372036854775808.0));
        assert_eq!(evaluate("4294967296*4294967296").unwrap(), Number::Float(18446744073709551616.0));

        let Number::Float(big) = evaluate("10**40").unwrap() else {
            panic!("10**40 should promote to a decimal");
        };
        assert!((big / 1e40 - 1.0).abs() < 1e-12, "{big}");
        assert!(matches!(evaluate("10**40 / 10**38").unwrap(), Number::Float(v) if (v - 100.0).abs() < 1e-9));

        // in-range results stay integral
        assert_eq!(evaluate("10**18").unwrap(), Number::Int(1_000_000_000_000_000_000));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let too_deep = ToolError::Evaluation("expression too deeply nested".into());

        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(evaluate(&parens).unwrap_err(), too_deep);

        let signs = format!("{}1", "-".repeat(100_000));
        assert_eq!(evaluate(&signs).unwrap_err(), too_deep);

        let tower = vec!["2"; 100_000].join("**");
        assert_eq!(evaluate(&tower).unwrap_err(), too_deep);
    }

    #[test]
    fn test_moderate_nesting_and_long_flat_expressions() {
        let nested = format!("{}7{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(eval(&nested), "7");
        assert_eq!(eval(&format!("{}5", "-".repeat(50))), "5");

        let flat = vec!["1"; 10_000].join("+");
        assert_eq!(eval(&flat), "10000");
    }
}
