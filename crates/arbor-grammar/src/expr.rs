//! Arithmetic micro-language used by rule conditions and successor parameters.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := number | identifier | '(' expr ')'
//! ```
//!
//! Division follows IEEE-754: `1 / 0` is `inf`, `0 / 0` is `NaN`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::GrammarError;

/// Variable bindings visible to an expression.
pub type Env = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinaryOp,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr, GrammarError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser::new(tokens);
        let expr = parser.parse_expression()?;
        if !parser.check_kind(&TokenKind::Eof) {
            let token = parser.peek();
            return Err(GrammarError::parse("unexpected trailing input", token.column));
        }
        Ok(expr)
    }

    pub fn evaluate(&self, env: &Env) -> Result<f64, GrammarError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => env
                .get(name)
                .copied()
                .ok_or_else(|| GrammarError::UnknownVariable(name.clone())),
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => Ok(-expr.evaluate(env)?),
            Expr::Binary { lhs, op, rhs } => {
                let a = lhs.evaluate(env)?;
                let b = rhs.evaluate(env)?;
                Ok(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                })
            }
        }
    }
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            _ => 3,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write_number(f, *value),
            Expr::Variable(name) => f.write_str(name),
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => {
                f.write_str("-")?;
                expr.fmt_operand(f, 3)
            }
            Expr::Binary { lhs, op, rhs } => {
                // Operators are left-associative, so an equal-precedence
                // right operand needs parentheses.
                lhs.fmt_operand(f, op.precedence())?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, op.precedence() + 1)
            }
        }
    }
}

pub(crate) fn write_number(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        write!(f, "{}", value as i64)
    } else {
        write!(f, "{value}")
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    column: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(f64),
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
}

#[derive(Debug)]
struct Lexer<'a> {
    source: &'a str,
    index: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            index: 0,
            column: 1,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, GrammarError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
                continue;
            }

            let column = self.column;
            let single = match ch {
                '(' => Some(TokenKind::LParen),
                ')' => Some(TokenKind::RParen),
                '+' => Some(TokenKind::Plus),
                '-' => Some(TokenKind::Minus),
                '*' => Some(TokenKind::Star),
                '/' => Some(TokenKind::Slash),
                _ => None,
            };

            if let Some(kind) = single {
                self.advance_char();
                tokens.push(Token { kind, column });
            } else if is_ident_start(ch) {
                tokens.push(self.lex_identifier());
            } else if ch.is_ascii_digit()
                || (ch == '.'
                    && self
                        .peek_second_char()
                        .map(|next| next.is_ascii_digit())
                        .unwrap_or(false))
            {
                tokens.push(self.lex_number()?);
            } else {
                return Err(GrammarError::parse(
                    format!("unexpected character '{ch}'"),
                    column,
                ));
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            column: self.column,
        });

        Ok(tokens)
    }

    fn lex_identifier(&mut self) -> Token {
        let column = self.column;
        let start = self.index;

        self.advance_char();
        while self.peek_char().map(is_ident_continue).unwrap_or(false) {
            self.advance_char();
        }

        Token {
            kind: TokenKind::Ident(self.source[start..self.index].to_string()),
            column,
        }
    }

    fn lex_number(&mut self) -> Result<Token, GrammarError> {
        let column = self.column;
        let start = self.index;

        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance_char();
            self.skip_digits();
        }

        if let Some(exp) = self.peek_char()
            && (exp == 'e' || exp == 'E')
        {
            self.advance_char();
            if let Some(sign) = self.peek_char()
                && (sign == '+' || sign == '-')
            {
                self.advance_char();
            }
            if self.skip_digits() == 0 {
                return Err(GrammarError::parse("invalid exponent in number", column));
            }
        }

        let text = &self.source[start..self.index];
        let value = text.parse::<f64>().map_err(|err| {
            GrammarError::parse(format!("invalid number literal '{text}': {err}"), column)
        })?;

        Ok(Token {
            kind: TokenKind::Number(value),
            column,
        })
    }

    fn skip_digits(&mut self) -> usize {
        let mut count = 0;
        while self
            .peek_char()
            .map(|ch| ch.is_ascii_digit())
            .unwrap_or(false)
        {
            self.advance_char();
            count += 1;
        }
        count
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.index..].chars().next()
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut chars = self.source[self.index..].chars();
        chars.next()?;
        chars.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.index += ch.len_utf8();
        self.column += 1;
        Some(ch)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}

#[derive(Debug)]
struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    fn parse_expression(&mut self) -> Result<Expr, GrammarError> {
        let mut expr = self.parse_term()?;

        loop {
            let op = if self.match_kind(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_kind(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(expr);
            };
            let rhs = self.parse_term()?;
            expr = Expr::Binary {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, GrammarError> {
        let mut expr = self.parse_unary()?;

        loop {
            let op = if self.match_kind(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_kind(&TokenKind::Slash) {
                BinaryOp::Div
            } else {
                return Ok(expr);
            };
            let rhs = self.parse_unary()?;
            expr = Expr::Binary {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, GrammarError> {
        if self.match_kind(&TokenKind::Minus) {
            let expr = self.parse_unary()?;
            // Fold negative literals so "-25" stays a plain number.
            return Ok(match expr {
                Expr::Number(value) => Expr::Number(-value),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(other),
                },
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, GrammarError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Variable(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_kind(TokenKind::RParen, "expected ')' to close group")?;
                Ok(expr)
            }
            TokenKind::Eof => Err(GrammarError::parse(
                "unexpected end of expression",
                token.column,
            )),
            _ => Err(GrammarError::parse("expected expression", token.column)),
        }
    }

    fn expect_kind(&mut self, expected: TokenKind, message: &str) -> Result<(), GrammarError> {
        if self.match_kind(&expected) {
            Ok(())
        } else {
            Err(GrammarError::parse(message, self.peek().column))
        }
    }

    fn match_kind(&mut self, expected: &TokenKind) -> bool {
        if self.check_kind(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check_kind(&self, expected: &TokenKind) -> bool {
        same_variant(&self.peek().kind, expected)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }
}

fn same_variant(a: &TokenKind, b: &TokenKind) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

#[cfg(test)]
mod tests {
    use super::{BinaryOp, Env, Expr};
    use crate::error::GrammarError;

    fn env(pairs: &[(&str, f64)]) -> Env {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    fn eval(source: &str, pairs: &[(&str, f64)]) -> f64 {
        Expr::parse(source)
            .unwrap_or_else(|err| panic!("'{source}' should parse: {err}"))
            .evaluate(&env(pairs))
            .unwrap_or_else(|err| panic!("'{source}' should evaluate: {err}"))
    }

    #[test]
    fn respects_precedence_and_left_associativity() {
        assert_eq!(eval("1 + 2 * 3", &[]), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &[]), 9.0);
        assert_eq!(eval("10 - 4 - 3", &[]), 3.0);
        assert_eq!(eval("64 / 4 / 2", &[]), 8.0);
    }

    #[test]
    fn binds_variables_from_environment() {
        assert!((eval("s * 0.8", &[("s", 2.0)]) - 1.6).abs() < 1e-12);
        assert_eq!(eval("d - 1", &[("d", 5.0)]), 4.0);
        assert_eq!(eval("len_2 + a", &[("len_2", 1.5), ("a", 0.5)]), 2.0);
    }

    #[test]
    fn parses_decimal_and_exponent_literals() {
        assert_eq!(eval(".5 + 1.25", &[]), 1.75);
        assert_eq!(eval("2e3", &[]), 2000.0);
        assert_eq!(eval("1.5E-1 * 10", &[]), 1.5);
    }

    #[test]
    fn negative_literal_folds_to_number() {
        assert_eq!(Expr::parse("-25").expect("should parse"), Expr::Number(-25.0));
        assert_eq!(eval("-x * 2", &[("x", 3.0)]), -6.0);
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let expr = Expr::parse("d + q").expect("should parse");
        match expr.evaluate(&env(&[("d", 1.0)])) {
            Err(GrammarError::UnknownVariable(name)) => assert_eq!(name, "q"),
            other => panic!("expected unknown variable error, got {other:?}"),
        }
    }

    #[test]
    fn division_by_zero_is_permissive() {
        assert!(eval("1 / 0", &[]).is_infinite());
        assert!(eval("0 / 0", &[]).is_nan());
        assert!(eval("-1 / z", &[("z", 0.0)]).is_sign_negative());
    }

    #[test]
    fn reports_column_of_parse_errors() {
        match Expr::parse("1 + * 2") {
            Err(GrammarError::Parse { column, .. }) => assert_eq!(column, 5),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(Expr::parse("(1 + 2").is_err());
        assert!(Expr::parse("1 2").is_err());
        assert!(Expr::parse("a $ b").is_err());
        assert!(Expr::parse("").is_err());
    }

    #[test]
    fn reparsing_is_deterministic() {
        let a = Expr::parse("d * (s - 0.5) / 3").expect("should parse");
        let b = Expr::parse("d * (s - 0.5) / 3").expect("should parse");
        assert_eq!(a, b);
        let bindings = env(&[("d", 4.0), ("s", 2.0)]);
        assert_eq!(
            a.evaluate(&bindings).expect("should evaluate"),
            b.evaluate(&bindings).expect("should evaluate")
        );
    }

    #[test]
    fn display_round_trips_through_parser() {
        let expr = Expr::parse("a - b * 2 / (c + 1)").expect("should parse");
        match &expr {
            Expr::Binary { op, .. } => assert_eq!(*op, BinaryOp::Sub),
            other => panic!("expected binary root, got {other:?}"),
        }
        let reparsed = Expr::parse(&expr.to_string()).expect("display output should parse");
        assert_eq!(reparsed, expr);
    }
}
