//! Symbols, rewrite rules and their text syntax.
//!
//! ```text
//! rule      := head [':' condition] '->' successor
//! head      := char ['(' ident (',' ident)* ')']
//! successor := (char ['(' expr (',' expr)* ')'])*
//! ```
//!
//! Whitespace between symbols is ignored, so `F(1)[+F]` and `F(1) [ + F ]`
//! denote the same string.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GrammarError;
use crate::expr::{Env, Expr, write_number};

/// A single tag with concrete parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: char,
    pub params: Vec<f64>,
}

impl Symbol {
    pub fn new(name: char, params: Vec<f64>) -> Self {
        Self { name, params }
    }

    pub fn bare(name: char) -> Self {
        Self {
            name,
            params: Vec::new(),
        }
    }

    pub fn param(&self, index: usize) -> Option<f64> {
        self.params.get(index).copied()
    }

    pub fn is_bracket(&self) -> bool {
        self.name == '[' || self.name == ']'
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, value) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write_number(f, *value)?;
        }
        f.write_str(")")
    }
}

/// Renders a symbol string compactly, e.g. `F(1)[+(25)F(0.5)]`.
pub fn render_symbols(symbols: &[Symbol]) -> String {
    symbols.iter().map(Symbol::to_string).collect()
}

/// A successor symbol whose parameters are evaluated when the rule fires.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSymbol {
    pub name: char,
    pub params: Vec<Expr>,
}

impl OutputSymbol {
    pub fn instantiate(&self, env: &Env) -> Result<Symbol, GrammarError> {
        let params = self
            .params
            .iter()
            .map(|expr| expr.evaluate(env))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Symbol {
            name: self.name,
            params,
        })
    }
}

impl fmt::Display for OutputSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, expr) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{expr}")?;
        }
        f.write_str(")")
    }
}

/// Parses a successor string into symbols with unevaluated parameters.
pub fn parse_successor(text: &str) -> Result<Vec<OutputSymbol>, GrammarError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (_, ch) = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        if matches!(ch, '(' | ')' | ',') {
            return Err(GrammarError::Symbols(format!(
                "unexpected '{ch}' at column {}",
                i + 1
            )));
        }

        let name = ch;
        i += 1;
        let mut params = Vec::new();

        if i < chars.len() && chars[i].1 == '(' {
            let open = i;
            let close = find_closing(&chars, open).ok_or_else(|| {
                GrammarError::Symbols(format!(
                    "unclosed parameter list for '{name}' at column {}",
                    open + 1
                ))
            })?;

            for (start, end) in split_arguments(&chars, open + 1, close) {
                let byte_start = chars[start].0;
                let byte_end = if end < chars.len() {
                    chars[end].0
                } else {
                    text.len()
                };
                let expr = Expr::parse(&text[byte_start..byte_end]).map_err(|err| match err {
                    GrammarError::Parse { message, column } => {
                        GrammarError::parse(message, start + column)
                    }
                    other => other,
                })?;
                params.push(expr);
            }
            i = close + 1;
        }

        out.push(OutputSymbol { name, params });
    }

    Ok(out)
}

/// Parses an axiom: a successor string whose parameters are constants.
pub fn parse_symbols(text: &str) -> Result<Vec<Symbol>, GrammarError> {
    let env = Env::new();
    parse_successor(text)?
        .iter()
        .map(|symbol| symbol.instantiate(&env))
        .collect()
}

fn find_closing(chars: &[(usize, char)], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, (_, ch)) in chars[open..].iter().enumerate() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Char ranges of the top-level comma-separated pieces in `start..end`.
fn split_arguments(chars: &[(usize, char)], start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut piece_start = start;

    for (index, (_, ch)) in chars.iter().enumerate().take(end).skip(start) {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push((piece_start, index));
                piece_start = index + 1;
            }
            _ => {}
        }
    }
    pieces.push((piece_start, end));
    pieces
}

/// A parametric production `head(params) : condition -> successor`.
///
/// Serialises as its text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rule {
    pub head: char,
    pub head_params: Vec<String>,
    pub condition: Option<Expr>,
    pub successor: Vec<OutputSymbol>,
}

impl Rule {
    pub fn parse(text: &str) -> Result<Rule, GrammarError> {
        let invalid = |message: String| GrammarError::Rule {
            rule: text.to_string(),
            message,
        };

        let (lhs, successor_text) = text
            .split_once("->")
            .ok_or_else(|| invalid("missing '->'".to_string()))?;

        let (head_text, condition_text) = match lhs.split_once(':') {
            Some((head, condition)) => (head.trim(), Some(condition.trim())),
            None => (lhs.trim(), None),
        };

        let mut head_chars = head_text.chars();
        let head = head_chars
            .next()
            .ok_or_else(|| invalid("missing head symbol".to_string()))?;
        if matches!(head, '[' | ']' | '(' | ')' | ',') {
            return Err(invalid(format!("'{head}' cannot be a rule head")));
        }

        let rest = head_chars.as_str().trim();
        let head_params = if rest.is_empty() {
            Vec::new()
        } else {
            let inner = rest
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(|| invalid(format!("malformed head parameters '{rest}'")))?;
            let names: Vec<String> = inner.split(',').map(|n| n.trim().to_string()).collect();
            if let Some(bad) = names.iter().find(|n| !is_identifier(n)) {
                return Err(invalid(format!("'{bad}' is not a parameter name")));
            }
            names
        };

        let condition = match condition_text {
            Some(source) if !source.is_empty() => {
                Some(Expr::parse(source).map_err(|err| invalid(err.to_string()))?)
            }
            Some(_) => return Err(invalid("empty condition".to_string())),
            None => None,
        };

        let successor = parse_successor(successor_text).map_err(|err| invalid(err.to_string()))?;

        Ok(Rule {
            head,
            head_params,
            condition,
            successor,
        })
    }

    pub fn arity(&self) -> usize {
        self.head_params.len()
    }

    pub fn matches(&self, symbol: &Symbol) -> bool {
        self.head == symbol.name && self.arity() == symbol.params.len()
    }

    /// Binds the head parameter names to the symbol's values.
    pub fn bind(&self, symbol: &Symbol) -> Env {
        self.head_params
            .iter()
            .cloned()
            .zip(symbol.params.iter().copied())
            .collect()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {
            chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.head_params.is_empty() {
            write!(f, "({})", self.head_params.join(", "))?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " : {condition}")?;
        }
        f.write_str(" ->")?;
        for symbol in &self.successor {
            write!(f, " {symbol}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Rule {
    type Error = GrammarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rule::parse(&value)
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.to_string()
    }
}

/// The starting symbol string of a grammar. Serialises as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Axiom(pub Vec<Symbol>);

impl Axiom {
    pub fn parse(text: &str) -> Result<Axiom, GrammarError> {
        parse_symbols(text).map(Axiom)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }
}

impl fmt::Display for Axiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_symbols(&self.0))
    }
}

impl TryFrom<String> for Axiom {
    type Error = GrammarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Axiom::parse(&value)
    }
}

impl From<Axiom> for String {
    fn from(axiom: Axiom) -> Self {
        axiom.to_string()
    }
}
