//! Boolean condition expressions for `%IF`/`%if` directives.
//!
//! Grammar (keywords case-insensitive):
//!
//! ```text
//! expr     := or
//! or       := and  ( 'OR'  and  )*
//! and      := not  ( 'AND' not  )*
//! not      := 'NOT' primary | primary
//! primary  := identifier | '(' expr ')'
//! ```
//!
//! An identifier is truthy when its value in the parameter map is not
//! negative; a missing parameter is negative.

use crate::value::Params;

/// Evaluate a condition expression against the parameter map.
/// Returns `Err(())` for a malformed expression; the caller maps that
/// to a directive-misuse parse error with positional context.
pub fn eval_condition(expr: &str, params: &Params) -> Result<bool, ()> {
    let tokens = lex(expr)?;
    let mut parser = CondParser { tokens, pos: 0 };
    let value = parser.or_expr(params)?;
    if parser.pos != parser.tokens.len() {
        return Err(());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CondToken {
    And,
    Or,
    Not,
    Open,
    Close,
    Ident(String),
}

fn lex(expr: &str) -> Result<Vec<CondToken>, ()> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
        } else if ch == '(' {
            tokens.push(CondToken::Open);
            i += 1;
        } else if ch == ')' {
            tokens.push(CondToken::Close);
            i += 1;
        } else if ch.is_alphanumeric() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.to_ascii_uppercase().as_str() {
                "AND" => tokens.push(CondToken::And),
                "OR" => tokens.push(CondToken::Or),
                "NOT" => tokens.push(CondToken::Not),
                _ => tokens.push(CondToken::Ident(word)),
            }
        } else {
            return Err(());
        }
    }
    Ok(tokens)
}

struct CondParser {
    tokens: Vec<CondToken>,
    pos: usize,
}

impl CondParser {
    fn peek(&self) -> Option<&CondToken> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self, params: &Params) -> Result<bool, ()> {
        let mut value = self.and_expr(params)?;
        while self.peek() == Some(&CondToken::Or) {
            self.pos += 1;
            let rhs = self.and_expr(params)?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self, params: &Params) -> Result<bool, ()> {
        let mut value = self.not_expr(params)?;
        while self.peek() == Some(&CondToken::And) {
            self.pos += 1;
            let rhs = self.not_expr(params)?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn not_expr(&mut self, params: &Params) -> Result<bool, ()> {
        if self.peek() == Some(&CondToken::Not) {
            self.pos += 1;
            return Ok(!self.not_expr(params)?);
        }
        self.primary(params)
    }

    fn primary(&mut self, params: &Params) -> Result<bool, ()> {
        match self.peek().cloned() {
            Some(CondToken::Ident(name)) => {
                self.pos += 1;
                let negative = params.get(&name).map_or(true, |v| v.is_negative());
                Ok(!negative)
            }
            Some(CondToken::Open) => {
                self.pos += 1;
                let value = self.or_expr(params)?;
                if self.peek() != Some(&CondToken::Close) {
                    return Err(());
                }
                self.pos += 1;
                Ok(value)
            }
            _ => Err(()),
        }
    }
}
