//! Recognition of `%`-directives embedded in SQL comments.
//!
//! Three families share this module:
//!
//! - full-line block directives: `-- %IF e`, `-- %ELSEIF e`,
//!   `-- %ELSE`, `-- %END`
//! - inline conditional fragments:
//!   `/*%if e */ x /*%elseif e2 */ y /*%else */ z /*%end*/`
//! - textual includes: `/* %include "path" */`, `-- %include "path"`
//!
//! Everything here only *recognises*; resolution lives with the
//! compile pipeline (block directives) and the rebuilder (inline
//! fragments).

use once_cell::sync::Lazy;
use regex::Regex;

static IF_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[ \t]*--[ \t]*%IF\s+(.+?)\s*$").unwrap());
static ELSEIF_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[ \t]*--[ \t]*%ELSEIF\s+(.+?)\s*$").unwrap());
static ELSE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[ \t]*--[ \t]*%ELSE\s*$").unwrap());
static END_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[ \t]*--[ \t]*%END\s*$").unwrap());

static INLINE_IF_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/\*\s*%if\s+").unwrap());
static INLINE_NEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/\*\s*%(elseif|else|end)\b").unwrap());

static INCLUDE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?i)(?:/\*\s*%include\s+["']([^"']+)["']\s*\*/"#,
        r#"|--\s*%include\s+["']([^"']+)["'])"#,
    ))
    .unwrap()
});

/// A full-line block directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDirective {
    If(String),
    ElseIf(String),
    Else,
    End,
}

/// Parse a physical line as a block directive, if it is one.
pub fn parse_directive(line: &str) -> Option<BlockDirective> {
    if let Some(caps) = IF_DIRECTIVE.captures(line) {
        return Some(BlockDirective::If(caps[1].to_string()));
    }
    if let Some(caps) = ELSEIF_DIRECTIVE.captures(line) {
        return Some(BlockDirective::ElseIf(caps[1].to_string()));
    }
    if ELSE_DIRECTIVE.is_match(line) {
        return Some(BlockDirective::Else);
    }
    if END_DIRECTIVE.is_match(line) {
        return Some(BlockDirective::End);
    }
    None
}

/// An inline conditional fragment, span-anchored in its line.
///
/// `values` holds one entry per condition, plus one more when an
/// `%else` branch is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineCondition {
    pub conditions: Vec<String>,
    pub values: Vec<String>,
    pub start: usize,
    pub end: usize,
}

/// Scan a line for `/*%if ... */ ... /*%end*/` fragments.
///
/// Fragments are matched left to right with a manual cursor; an
/// unterminated fragment (no `%end`) is left untouched.
pub fn parse_inline_conditions(line: &str) -> Vec<InlineCondition> {
    let mut results = Vec::new();
    let mut i = 0;

    while i < line.len() {
        let Some(open) = INLINE_IF_OPEN.find(&line[i..]) else {
            break;
        };
        let start = i + open.start();
        let mut pos = i + open.end();

        let Some(cond_end) = line[pos..].find("*/") else {
            break;
        };
        let mut conditions = vec![line[pos..pos + cond_end].trim().to_string()];
        pos += cond_end + 2;

        let mut values: Vec<String> = Vec::new();
        let mut closed = false;

        while pos < line.len() {
            let Some(next) = INLINE_NEXT.captures(&line[pos..]) else {
                break;
            };
            let whole = next.get(0).unwrap();
            values.push(line[pos..pos + whole.start()].trim().to_string());
            let kind = next[1].to_ascii_lowercase();
            pos += whole.end();

            match kind.as_str() {
                "elseif" => {
                    let Some(ce) = line[pos..].find("*/") else {
                        break;
                    };
                    conditions.push(line[pos..pos + ce].trim().to_string());
                    pos += ce + 2;
                }
                "else" | "end" => {
                    let Some(close) = line[pos..].find("*/") else {
                        break;
                    };
                    pos += close + 2;
                    if kind == "end" {
                        results.push(InlineCondition {
                            conditions,
                            values,
                            start,
                            end: pos,
                        });
                        closed = true;
                        break;
                    }
                }
                _ => unreachable!(),
            }
        }

        if !closed {
            break;
        }
        i = pos;
    }

    results
}

/// An `%include` directive, span-anchored in its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub path: String,
    pub start: usize,
    pub end: usize,
}

/// Scan a physical line for include directives.
pub fn parse_includes(line: &str) -> Vec<IncludeDirective> {
    INCLUDE_PATTERN
        .captures_iter(line)
        .map(|caps| {
            let m = caps.get(0).unwrap();
            let path = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|g| g.as_str())
                .unwrap_or("")
                .to_string();
            IncludeDirective {
                path,
                start: m.start(),
                end: m.end(),
            }
        })
        .collect()
}
