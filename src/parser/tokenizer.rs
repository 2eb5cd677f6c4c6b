//! Lexer for parameter comments embedded in a logical line.
//!
//! Recognition is layered; earlier layers reserve character ranges
//! that later layers must not overlap:
//!
//! 1. IN-clause comments: `IN /* $ids */(1, 2, 3)`
//! 2. Operator-bearing comments: `col /* name */= 'x'`
//! 3. LIKE-bearing comments: `col /* name */LIKE 'x%'`
//! 4. Helper invocations: `%concat`/`%C`, `%L`, `%STR`, `%SQL`
//! 5. Fallback chains: `/* ?a ?b ?c */'default'`
//! 6. Plain parameter comments: `/* $name */'default'`
//!
//! Modifier characters on a parameter comment:
//!
//! - `$` removable: drop the line when the value is negative
//! - `&` bindless: drop when negative; strip the comment (no
//!   placeholder) when positive
//! - `!` negation: invert the negative test
//! - `@` required: fail when negative
//! - `?` fallback: use the next chained parameter when negative

use once_cell::sync::Lazy;
use regex::Regex;

/// A literal default accepted after a parameter comment: quoted string
/// (SQL doubled-quote escape), number, identifier, parenthesised list,
/// or NULL.
const DEFAULT_FRAGMENT: &str = concat!(
    r"'(?:''|[^'])*'",
    r#"|"(?:""|[^"])*""#,
    r"|\d+(?:\.\d+)?",
    r"|\w+",
    r"|\([^)]*\)",
    r"|NULL",
);

static PARAM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"/\*\s*([$&@?!]+)?(\w+)\s*\*/\s*({DEFAULT_FRAGMENT})?"
    ))
    .unwrap()
});

static FALLBACK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"/\*\s*((?:\?\w+\s*)+)\*/\s*",
        r"('(?:''|[^'])*'",
        r#"|"(?:""|[^"])*""#,
        r"|\d+(?:\.\d+)?",
        r"|\w+",
        r"|NULL)",
    ))
    .unwrap()
});

static IN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bIN\s*/\*\s*([$&@?!]+)?(\w+)\s*\*/\s*\([^)]*\)").unwrap()
});

static OPERATOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"/\*\s*([$&@?!]+)?(\w+)\s*\*/\s*(=|<>|!=)\s*({DEFAULT_FRAGMENT})"
    ))
    .unwrap()
});

static LIKE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)/\*\s*([$&@?!]+)?(\w+)\s*\*/\s*",
        r"(NOT\s+)?LIKE\s+",
        r"('(?:''|[^'])*'",
        r#"|"(?:""|[^"])*")"#,
    ))
    .unwrap()
});

static CONCAT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"/\*\s*(?:%concat\s*\(|%C\s+)([^)]+?)\)?\s*\*/\s*",
        r"('(?:''|[^'])*'",
        r#"|"(?:""|[^"])*")"#,
    ))
    .unwrap()
});

static LIKE_ESCAPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"/\*\s*%L\s+([^*]+?)\s*\*/\s*",
        r"('(?:''|[^'])*'",
        r#"|"(?:""|[^"])*")"#,
    ))
    .unwrap()
});

static STR_EMBED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"/\*\s*%(STR|SQL)\s*\(\s*(\w+)\s*\)\s*\*/\s*",
        r"('(?:''|[^'])*'",
        r#"|"(?:""|[^"])*""#,
        r"|\w+)",
    ))
    .unwrap()
});

static IN_KEYWORD_BEFORE_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bIN\s*$").unwrap());

/// Modifier flags parsed from the character group before the name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub removable: bool,
    pub bindless: bool,
    pub negated: bool,
    pub required: bool,
    pub fallback: bool,
}

impl Modifiers {
    fn parse(group: Option<&str>) -> Modifiers {
        let Some(chars) = group else {
            return Modifiers::default();
        };
        Modifiers {
            removable: chars.contains('$'),
            bindless: chars.contains('&'),
            negated: chars.contains('!'),
            required: chars.contains('@'),
            fallback: chars.contains('?'),
        }
    }
}

/// Helper functions invocable from a parameter comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperFunc {
    /// `%concat(...)` / `%C ...`: concatenate literals and values.
    Concat,
    /// `%L ...`: concatenate, LIKE-escape values, append `escape '#'`.
    LikeEscape,
    /// `%STR(name)`: raw textual interpolation.
    Str,
    /// `%SQL(name)`: raw textual interpolation.
    Sql,
}

/// What a token rewrites into.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A scalar parameter site. `partial_in` marks a comment located
    /// textually inside an `IN (...)` literal list; it expands to a
    /// placeholder sequence instead of a single bound value.
    Plain { partial_in: bool },
    /// The whole `IN /* name */(...)` clause.
    InClause,
    /// `/* name */= default` style comparison, auto-rewritten by value
    /// shape (`IS NULL`, `IN (...)`, scalar).
    Operator { op: String },
    /// `/* name */[NOT ]LIKE 'default'`, OR/AND-expanded for lists.
    Like { negated: bool },
    /// `%concat`/`%C`/`%L`/`%STR`/`%SQL` invocation.
    Helper { func: HelperFunc, args: Vec<String> },
    /// `/* ?a ?b */default`: first non-negative of the chain.
    Fallback { names: Vec<String> },
}

/// One parameter occurrence inside a logical line. Offsets are a
/// half-open `[start, end)` byte range within the line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamToken {
    pub name: String,
    pub modifiers: Modifiers,
    pub default: String,
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl ParamToken {
    pub fn is_in_clause(&self) -> bool {
        matches!(self.kind, TokenKind::InClause)
    }

    pub fn fallback_names(&self) -> Option<&[String]> {
        match &self.kind {
            TokenKind::Fallback { names } => Some(names),
            _ => None,
        }
    }
}

fn overlaps(start: usize, end: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|&(s, e)| start < e && end > s)
}

/// Extract all parameter tokens from a logical line, ordered by start
/// offset and non-overlapping. Layer order fixes precedence: IN >
/// operator > LIKE > helpers > fallback > plain.
pub fn tokenize(line: &str) -> Vec<ParamToken> {
    let mut tokens: Vec<ParamToken> = Vec::new();
    let mut used: Vec<(usize, usize)> = Vec::new();

    for caps in IN_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        tokens.push(ParamToken {
            name: caps[2].to_string(),
            modifiers: Modifiers::parse(caps.get(1).map(|g| g.as_str())),
            default: extract_in_default(m.as_str()),
            kind: TokenKind::InClause,
            start: m.start(),
            end: m.end(),
        });
        used.push((m.start(), m.end()));
    }

    for caps in OPERATOR_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        if overlaps(m.start(), m.end(), &used) {
            continue;
        }
        tokens.push(ParamToken {
            name: caps[2].to_string(),
            modifiers: Modifiers::parse(caps.get(1).map(|g| g.as_str())),
            default: caps[4].to_string(),
            kind: TokenKind::Operator {
                op: caps[3].to_string(),
            },
            start: m.start(),
            end: m.end(),
        });
        used.push((m.start(), m.end()));
    }

    for caps in LIKE_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        if overlaps(m.start(), m.end(), &used) {
            continue;
        }
        tokens.push(ParamToken {
            name: caps[2].to_string(),
            modifiers: Modifiers::parse(caps.get(1).map(|g| g.as_str())),
            default: caps[4].to_string(),
            kind: TokenKind::Like {
                negated: caps.get(3).is_some(),
            },
            start: m.start(),
            end: m.end(),
        });
        used.push((m.start(), m.end()));
    }

    for caps in CONCAT_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        if overlaps(m.start(), m.end(), &used) {
            continue;
        }
        let args = parse_helper_args(&caps[1]);
        tokens.push(ParamToken {
            name: first_param_name(&args).unwrap_or("_concat").to_string(),
            modifiers: Modifiers::default(),
            default: caps[2].to_string(),
            kind: TokenKind::Helper {
                func: HelperFunc::Concat,
                args,
            },
            start: m.start(),
            end: m.end(),
        });
        used.push((m.start(), m.end()));
    }

    for caps in LIKE_ESCAPE_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        if overlaps(m.start(), m.end(), &used) {
            continue;
        }
        let args = parse_helper_args(&caps[1]);
        tokens.push(ParamToken {
            name: first_param_name(&args).unwrap_or("_like_escape").to_string(),
            modifiers: Modifiers::default(),
            default: caps[2].to_string(),
            kind: TokenKind::Helper {
                func: HelperFunc::LikeEscape,
                args,
            },
            start: m.start(),
            end: m.end(),
        });
        used.push((m.start(), m.end()));
    }

    for caps in STR_EMBED_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        if overlaps(m.start(), m.end(), &used) {
            continue;
        }
        let func = if &caps[1] == "STR" {
            HelperFunc::Str
        } else {
            HelperFunc::Sql
        };
        let name = caps[2].to_string();
        tokens.push(ParamToken {
            name: name.clone(),
            modifiers: Modifiers::default(),
            default: caps[3].to_string(),
            kind: TokenKind::Helper {
                func,
                args: vec![name],
            },
            start: m.start(),
            end: m.end(),
        });
        used.push((m.start(), m.end()));
    }

    for caps in FALLBACK_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        if overlaps(m.start(), m.end(), &used) {
            continue;
        }
        let names: Vec<String> = caps[1]
            .split_whitespace()
            .filter_map(|part| part.strip_prefix('?'))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            continue;
        }
        tokens.push(ParamToken {
            name: names[0].clone(),
            modifiers: Modifiers {
                // A fallback chain always drops its line when every
                // chained name is negative.
                removable: true,
                fallback: true,
                ..Modifiers::default()
            },
            default: caps[2].to_string(),
            kind: TokenKind::Fallback { names },
            start: m.start(),
            end: m.end(),
        });
        used.push((m.start(), m.end()));
    }

    for caps in PARAM_PATTERN.captures_iter(line) {
        let m = caps.get(0).unwrap();
        if overlaps(m.start(), m.end(), &used) {
            continue;
        }
        tokens.push(ParamToken {
            name: caps[2].to_string(),
            modifiers: Modifiers::parse(caps.get(1).map(|g| g.as_str())),
            default: caps.get(3).map(|g| g.as_str()).unwrap_or("").to_string(),
            kind: TokenKind::Plain {
                partial_in: is_inside_in_clause(line, m.start(), m.end()),
            },
            start: m.start(),
            end: m.end(),
        });
    }

    tokens.sort_by_key(|t| t.start);
    tokens
}

/// First helper argument that is not a string literal, used as the
/// token's parameter name.
fn first_param_name(args: &[String]) -> Option<&str> {
    args.iter()
        .find(|a| !a.starts_with('\'') && !a.starts_with('"'))
        .map(String::as_str)
}

/// Split a helper argument list on commas or whitespace, keeping
/// quoted literals (with SQL doubled-quote escapes) intact.
pub fn parse_helper_args(args_str: &str) -> Vec<String> {
    let chars: Vec<char> = args_str.chars().collect();
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\'' && !in_double {
            if in_single && chars.get(i + 1) == Some(&'\'') {
                current.push_str("''");
                i += 2;
                continue;
            }
            in_single = !in_single;
            current.push(ch);
        } else if ch == '"' && !in_single {
            if in_double && chars.get(i + 1) == Some(&'"') {
                current.push_str("\"\"");
                i += 2;
                continue;
            }
            in_double = !in_double;
            current.push(ch);
        } else if (ch == ',' || ch.is_whitespace()) && !in_single && !in_double {
            if !current.trim().is_empty() {
                args.push(current.trim().to_string());
            }
            current.clear();
        } else {
            current.push(ch);
        }
        i += 1;
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

/// Whether a plain parameter comment sits inside an `IN (...)` literal
/// list (and was not already consumed as a full IN-clause token).
fn is_inside_in_clause(line: &str, start: usize, end: usize) -> bool {
    let prefix = &line[..start];

    // Walk backwards to the unbalanced open paren, then check for an
    // IN keyword right before it.
    let mut depth = 0usize;
    let mut in_found = false;
    for (i, ch) in prefix.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => {
                if depth > 0 {
                    depth -= 1;
                } else {
                    let before_paren = prefix[..i].trim_end();
                    in_found = IN_KEYWORD_BEFORE_PAREN.is_match(before_paren);
                    break;
                }
            }
            _ => {}
        }
    }
    if !in_found {
        return false;
    }
    // The list must still close after the parameter.
    line[end..].contains(')')
}

/// The literal list part of an IN-clause match, from `(` to `)`.
fn extract_in_default(matched: &str) -> String {
    match matched.rfind('(') {
        Some(idx) => matched[idx..].to_string(),
        None => String::new(),
    }
}
