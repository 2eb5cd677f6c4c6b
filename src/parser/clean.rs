//! Cleanup of residues left by line pruning.
//!
//! Operates on the rebuilt SQL text, in this order:
//!
//! 1. orphan set-operator lines (`UNION [ALL]`, `EXCEPT`, `INTERSECT`)
//! 2. `)`-only lines with no matching open paren
//! 3. trailing `AND`/`OR` at end of line
//! 4. trailing commas directly before a closing paren line
//! 5. leading `AND`/`OR` on the first condition after `WHERE`/`HAVING`
//! 6. dangling `WHERE`/`HAVING` (at end of text, or right before the
//!    next clause keyword)
//!
//! The whole pass is idempotent: cleaning already-clean SQL is a
//! no-op.

use once_cell::sync::Lazy;
use regex::Regex;

static SET_OPERATOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:UNION\s+ALL|UNION|EXCEPT|INTERSECT)\s*$").unwrap());

static TRAILING_AND_OR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)[ \t]+(?:AND|OR)[ \t]*$").unwrap());

static LEADING_AND_OR_AFTER_WHERE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\b(?:WHERE|HAVING)\b[ \t]*\n(?:[ \t]*\n)*)([ \t]+)(?:AND|OR)\b[ \t]+")
        .unwrap()
});

static DANGLING_WHERE_AT_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n?[ \t]*\b(?:WHERE|HAVING)\b[ \t]*(?:\n[ \t]*)*$").unwrap());

static DANGLING_WHERE_BEFORE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)[ \t]*\b(?:WHERE|HAVING)\b[ \t]*\n",
        r"([ \t]*\b(?:ORDER|GROUP|LIMIT|UNION|EXCEPT|INTERSECT|FETCH|OFFSET|FOR)\b)",
    ))
    .unwrap()
});

/// Apply all cleanup passes to the rebuilt SQL.
pub fn clean_sql(sql: &str) -> String {
    let lines: Vec<String> = sql.split('\n').map(str::to_string).collect();

    let lines = remove_orphan_set_operators(lines);
    let lines = remove_unmatched_close_parens(lines);
    let sql = lines.join("\n");

    let sql = TRAILING_AND_OR.replace_all(&sql, "").into_owned();
    let sql = remove_trailing_commas(&sql);
    let sql = LEADING_AND_OR_AFTER_WHERE
        .replace_all(&sql, "$1$2")
        .into_owned();
    let sql = DANGLING_WHERE_AT_END.replace_all(&sql, "").into_owned();
    DANGLING_WHERE_BEFORE_CLAUSE
        .replace_all(&sql, "$1")
        .into_owned()
}

fn is_set_operator(line: &str) -> bool {
    SET_OPERATOR_LINE.is_match(line)
}

/// A set-operator line needs a non-blank, non-set-operator line on
/// both sides; anything else is deleted until a fixed point. Runs of
/// consecutive operators collapse to the first.
fn remove_orphan_set_operators(mut lines: Vec<String>) -> Vec<String> {
    let mut changed = true;
    while changed {
        changed = false;
        let mut kept: Vec<String> = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if !is_set_operator(line) {
                kept.push(line.clone());
                continue;
            }
            let has_before = lines[..i]
                .iter()
                .any(|l| !l.trim().is_empty() && !is_set_operator(l));
            let has_after = lines[i + 1..]
                .iter()
                .any(|l| !l.trim().is_empty() && !is_set_operator(l));
            if has_before && has_after {
                kept.push(line.clone());
            } else {
                changed = true;
            }
        }
        lines = kept;
    }

    let mut result: Vec<String> = Vec::with_capacity(lines.len());
    let mut prev_was_set_op = false;
    for line in lines {
        if is_set_operator(&line) {
            if !prev_was_set_op {
                result.push(line);
                prev_was_set_op = true;
            }
        } else {
            if !line.trim().is_empty() {
                prev_was_set_op = false;
            }
            result.push(line);
        }
    }
    result
}

/// Delete `)`-only lines that have no line above them ending in an
/// unmatched `(`.
fn remove_unmatched_close_parens(lines: Vec<String>) -> Vec<String> {
    let mut open_stack: Vec<usize> = Vec::new();
    let mut remove: Vec<bool> = vec![false; lines.len()];
    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped == ")" {
            if open_stack.pop().is_none() {
                remove[i] = true;
            }
        } else if stripped.ends_with('(') {
            let opens = stripped.matches('(').count();
            let closes = stripped.matches(')').count();
            if opens > closes {
                open_stack.push(i);
            }
        }
    }
    lines
        .into_iter()
        .zip(remove)
        .filter(|(_, r)| !r)
        .map(|(line, _)| line)
        .collect()
}

/// Strip a trailing comma when the next non-blank line starts with `)`.
fn remove_trailing_commas(sql: &str) -> String {
    let lines: Vec<&str> = sql.split('\n').collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim_end();
        if stripped.ends_with(',') {
            let next = lines[i + 1..].iter().find(|l| !l.trim().is_empty());
            if let Some(next) = next {
                if next.trim_start().starts_with(')') {
                    let tail = &line[stripped.len()..];
                    result.push(format!("{}{}", &stripped[..stripped.len() - 1], tail));
                    continue;
                }
            }
        }
        result.push(line.to_string());
    }
    result.join("\n")
}
