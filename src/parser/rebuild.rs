//! SQL reconstruction from surviving lines.
//!
//! Walks lines in order, resolves inline conditionals, rewrites each
//! parameter token into driver placeholders (right to left so earlier
//! offsets stay valid), expands IN-clause lists (chunking them when
//! the dialect caps list size), converts operator/LIKE comments by
//! value shape, evaluates helper functions, and accumulates the bound
//! parameter sequence in textual output order.

use std::collections::BTreeMap;

use log::trace;

use crate::dialect::{escape_like, Dialect, PlaceholderStyle};
use crate::error::{format_message, ErrorOptions, MessageKey, TemplateError, TemplateResult};
use crate::parser::cond::eval_condition;
use crate::parser::directive::parse_inline_conditions;
use crate::parser::line::LineArena;
use crate::parser::tokenizer::{tokenize, HelperFunc, ParamToken, TokenKind};
use crate::value::{Params, Value};

/// Output of the rebuild pass, before cleanup.
pub struct RebuildOutput {
    pub sql: String,
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

pub struct Rebuilder<'a> {
    pub style: PlaceholderStyle,
    pub dialect: Option<Dialect>,
    pub errors: ErrorOptions,
    pub params: &'a Params,
}

impl<'a> Rebuilder<'a> {
    pub fn rebuild(&self, arena: &LineArena) -> TemplateResult<RebuildOutput> {
        let mut result_lines: Vec<String> = Vec::new();
        let mut positional: Vec<Value> = Vec::new();
        let mut named: BTreeMap<String, Value> = BTreeMap::new();

        for line in arena.iter() {
            if line.removed {
                continue;
            }
            if line.is_blank() {
                result_lines.push(line.original.clone());
                continue;
            }

            let mut content = line.content.clone();
            let fragments = parse_inline_conditions(&content);
            for fragment in fragments.iter().rev() {
                let replacement = self.select_inline_branch(
                    &fragment.conditions,
                    &fragment.values,
                    line.line_number,
                    &content,
                )?;
                content.replace_range(fragment.start..fragment.end, &replacement);
            }

            let tokens = tokenize(&content);
            if tokens.is_empty() {
                if fragments.is_empty() {
                    result_lines.push(line.original.clone());
                } else {
                    result_lines.push(indented(line.indent, &content));
                }
                continue;
            }

            // Rewrite right to left; bindings are collected per token
            // and replayed in textual order afterwards.
            let mut groups: Vec<Vec<Value>> = Vec::new();
            for token in tokens.iter().rev() {
                let binds =
                    self.rewrite_token(&mut content, token, line.line_number, &mut named)?;
                groups.push(binds);
            }
            for group in groups.into_iter().rev() {
                positional.extend(group);
            }

            trace!("rebuilt line {}: {}", line.line_number, content);
            result_lines.push(indented(line.indent, &content));
        }

        Ok(RebuildOutput {
            sql: result_lines.join("\n"),
            positional,
            named,
        })
    }

    fn select_inline_branch(
        &self,
        conditions: &[String],
        values: &[String],
        line_number: usize,
        sql_line: &str,
    ) -> TemplateResult<String> {
        for (i, condition) in conditions.iter().enumerate() {
            let satisfied = eval_condition(condition, self.params).map_err(|_| {
                TemplateError::DirectiveMisuse {
                    message: format_message(
                        MessageKey::BadCondition,
                        self.errors,
                        Some(line_number),
                        None,
                        Some(sql_line),
                    ),
                    line: line_number,
                }
            })?;
            if satisfied {
                return Ok(values.get(i).cloned().unwrap_or_default());
            }
        }
        if values.len() > conditions.len() {
            return Ok(values[values.len() - 1].clone());
        }
        Ok(String::new())
    }

    /// Rewrite one token in place; returns its positional bindings.
    fn rewrite_token(
        &self,
        line: &mut String,
        token: &ParamToken,
        line_number: usize,
        named: &mut BTreeMap<String, Value>,
    ) -> TemplateResult<Vec<Value>> {
        // Bindless gates emit nothing; a negative one already removed
        // the whole line.
        if token.modifiers.bindless {
            line.replace_range(token.start..token.end, "");
            return Ok(Vec::new());
        }

        match &token.kind {
            TokenKind::InClause => self.rewrite_in_clause(line, token, line_number, named),
            TokenKind::Operator { op } => Ok(self.rewrite_operator(line, token, op, named)),
            TokenKind::Like { negated } => {
                self.rewrite_like(line, token, *negated, line_number, named)
            }
            TokenKind::Helper { func, args } => {
                Ok(self.rewrite_helper(line, token, *func, args, named))
            }
            TokenKind::Fallback { names } => Ok(self.rewrite_fallback(line, token, names, named)),
            TokenKind::Plain { partial_in } => {
                Ok(self.rewrite_plain(line, token, *partial_in, named))
            }
        }
    }

    fn placeholder_for(&self, name: &str) -> String {
        match self.style {
            PlaceholderStyle::Named => format!(":{name}"),
            other => other.positional_text().to_string(),
        }
    }

    fn resolve(&self, name: &str) -> Value {
        self.params.get(name).cloned().unwrap_or(Value::Null)
    }

    fn rewrite_plain(
        &self,
        line: &mut String,
        token: &ParamToken,
        partial_in: bool,
        named: &mut BTreeMap<String, Value>,
    ) -> Vec<Value> {
        let value = self.resolve(&token.name);

        if partial_in {
            if let Value::List(items) = &value {
                if items.is_empty() {
                    line.replace_range(token.start..token.end, "NULL");
                    return Vec::new();
                }
                let (text, binds) = self.placeholder_list(&token.name, items, named);
                line.replace_range(token.start..token.end, &text);
                return binds;
            }
        }

        line.replace_range(token.start..token.end, &self.placeholder_for(&token.name));
        self.bind_single(&token.name, value, named)
    }

    fn rewrite_fallback(
        &self,
        line: &mut String,
        token: &ParamToken,
        names: &[String],
        named: &mut BTreeMap<String, Value>,
    ) -> Vec<Value> {
        let value = names
            .iter()
            .filter_map(|name| self.params.get(name))
            .find(|v| !v.is_negative())
            .cloned()
            .unwrap_or(Value::Null);
        line.replace_range(token.start..token.end, &self.placeholder_for(&token.name));
        self.bind_single(&token.name, value, named)
    }

    fn rewrite_in_clause(
        &self,
        line: &mut String,
        token: &ParamToken,
        line_number: usize,
        named: &mut BTreeMap<String, Value>,
    ) -> TemplateResult<Vec<Value>> {
        let value = self.resolve(&token.name);

        let Value::List(items) = &value else {
            // Scalars and NULL bind as a single-element list.
            let text = format!("IN ({})", self.placeholder_for(&token.name));
            line.replace_range(token.start..token.end, &text);
            return Ok(self.bind_single(&token.name, value, named));
        };

        if items.is_empty() {
            line.replace_range(token.start..token.end, "IN (NULL)");
            return Ok(Vec::new());
        }

        let limit = self.dialect.and_then(Dialect::in_clause_limit);
        if let Some(limit) = limit {
            if items.len() > limit {
                let Some((col_expr, col_start)) = extract_in_clause_column(line, token.start)
                else {
                    return Err(TemplateError::InClauseColumnUnresolved {
                        message: format_message(
                            MessageKey::InClauseColumnUnresolved,
                            self.errors,
                            Some(line_number),
                            None,
                            Some(line.as_str()),
                        ),
                        line: line_number,
                    });
                };
                let (text, binds) = self.chunked_in(&token.name, &col_expr, items, limit, named);
                line.replace_range(col_start..token.end, &text);
                return Ok(binds);
            }
        }

        let (list_text, binds) = self.placeholder_list(&token.name, items, named);
        line.replace_range(token.start..token.end, &format!("IN ({list_text})"));
        Ok(binds)
    }

    fn rewrite_operator(
        &self,
        line: &mut String,
        token: &ParamToken,
        op: &str,
        named: &mut BTreeMap<String, Value>,
    ) -> Vec<Value> {
        let affirmative = op == "=";
        let value = self.resolve(&token.name);

        let empty_list = matches!(&value, Value::List(items) if items.is_empty());
        if value.is_null() || empty_list {
            let text = if affirmative { "IS NULL" } else { "IS NOT NULL" };
            line.replace_range(token.start..token.end, text);
            return Vec::new();
        }

        if let Value::List(items) = &value {
            if items.len() == 1 {
                let text = format!("{op} {}", self.placeholder_for(&token.name));
                line.replace_range(token.start..token.end, &text);
                return self.bind_single(&token.name, items[0].clone(), named);
            }
            let (list_text, binds) = self.placeholder_list(&token.name, items, named);
            let keyword = if affirmative { "IN" } else { "NOT IN" };
            line.replace_range(token.start..token.end, &format!("{keyword} ({list_text})"));
            return binds;
        }

        let text = format!("{op} {}", self.placeholder_for(&token.name));
        line.replace_range(token.start..token.end, &text);
        self.bind_single(&token.name, value, named)
    }

    fn rewrite_like(
        &self,
        line: &mut String,
        token: &ParamToken,
        not_like: bool,
        line_number: usize,
        named: &mut BTreeMap<String, Value>,
    ) -> TemplateResult<Vec<Value>> {
        let value = self.resolve(&token.name);
        let keyword = if not_like { "NOT LIKE" } else { "LIKE" };

        let Value::List(items) = &value else {
            let text = format!("{keyword} {}", self.placeholder_for(&token.name));
            line.replace_range(token.start..token.end, &text);
            return Ok(self.bind_single(&token.name, value, named));
        };

        // List patterns need the column expression to repeat (or to be
        // dropped entirely for the degenerate empty list).
        let Some((col_expr, col_start)) = extract_in_clause_column(line, token.start) else {
            if items.is_empty() {
                let text = if not_like { "1=1" } else { "1=0" };
                line.replace_range(token.start..token.end, text);
                return Ok(Vec::new());
            }
            return Err(TemplateError::InClauseColumnUnresolved {
                message: format_message(
                    MessageKey::InClauseColumnUnresolved,
                    self.errors,
                    Some(line_number),
                    None,
                    Some(line.as_str()),
                ),
                line: line_number,
            });
        };

        if items.is_empty() {
            let text = if not_like { "1=1" } else { "1=0" };
            line.replace_range(col_start..token.end, text);
            return Ok(Vec::new());
        }

        let joiner = if not_like { " AND " } else { " OR " };
        let mut parts: Vec<String> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let ph = match self.style {
                PlaceholderStyle::Named => format!(":{}_{i}", token.name),
                other => other.positional_text().to_string(),
            };
            if self.style.is_named() {
                named.insert(format!("{}_{i}", token.name), item.clone());
            } else {
                binds.push(item.clone());
            }
            parts.push(format!("{col_expr} {keyword} {ph}"));
        }
        let text = format!("({})", parts.join(joiner));
        line.replace_range(col_start..token.end, &text);
        Ok(binds)
    }

    fn rewrite_helper(
        &self,
        line: &mut String,
        token: &ParamToken,
        func: HelperFunc,
        args: &[String],
        named: &mut BTreeMap<String, Value>,
    ) -> Vec<Value> {
        match func {
            HelperFunc::Concat => {
                let text = self.concat_args(args, false);
                line.replace_range(token.start..token.end, &self.placeholder_for(&token.name));
                self.bind_single(&token.name, Value::Text(text), named)
            }
            HelperFunc::LikeEscape => {
                let dialect = self.dialect.unwrap_or(Dialect::Sqlite);
                let text = self.concat_args(args, true);
                let replacement = format!(
                    "{} escape '{}'",
                    self.placeholder_for(&token.name),
                    dialect.like_escape_char()
                );
                line.replace_range(token.start..token.end, &replacement);
                self.bind_single(&token.name, Value::Text(text), named)
            }
            HelperFunc::Str | HelperFunc::Sql => {
                let value = self.params.get(&token.name);
                let text = match value {
                    None | Some(Value::Null) => token.default.clone(),
                    Some(v) => v.to_plain_string(),
                };
                line.replace_range(token.start..token.end, &text);
                Vec::new()
            }
        }
    }

    /// Concatenate helper arguments: quoted literals contribute their
    /// unescaped text, identifiers look up the parameter map (missing
    /// and null contribute nothing). With `like_escape`, parameter
    /// values are LIKE-escaped; literal fragments pass through raw.
    fn concat_args(&self, args: &[String], like_escape: bool) -> String {
        let dialect = self.dialect.unwrap_or(Dialect::Sqlite);
        let mut out = String::new();
        for arg in args {
            if arg.starts_with('\'') || arg.starts_with('"') {
                out.push_str(&unquote_literal(arg));
            } else {
                let text = match self.params.get(arg) {
                    None | Some(Value::Null) => String::new(),
                    Some(v) => v.to_plain_string(),
                };
                if like_escape {
                    out.push_str(&escape_like(&text, dialect, None));
                } else {
                    out.push_str(&text);
                }
            }
        }
        out
    }

    /// `?, ?, ?` or `:name_0, :name_1, :name_2` for a list value.
    fn placeholder_list(
        &self,
        name: &str,
        items: &[Value],
        named: &mut BTreeMap<String, Value>,
    ) -> (String, Vec<Value>) {
        if self.style.is_named() {
            let mut keys = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let key = format!("{name}_{i}");
                keys.push(format!(":{key}"));
                named.insert(key, item.clone());
            }
            (keys.join(", "), Vec::new())
        } else {
            let text = vec![self.style.positional_text(); items.len()].join(", ");
            (text, items.to_vec())
        }
    }

    /// Chunked `(col IN (...) OR col IN (...))` expansion for dialects
    /// with an IN-clause size limit.
    fn chunked_in(
        &self,
        name: &str,
        col_expr: &str,
        items: &[Value],
        limit: usize,
        named: &mut BTreeMap<String, Value>,
    ) -> (String, Vec<Value>) {
        let mut parts: Vec<String> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        let mut index = 0usize;
        for chunk in items.chunks(limit) {
            let phs: Vec<String> = chunk
                .iter()
                .map(|item| {
                    let ph = match self.style {
                        PlaceholderStyle::Named => {
                            let key = format!("{name}_{index}");
                            named.insert(key.clone(), item.clone());
                            format!(":{key}")
                        }
                        other => {
                            binds.push(item.clone());
                            other.positional_text().to_string()
                        }
                    };
                    index += 1;
                    ph
                })
                .collect();
            parts.push(format!("{col_expr} IN ({})", phs.join(", ")));
        }
        (format!("({})", parts.join(" OR ")), binds)
    }

    fn bind_single(
        &self,
        name: &str,
        value: Value,
        named: &mut BTreeMap<String, Value>,
    ) -> Vec<Value> {
        if self.style.is_named() {
            named.insert(name.to_string(), value);
            Vec::new()
        } else {
            vec![value]
        }
    }
}

fn indented(indent: i32, content: &str) -> String {
    let width = indent.max(0) as usize;
    format!("{}{}", " ".repeat(width), content)
}

/// Strip outer quotes from a string literal, resolving doubled-quote
/// escapes.
fn unquote_literal(literal: &str) -> String {
    let quote = match literal.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return literal.to_string(),
    };
    let inner = literal
        .strip_prefix(quote)
        .and_then(|s| s.strip_suffix(quote))
        .unwrap_or(literal);
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// Recover the column expression immediately left of an IN-clause (or
/// LIKE) token: a dotted identifier chain possibly containing quoted
/// segments, or a parenthesised expression optionally prefixed by an
/// identifier chain (function call). Returns the expression text and
/// its byte offset in `line`, or `None` when the text cannot be read
/// as one of those shapes (e.g. `id + 1`).
pub(crate) fn extract_in_clause_column(line: &str, token_start: usize) -> Option<(String, usize)> {
    let prefix = line[..token_start].trim_end();
    if prefix.is_empty() {
        return None;
    }
    let chars: Vec<(usize, char)> = prefix.char_indices().collect();
    let end = chars.len() - 1;

    if chars[end].1 == ')' {
        let open_idx = find_matching_open_paren(&chars, end)?;
        let expr_start = parse_identifier_chain(&chars, open_idx as isize - 1).unwrap_or(open_idx);
        let byte_start = chars[expr_start].0;
        return Some((prefix[byte_start..].trim().to_string(), byte_start));
    }

    let ident_start = parse_identifier_chain(&chars, end as isize)?;
    let byte_start = chars[ident_start].0;
    Some((prefix[byte_start..].trim().to_string(), byte_start))
}

/// Start index of the dotted identifier chain ending at `end`.
fn parse_identifier_chain(chars: &[(usize, char)], end: isize) -> Option<usize> {
    let mut i = end;
    while i >= 0 && chars[i as usize].1.is_whitespace() {
        i -= 1;
    }
    if i < 0 {
        return None;
    }

    let mut start = parse_identifier_segment(chars, i)?;
    i = start as isize - 1;

    while i >= 0 {
        if chars[i as usize].1 != '.' {
            return Some(start);
        }
        i -= 1;
        match parse_identifier_segment(chars, i) {
            Some(seg_start) => {
                start = seg_start;
                i = start as isize - 1;
            }
            None => return Some(start),
        }
    }
    Some(start)
}

/// Start index of one identifier segment (bare or double-quoted)
/// ending at `end`.
fn parse_identifier_segment(chars: &[(usize, char)], end: isize) -> Option<usize> {
    if end < 0 {
        return None;
    }
    let end = end as usize;

    if chars[end].1 == '"' {
        let mut i = end as isize - 1;
        while i >= 0 {
            if chars[i as usize].1 == '"' {
                if i > 0 && chars[(i - 1) as usize].1 == '"' {
                    i -= 2;
                    continue;
                }
                return Some(i as usize);
            }
            i -= 1;
        }
        return None;
    }

    if !is_ident_char(chars[end].1) {
        return None;
    }
    let mut i = end as isize;
    while i >= 0 && is_ident_char(chars[i as usize].1) {
        i -= 1;
    }
    let start = (i + 1) as usize;
    let first = chars[start].1;
    if !first.is_alphabetic() && first != '_' {
        return None;
    }
    Some(start)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Position of the `(` matching the `)` at `close_idx`, skipping
/// string literals.
fn find_matching_open_paren(chars: &[(usize, char)], close_idx: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = close_idx as isize;
    while i >= 0 {
        let ch = chars[i as usize].1;
        if ch == '\'' && !in_double {
            if i > 0 && chars[(i - 1) as usize].1 == '\'' {
                i -= 2;
                continue;
            }
            in_single = !in_single;
            i -= 1;
            continue;
        }
        if ch == '"' && !in_single {
            if i > 0 && chars[(i - 1) as usize].1 == '"' {
                i -= 2;
                continue;
            }
            in_double = !in_double;
            i -= 1;
            continue;
        }
        if in_single || in_double {
            i -= 1;
            continue;
        }
        if ch == ')' {
            depth += 1;
        } else if ch == '(' {
            depth -= 1;
            if depth == 0 {
                return Some(i as usize);
            }
        }
        i -= 1;
    }
    None
}
