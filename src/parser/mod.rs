//! The two-way SQL template compiler.
//!
//! A template is plain, runnable SQL: every dynamic site is a comment
//! sitting next to a literal default, so the file executes as-is
//! during development. Compiling it against a parameter map yields the
//! final SQL string plus the bound parameter set for a driver's
//! prepared-statement API:
//!
//! ```text
//! source + base dir + params
//!   → include expansion
//!   → logical lines
//!   → block-directive resolution
//!   → indent tree
//!   → modifier evaluation (mark removal)
//!   → removal propagation
//!   → SQL rebuild (per-line rewrite)
//!   → cleanup
//!   → CompileResult
//! ```

pub mod clean;
pub mod cond;
pub mod directive;
pub mod include;
pub mod line;
pub mod rebuild;
pub mod removal;
pub mod tokenizer;

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::debug;

use crate::dialect::{Dialect, PlaceholderStyle};
use crate::error::{
    format_message, ErrorOptions, MessageKey, TemplateError, TemplateResult,
};
use crate::parser::cond::eval_condition;
use crate::parser::directive::{parse_directive, BlockDirective};
use crate::parser::line::{LineArena, LogicalLine};
use crate::parser::rebuild::Rebuilder;
use crate::value::{Params, Value};

/// Compile-time configuration for a template.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    placeholder: Option<PlaceholderStyle>,
    dialect: Option<Dialect>,
    base_dir: Option<PathBuf>,
    errors: ErrorOptions,
}

impl CompileOptions {
    /// Explicit placeholder style (`?` by default). Conflicts with a
    /// dialect unless it is the default `?`.
    pub fn with_placeholder(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder = Some(style);
        self
    }

    /// Target dialect; implies its placeholder style.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Base directory for `%include` resolution.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Error message language and SQL-fragment inclusion.
    pub fn with_error_options(mut self, errors: ErrorOptions) -> Self {
        self.errors = errors;
        self
    }
}

/// A parsed-and-validated two-way SQL template. Immutable after
/// construction; `compile` may be called any number of times with
/// different parameter maps.
#[derive(Debug, Clone)]
pub struct SqlTemplate {
    source: String,
    style: PlaceholderStyle,
    dialect: Option<Dialect>,
    base_dir: Option<PathBuf>,
    errors: ErrorOptions,
}

/// Result of one compile invocation.
///
/// For positional placeholder styles (`?`, `%s`) the driver consumes
/// `params` and `named_params` mirrors the caller's input map. For the
/// named style (`:name`) the driver consumes `named_params`, which
/// holds exactly the names referenced by the produced SQL, and
/// `params` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    pub sql: String,
    pub params: Vec<Value>,
    pub named_params: BTreeMap<String, Value>,
}

impl SqlTemplate {
    /// Template with default options: `?` placeholders, no dialect, no
    /// include directory.
    pub fn new(sql: impl Into<String>) -> SqlTemplate {
        SqlTemplate {
            source: sql.into(),
            style: PlaceholderStyle::Question,
            dialect: None,
            base_dir: None,
            errors: ErrorOptions::default(),
        }
    }

    /// Template with explicit options. Fails with a configuration
    /// error when a dialect is combined with a non-default explicit
    /// placeholder style.
    pub fn with_options(sql: impl Into<String>, options: CompileOptions) -> TemplateResult<SqlTemplate> {
        if let (Some(style), Some(_)) = (options.placeholder, options.dialect) {
            if style != PlaceholderStyle::Question {
                return Err(TemplateError::Configuration(format_message(
                    MessageKey::ConflictingPlaceholder,
                    options.errors,
                    None,
                    None,
                    None,
                )));
            }
        }
        let style = match options.dialect {
            Some(dialect) => dialect.placeholder_style(),
            None => options.placeholder.unwrap_or(PlaceholderStyle::Question),
        };
        Ok(SqlTemplate {
            source: sql.into(),
            style,
            dialect: options.dialect,
            base_dir: options.base_dir,
            errors: options.errors,
        })
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// Compile the template against a parameter map.
    pub fn compile(&self, params: &Params) -> TemplateResult<CompileResult> {
        let expanded =
            include::expand_includes(&self.source, self.base_dir.as_deref(), self.errors)?;

        let lines = LineArena::parse(&expanded).into_lines();
        let resolved = resolve_block_directives(lines, params, self.errors)?;

        let mut arena = LineArena::from_lines(resolved);
        arena.build_tree();

        removal::evaluate_params(&mut arena, params, self.errors)?;
        removal::propagate_removal(&mut arena);

        let rebuilder = Rebuilder {
            style: self.style,
            dialect: self.dialect,
            errors: self.errors,
            params,
        };
        let output = rebuilder.rebuild(&arena)?;
        let sql = clean::clean_sql(&output.sql);
        debug!(
            "compiled template: {} chars in, {} chars out, {} positional binds",
            self.source.len(),
            sql.len(),
            output.positional.len()
        );

        if self.style.is_named() {
            Ok(CompileResult {
                sql,
                params: Vec::new(),
                named_params: output.named,
            })
        } else {
            Ok(CompileResult {
                sql,
                params: output.positional,
                named_params: params.clone(),
            })
        }
    }
}

/// One-shot compile: build a template with `options` and run it.
pub fn compile_sql(
    sql: &str,
    params: &Params,
    options: CompileOptions,
) -> TemplateResult<CompileResult> {
    SqlTemplate::with_options(sql, options)?.compile(params)
}

/// Resolve `-- %IF` blocks over the logical-line list, before the
/// indent tree exists. The selected branch is processed recursively;
/// every directive line and unselected branch is dropped.
fn resolve_block_directives(
    lines: Vec<LogicalLine>,
    params: &Params,
    errors: ErrorOptions,
) -> TemplateResult<Vec<LogicalLine>> {
    let mut out: Vec<LogicalLine> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        match parse_directive(&line.content) {
            Some(BlockDirective::If(cond)) => {
                let (branches, end_idx) = collect_branches(&lines, i, &cond, errors)?;
                let mut selected: Option<(usize, usize)> = None;
                for branch in &branches {
                    let satisfied = match &branch.condition {
                        Some(cond) => eval_condition(cond, params).map_err(|_| {
                            TemplateError::DirectiveMisuse {
                                message: format_message(
                                    MessageKey::BadCondition,
                                    errors,
                                    Some(lines[i].line_number),
                                    None,
                                    Some(cond.as_str()),
                                ),
                                line: lines[i].line_number,
                            }
                        })?,
                        // The %ELSE branch is always satisfied.
                        None => true,
                    };
                    if satisfied {
                        selected = Some((branch.start, branch.end));
                        break;
                    }
                }
                if let Some((start, end)) = selected {
                    debug!(
                        "block directive at line {} kept {} branch line(s)",
                        line.line_number,
                        end - start
                    );
                    let branch_lines = lines[start..end].to_vec();
                    out.extend(resolve_block_directives(branch_lines, params, errors)?);
                }
                i = end_idx + 1;
            }
            Some(_) => {
                return Err(TemplateError::DirectiveMisuse {
                    message: format_message(
                        MessageKey::DirectiveWithoutIf,
                        errors,
                        Some(line.line_number),
                        None,
                        Some(line.content.as_str()),
                    ),
                    line: line.line_number,
                });
            }
            None => {
                out.push(line.clone());
                i += 1;
            }
        }
    }

    Ok(out)
}

struct Branch {
    /// `None` marks the `%ELSE` branch.
    condition: Option<String>,
    start: usize,
    end: usize,
}

/// Collect the branches of the `%IF` at `if_idx`, up to its matching
/// `%END` (nested blocks stay inside their branch).
fn collect_branches(
    lines: &[LogicalLine],
    if_idx: usize,
    if_cond: &str,
    errors: ErrorOptions,
) -> Result<(Vec<Branch>, usize), TemplateError> {
    let mut branches: Vec<Branch> = Vec::new();
    let mut current_cond = Some(if_cond.to_string());
    let mut branch_start = if_idx + 1;
    let mut depth = 0;

    let mut j = if_idx + 1;
    while j < lines.len() {
        match parse_directive(&lines[j].content) {
            Some(BlockDirective::If(_)) => depth += 1,
            Some(BlockDirective::ElseIf(cond)) if depth == 0 => {
                branches.push(Branch {
                    condition: current_cond.take(),
                    start: branch_start,
                    end: j,
                });
                current_cond = Some(cond);
                branch_start = j + 1;
            }
            Some(BlockDirective::Else) if depth == 0 => {
                branches.push(Branch {
                    condition: current_cond.take(),
                    start: branch_start,
                    end: j,
                });
                current_cond = None;
                branch_start = j + 1;
            }
            Some(BlockDirective::End) => {
                if depth == 0 {
                    branches.push(Branch {
                        condition: current_cond.take(),
                        start: branch_start,
                        end: j,
                    });
                    return Ok((branches, j));
                }
                depth -= 1;
            }
            _ => {}
        }
        j += 1;
    }

    Err(TemplateError::DirectiveMisuse {
        message: format_message(
            MessageKey::UnclosedIf,
            errors,
            Some(lines[if_idx].line_number),
            None,
            Some(lines[if_idx].content.as_str()),
        ),
        line: lines[if_idx].line_number,
    })
}
