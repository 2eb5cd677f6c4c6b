//! Error types and message configuration.
//!
//! Parse errors carry the logical line number they originate from and,
//! where applicable, the parameter name. Message text is selected from
//! a fixed Japanese/English catalog; whether the offending SQL line is
//! appended is an opt-in. Both knobs live in [`ErrorOptions`], an
//! immutable per-template configuration object, not process state.

use thiserror::Error;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Failures surfaced by template construction, compilation, and
/// loading. Compilation never retries or produces partial output.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TemplateError {
    /// Contradictory construction options (explicit placeholder vs
    /// dialect-implied placeholder).
    #[error("{0}")]
    Configuration(String),

    /// A `@`-modified parameter resolved to a negative value.
    #[error("{message}")]
    RequiredParamMissing {
        message: String,
        line: usize,
        param: String,
    },

    /// IN-clause chunking could not recover a column expression.
    #[error("{message}")]
    InClauseColumnUnresolved { message: String, line: usize },

    /// `%ELSEIF`/`%ELSE`/`%END` without `%IF`, an unclosed `%IF`, or a
    /// malformed condition expression.
    #[error("{message}")]
    DirectiveMisuse { message: String, line: usize },

    /// An `%include` chain revisited a file already being expanded.
    #[error("{message}")]
    CircularInclude { message: String, path: String },

    /// An included or loaded SQL file does not exist (or escapes the
    /// base directory).
    #[error("{message}")]
    FileNotFound { message: String, path: String },
}

/// Message language for error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageLanguage {
    /// Japanese (the catalog's primary language).
    #[default]
    Ja,
    /// English.
    En,
}

/// Error-reporting configuration, fixed at template construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorOptions {
    /// Language the message text is taken from.
    pub language: MessageLanguage,
    /// Append the stripped offending SQL line as `sql='...'`.
    pub include_sql: bool,
}

/// Catalog keys for parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageKey {
    RequiredParamMissing,
    InClauseColumnUnresolved,
    DirectiveWithoutIf,
    UnclosedIf,
    BadCondition,
    CircularInclude,
    IncludeNotFound,
    SqlFileNotFound,
    ConflictingPlaceholder,
}

impl MessageKey {
    fn text(self, language: MessageLanguage) -> &'static str {
        match language {
            MessageLanguage::Ja => match self {
                MessageKey::RequiredParamMissing => "必須パラメータが指定されていません",
                MessageKey::InClauseColumnUnresolved => "IN句分割の列式を抽出できません",
                MessageKey::DirectiveWithoutIf => "対応する %IF がないディレクティブです",
                MessageKey::UnclosedIf => "%IF に対応する %END がありません",
                MessageKey::BadCondition => "条件式を解析できません",
                MessageKey::CircularInclude => "循環インクルードを検出しました",
                MessageKey::IncludeNotFound => "インクルードファイルが見つかりません",
                MessageKey::SqlFileNotFound => "SQLファイルが見つかりません",
                MessageKey::ConflictingPlaceholder => {
                    "dialect と placeholder は同時に指定できません"
                }
            },
            MessageLanguage::En => match self {
                MessageKey::RequiredParamMissing => "Required parameter is missing",
                MessageKey::InClauseColumnUnresolved => {
                    "Failed to extract column expression for IN clause split"
                }
                MessageKey::DirectiveWithoutIf => "Directive without a matching %IF",
                MessageKey::UnclosedIf => "%IF block is missing its %END",
                MessageKey::BadCondition => "Failed to parse condition expression",
                MessageKey::CircularInclude => "Circular include detected",
                MessageKey::IncludeNotFound => "Included SQL file not found",
                MessageKey::SqlFileNotFound => "SQL file not found",
                MessageKey::ConflictingPlaceholder => {
                    "dialect and placeholder cannot both be specified"
                }
            },
        }
    }
}

/// Compose a catalog message with the standard suffixes:
/// `<base>: line=<n> param='<name>' sql='<stripped line>'`.
pub(crate) fn format_message(
    key: MessageKey,
    options: ErrorOptions,
    line: Option<usize>,
    param: Option<&str>,
    sql_line: Option<&str>,
) -> String {
    let mut msg = key.text(options.language).to_string();
    if let Some(line) = line {
        msg.push_str(&format!(": line={line}"));
    }
    if let Some(param) = param {
        msg.push_str(&format!(" param='{param}'"));
    }
    if options.include_sql {
        if let Some(sql) = sql_line {
            msg.push_str(&format!(" sql='{}'", sql.trim()));
        }
    }
    msg
}
