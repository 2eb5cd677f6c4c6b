//! Loading SQL template files from a base directory.
//!
//! When a dialect is active, a dialect-specific file is preferred:
//! `employee/find.sql` with Oracle first tries
//! `employee/find.oracle.sql`. Lookups that resolve outside the base
//! directory are rejected.

use std::path::{Path, PathBuf};

use crate::dialect::Dialect;
use crate::error::{
    format_message, ErrorOptions, MessageKey, TemplateError, TemplateResult,
};

/// Reads template text for logical paths under a base directory.
#[derive(Debug, Clone)]
pub struct SqlLoader {
    base_dir: PathBuf,
    errors: ErrorOptions,
}

impl SqlLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> SqlLoader {
        SqlLoader {
            base_dir: base_dir.into(),
            errors: ErrorOptions::default(),
        }
    }

    pub fn with_error_options(mut self, errors: ErrorOptions) -> SqlLoader {
        self.errors = errors;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Load a template. With a dialect, `<stem>.<dialect-id>.<ext>` is
    /// tried before the plain path.
    pub fn load(&self, path: &str, dialect: Option<Dialect>) -> TemplateResult<String> {
        if let Some(dialect) = dialect {
            if let Some(candidate) = dialect_specific_path(path, dialect) {
                if let Some(resolved) = self.resolve(&candidate) {
                    return self.read(&resolved);
                }
            }
        }

        match self.resolve(Path::new(path)) {
            Some(resolved) => self.read(&resolved),
            None => Err(self.not_found(path)),
        }
    }

    /// Join against the base directory and require the result to stay
    /// inside it.
    fn resolve(&self, relative: &Path) -> Option<PathBuf> {
        let base = self.base_dir.canonicalize().ok()?;
        let joined = base.join(relative);
        let resolved = joined.canonicalize().ok()?;
        if resolved != base && resolved.starts_with(&base) && resolved.is_file() {
            Some(resolved)
        } else {
            None
        }
    }

    fn read(&self, path: &Path) -> TemplateResult<String> {
        std::fs::read_to_string(path).map_err(|_| self.not_found(&path.display().to_string()))
    }

    fn not_found(&self, path: &str) -> TemplateError {
        TemplateError::FileNotFound {
            message: format!(
                "{}: {}",
                format_message(MessageKey::SqlFileNotFound, self.errors, None, None, None),
                path
            ),
            path: path.to_string(),
        }
    }
}

/// `employee/find.sql` + oracle → `employee/find.oracle.sql`.
fn dialect_specific_path(path: &str, dialect: Dialect) -> Option<PathBuf> {
    let path = Path::new(path);
    let stem = path.file_stem()?.to_str()?;
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{}.{ext}", dialect.id()),
        None => format!("{stem}.{}", dialect.id()),
    };
    Some(match path.parent() {
        Some(parent) if parent != Path::new("") => parent.join(name),
        _ => PathBuf::from(name),
    })
}
