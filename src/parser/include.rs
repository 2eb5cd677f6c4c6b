//! Textual `%include` expansion.
//!
//! Runs over the raw template text before any line processing. Each
//! directive is replaced in situ by the referenced file's verbatim
//! content, recursively; paths resolve relative to the directory of
//! the *including* file. Revisiting a file on the active include chain
//! is a parse error. Without a configured base directory the pass is a
//! no-op and directives stay in the text.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{format_message, ErrorOptions, MessageKey, TemplateError, TemplateResult};
use crate::parser::directive::parse_includes;

/// Expand include directives in `source` against `base_dir`.
pub fn expand_includes(
    source: &str,
    base_dir: Option<&Path>,
    errors: ErrorOptions,
) -> TemplateResult<String> {
    let Some(base_dir) = base_dir else {
        return Ok(source.to_string());
    };
    let mut chain = HashSet::new();
    expand_in(source, base_dir, &mut chain, errors)
}

fn expand_in(
    source: &str,
    dir: &Path,
    chain: &mut HashSet<PathBuf>,
    errors: ErrorOptions,
) -> TemplateResult<String> {
    let mut out_lines: Vec<String> = Vec::new();

    for line in source.split('\n') {
        let directives = parse_includes(line);
        if directives.is_empty() {
            out_lines.push(line.to_string());
            continue;
        }

        let mut expanded = line.to_string();
        for directive in directives.iter().rev() {
            let target = dir.join(&directive.path);
            let content = read_included(&target, chain, errors)?;
            let child_dir = target.parent().map(Path::to_path_buf).unwrap_or_default();
            let content = expand_in(&content, &child_dir, chain, errors)?;
            chain.remove(&normalize(&target));
            expanded.replace_range(directive.start..directive.end, &content);
        }
        out_lines.push(expanded);
    }

    Ok(out_lines.join("\n"))
}

fn read_included(
    path: &Path,
    chain: &mut HashSet<PathBuf>,
    errors: ErrorOptions,
) -> TemplateResult<String> {
    let key = normalize(path);
    if !chain.insert(key) {
        return Err(TemplateError::CircularInclude {
            message: format!(
                "{}: {}",
                format_message(MessageKey::CircularInclude, errors, None, None, None),
                path.display()
            ),
            path: path.display().to_string(),
        });
    }
    debug!("including {}", path.display());
    std::fs::read_to_string(path).map_err(|_| TemplateError::FileNotFound {
        message: format!(
            "{}: {}",
            format_message(MessageKey::IncludeNotFound, errors, None, None, None),
            path.display()
        ),
        path: path.display().to_string(),
    })
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
