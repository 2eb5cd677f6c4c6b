//! Logical lines and the indent tree.
//!
//! The source splits into logical lines: a physical line whose
//! single-/double-quote state is unbalanced is joined with the next
//! one, so multi-line string literals stay inside one logical line.
//! Lines then form a forest keyed by indentation. Lines live in an
//! arena; parent/child links are indices and removal is a flag on the
//! slot, so the fixed-point removal pass mutates nothing but that
//! flag.

/// Index of a line inside its [`LineArena`].
pub type LineId = usize;

/// One logical line of the template.
#[derive(Debug, Clone)]
pub struct LogicalLine {
    /// 1-based number of the first physical line.
    pub line_number: usize,
    /// Verbatim text, including any joined physical lines.
    pub original: String,
    /// Column of the first non-blank character; `-1` for blank lines.
    pub indent: i32,
    /// `original` with the first physical line's indent stripped.
    pub content: String,
    pub children: Vec<LineId>,
    pub parent: Option<LineId>,
    pub removed: bool,
}

impl LogicalLine {
    pub fn is_blank(&self) -> bool {
        self.indent < 0 || self.content.trim().is_empty()
    }
}

/// Arena of logical lines in input order.
#[derive(Debug, Default)]
pub struct LineArena {
    lines: Vec<LogicalLine>,
}

impl LineArena {
    /// Split source text into logical lines, joining lines that
    /// straddle unterminated string literals.
    pub fn parse(source: &str) -> LineArena {
        let mut lines: Vec<LogicalLine> = Vec::new();
        let mut pending: Option<LogicalLine> = None;

        for (i, physical) in source.split('\n').enumerate() {
            match pending.take() {
                Some(mut open_line) => {
                    open_line.original.push('\n');
                    open_line.original.push_str(physical);
                    open_line.content.push('\n');
                    open_line.content.push_str(physical);
                    if is_string_closed(&open_line.content) {
                        lines.push(open_line);
                    } else {
                        pending = Some(open_line);
                    }
                }
                None => {
                    let stripped = physical.trim_start();
                    let indent = if stripped.is_empty() {
                        -1
                    } else {
                        (physical.chars().count() - stripped.chars().count()) as i32
                    };
                    let line = LogicalLine {
                        line_number: i + 1,
                        original: physical.to_string(),
                        indent,
                        content: stripped.to_string(),
                        children: Vec::new(),
                        parent: None,
                        removed: false,
                    };
                    if is_string_closed(&line.content) {
                        lines.push(line);
                    } else {
                        pending = Some(line);
                    }
                }
            }
        }
        // An unterminated literal at EOF keeps its partial line.
        if let Some(open_line) = pending {
            lines.push(open_line);
        }

        LineArena { lines }
    }

    /// Build the parent/child forest from indentation. Blank lines are
    /// never attached.
    pub fn build_tree(&mut self) {
        let mut stack: Vec<LineId> = Vec::new();
        for id in 0..self.lines.len() {
            if self.lines[id].is_blank() {
                continue;
            }
            let indent = self.lines[id].indent;
            while let Some(&top) = stack.last() {
                if self.lines[top].indent >= indent {
                    stack.pop();
                } else {
                    break;
                }
            }
            if let Some(&parent) = stack.last() {
                self.lines[id].parent = Some(parent);
                self.lines[parent].children.push(id);
            }
            stack.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, id: LineId) -> &LogicalLine {
        &self.lines[id]
    }

    pub fn mark_removed(&mut self, id: LineId) {
        self.lines[id].removed = true;
    }

    pub fn ids(&self) -> impl DoubleEndedIterator<Item = LineId> {
        0..self.lines.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogicalLine> {
        self.lines.iter()
    }

    pub fn into_lines(self) -> Vec<LogicalLine> {
        self.lines
    }

    /// Rebuild an arena from a filtered line list. Tree links are
    /// reset; call [`LineArena::build_tree`] afterwards.
    pub fn from_lines(lines: Vec<LogicalLine>) -> LineArena {
        let lines = lines
            .into_iter()
            .map(|mut line| {
                line.children.clear();
                line.parent = None;
                line
            })
            .collect();
        LineArena { lines }
    }
}

/// Whether every string literal in `s` is terminated. Doubled quotes
/// (`''`, `""`) count as escapes inside a literal.
pub fn is_string_closed(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '\'' && !in_double {
            if in_single && chars.get(i + 1) == Some(&'\'') {
                i += 2;
                continue;
            }
            in_single = !in_single;
        } else if ch == '"' && !in_single {
            if in_double && chars.get(i + 1) == Some(&'"') {
                i += 2;
                continue;
            }
            in_double = !in_double;
        }
        i += 1;
    }
    !in_single && !in_double
}

/// Lines opening one of these statements survive parent-removal even
/// when all their children are gone (keeps the `SELECT` stub of a CTE
/// whose WHERE collapsed).
pub fn is_protected_anchor(content: &str) -> bool {
    let first_word: String = content
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    matches!(
        first_word.to_ascii_uppercase().as_str(),
        "SELECT" | "INSERT" | "UPDATE" | "DELETE"
    )
}
