//! Line removal: modifier evaluation and bottom-up propagation.
//!
//! Phase A walks lines top-down, tokenizes each, and marks lines whose
//! removable/bindless parameters resolved negative (or whose fallback
//! chain is exhausted). Phase B then iterates in reverse order until a
//! fixed point: a parent whose children are all removed goes too, and
//! a childless, token-free line stranded between removed siblings
//! (closing parens, trailing separators) follows. Statement anchors
//! (`SELECT`/`INSERT`/`UPDATE`/`DELETE`) are exempt from propagation.

use crate::error::{format_message, ErrorOptions, MessageKey, TemplateError, TemplateResult};
use crate::parser::line::{is_protected_anchor, LineArena};
use crate::parser::tokenizer::tokenize;
use crate::value::{Params, Value};

/// Phase A: evaluate parameter modifiers per line, top-down.
pub fn evaluate_params(
    arena: &mut LineArena,
    params: &Params,
    errors: ErrorOptions,
) -> TemplateResult<()> {
    for id in arena.ids() {
        let line = arena.get(id);
        if line.is_blank() || line.removed {
            continue;
        }
        let content = line.content.clone();
        let line_number = line.line_number;

        for token in tokenize(&content) {
            let value = params.get(&token.name);
            let mut negative = value.map_or(true, Value::is_negative);

            if token.modifiers.negated {
                negative = !negative;
            }

            if token.modifiers.required && negative {
                return Err(TemplateError::RequiredParamMissing {
                    message: format_message(
                        MessageKey::RequiredParamMissing,
                        errors,
                        Some(line_number),
                        Some(token.name.as_str()),
                        Some(content.as_str()),
                    ),
                    line: line_number,
                    param: token.name.clone(),
                });
            }

            if let Some(names) = token.fallback_names() {
                let all_negative = names
                    .iter()
                    .all(|name| params.get(name).map_or(true, Value::is_negative));
                if all_negative {
                    arena.mark_removed(id);
                    break;
                }
                continue;
            }

            if (token.modifiers.removable || token.modifiers.bindless) && negative {
                // An IN clause bound to an empty list stays: the
                // rebuilder turns it into `IN (NULL)`.
                let empty_list = matches!(value, Some(Value::List(items)) if items.is_empty());
                if token.is_in_clause() && empty_list {
                    continue;
                }
                arena.mark_removed(id);
                break;
            }
        }
    }
    Ok(())
}

/// Phase B: propagate removal bottom-up until nothing changes.
pub fn propagate_removal(arena: &mut LineArena) {
    // Token presence is stable across iterations; compute it once.
    let has_tokens: Vec<bool> = arena
        .iter()
        .map(|line| !tokenize(&line.content).is_empty())
        .collect();
    let protected: Vec<bool> = arena
        .iter()
        .map(|line| is_protected_anchor(&line.content))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for id in arena.ids().rev() {
            let line = arena.get(id);
            if line.is_blank() || line.removed || protected[id] {
                continue;
            }

            if line.children.is_empty() {
                // Childless, token-free line whose siblings are all
                // removed: isolated `)` or trailing separator.
                if has_tokens[id] {
                    continue;
                }
                let Some(parent) = line.parent else {
                    continue;
                };
                let siblings = &arena.get(parent).children;
                let others: Vec<_> = siblings.iter().filter(|&&s| s != id).collect();
                if !others.is_empty() && others.iter().all(|&&s| arena.get(s).removed) {
                    arena.mark_removed(id);
                    changed = true;
                }
                continue;
            }

            if line.children.iter().all(|&c| arena.get(c).removed) {
                arena.mark_removed(id);
                changed = true;
            }
        }
    }
}
