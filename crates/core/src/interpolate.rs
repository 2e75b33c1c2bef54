//! Interpolation: `[objective:name]` placeholders in `v"..."` strings become
//! score components of a JSON text-component array; `$(NAME)` inserts a
//! constant's value at compile time.

use crate::ast::{ConstValue, Position, Text};
use crate::error::CompileError;
use crate::pass1_symbols::SymbolTable;
use serde::Serialize;

/// One element of a `tellraw` component array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TextComponent {
    Text { text: String },
    Score { score: ScoreComponent },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreComponent {
    pub name: String,
    pub objective: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment<'a> {
    Literal(&'a str),
    Placeholder { objective: &'a str, name: &'a str },
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `objective:name` with both halves non-empty.
fn split_placeholder(inner: &str) -> Option<(&str, &str)> {
    let (objective, name) = inner.split_once(':')?;
    let valid = |s: &str| !s.is_empty() && s.chars().all(is_name_char);
    (valid(objective) && valid(name)).then_some((objective, name))
}

/// Split text into literal runs and `[objective:name]` placeholders.
/// Brackets that do not hold a placeholder stay literal.
pub fn fragments(text: &str) -> Vec<Fragment<'_>> {
    let mut out = Vec::new();
    let mut literal_start = 0;
    let mut search = 0;
    while let Some(open) = text[search..].find('[').map(|i| i + search) {
        let Some(close) = text[open..].find(']').map(|i| i + open) else {
            break;
        };
        match split_placeholder(&text[open + 1..close]) {
            Some((objective, name)) => {
                if open > literal_start {
                    out.push(Fragment::Literal(&text[literal_start..open]));
                }
                out.push(Fragment::Placeholder { objective, name });
                literal_start = close + 1;
                search = close + 1;
            }
            None => search = open + 1,
        }
    }
    if literal_start < text.len() {
        out.push(Fragment::Literal(&text[literal_start..]));
    }
    out
}

/// Replace `$(NAME)` with the constant's value.
pub fn substitute_constants(
    text: &str,
    pos: Position,
    symbols: &SymbolTable,
) -> Result<String, CompileError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("$(") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(')') else {
            break;
        };
        let name = &after[..end];
        if name.is_empty() || !name.chars().all(is_name_char) {
            out.push_str(&rest[..start + 2]);
            rest = after;
            continue;
        }
        let value = symbols.constant(name).ok_or_else(|| {
            CompileError::plan(pos, format!("undeclared constant '{}' in $({})", name, name))
        })?;
        out.push_str(&rest[..start]);
        match value {
            ConstValue::Int(n) => out.push_str(&n.to_string()),
            ConstValue::Str(s) => out.push_str(s),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Check every placeholder of an interpolated string against the symbol
/// table. An unknown score is an error, never a literal fallback.
pub fn check_placeholders(text: &Text, symbols: &SymbolTable) -> Result<(), CompileError> {
    for frag in fragments(&text.value) {
        if let Fragment::Placeholder { objective, name } = frag {
            if !symbols.objectives.contains_key(objective) {
                return Err(CompileError::plan(
                    text.pos,
                    format!(
                        "interpolated reference [{}:{}] names undeclared objective '{}'",
                        objective, name, objective
                    ),
                ));
            }
            if !symbols
                .variables
                .contains_key(&(objective.to_owned(), name.to_owned()))
            {
                return Err(CompileError::plan(
                    text.pos,
                    format!(
                        "interpolated reference [{}:{}] names undeclared variable {}:{}",
                        objective, name, objective, name
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Build the component array for already-substituted text.
pub fn components(text: &str, interpolated: bool) -> Vec<TextComponent> {
    if !interpolated {
        return vec![TextComponent::Text {
            text: text.to_owned(),
        }];
    }
    fragments(text)
        .into_iter()
        .map(|f| match f {
            Fragment::Literal(s) => TextComponent::Text { text: s.to_owned() },
            Fragment::Placeholder { objective, name } => TextComponent::Score {
                score: ScoreComponent {
                    name: name.to_owned(),
                    objective: objective.to_owned(),
                },
            },
        })
        .collect()
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, CompileError> {
    serde_json::to_string(value)
        .map_err(|e| CompileError::codegen(format!("failed to encode text component: {}", e)))
}
