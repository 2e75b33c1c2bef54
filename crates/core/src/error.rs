use crate::ast::Position;
use serde::Serialize;
use std::fmt;

/// The pipeline stage that rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Config,
    Lex,
    Parse,
    Plan,
    Codegen,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Plan => "plan",
            Stage::Codegen => "codegen",
        };
        f.write_str(name)
    }
}

/// A transpilation error. Every error is fatal to the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{} error{}: {}", .stage, located(.position), .message)]
pub struct CompileError {
    pub stage: Stage,
    pub position: Option<Position>,
    pub message: String,
}

fn located(position: &Option<Position>) -> String {
    match position {
        Some(p) => format!(" at {}", p),
        None => String::new(),
    }
}

impl CompileError {
    pub fn new(stage: Stage, position: Option<Position>, message: impl Into<String>) -> Self {
        CompileError {
            stage,
            position,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        CompileError::new(Stage::Config, None, message)
    }

    pub fn lex(position: Position, message: impl Into<String>) -> Self {
        CompileError::new(Stage::Lex, Some(position), message)
    }

    pub fn parse(position: Position, message: impl Into<String>) -> Self {
        CompileError::new(Stage::Parse, Some(position), message)
    }

    pub fn plan(position: Position, message: impl Into<String>) -> Self {
        CompileError::new(Stage::Plan, Some(position), message)
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        CompileError::new(Stage::Codegen, None, message)
    }

    pub fn line(&self) -> Option<u32> {
        self.position.map(|p| p.line)
    }

    pub fn column(&self) -> Option<u32> {
        self.position.map(|p| p.column)
    }

    /// Serialize to JSON. Always includes all fields (null for a missing position).
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "column":  self.column(),
            "line":    self.line(),
            "message": self.message,
            "stage":   self.stage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage_and_position() {
        let err = CompileError::parse(Position::new(3, 7), "expected ')'");
        assert_eq!(err.to_string(), "parse error at 3:7: expected ')'");
    }

    #[test]
    fn display_without_position() {
        let err = CompileError::config("namespace must not be empty");
        assert_eq!(err.to_string(), "config error: namespace must not be empty");
    }

    #[test]
    fn json_form_has_every_field() {
        let err = CompileError::codegen("duplicate artifact");
        let v = err.to_json_value();
        assert_eq!(v["stage"], "codegen");
        assert!(v["line"].is_null());
        assert!(v["column"].is_null());
        assert_eq!(v["message"], "duplicate artifact");

        let err = CompileError::lex(Position::new(1, 2), "bad");
        let v = err.to_json_value();
        assert_eq!(v["line"], 1);
        assert_eq!(v["column"], 2);
        assert_eq!(v["stage"], "lex");
    }
}
