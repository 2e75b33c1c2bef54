//! Transpiler configuration.
//!
//! The CLI layers a `[build]` table from `mcfn.toml` and command-line flags
//! on top of [`TranspileConfig::default`]; the core only validates.

use crate::error::CompileError;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranspileConfig {
    /// Datapack namespace; artifact ids are `<namespace>:<resource>`.
    pub namespace: String,
    /// Name of the datapack function directory (`function`, or `functions`
    /// for legacy game versions).
    pub out_root: String,
    /// Name of the function holding top-level statements.
    pub entry: String,
    /// Target selector for `tellraw` and `title`.
    pub audience: String,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        TranspileConfig {
            namespace: "namespace".to_owned(),
            out_root: "function".to_owned(),
            entry: "main".to_owned(),
            audience: "@a".to_owned(),
        }
    }
}

/// Characters allowed in a resource path segment.
pub fn is_resource_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')
}

/// A function name usable as a single resource path segment.
pub fn is_function_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_resource_char)
}

/// A name a program may give its own functions. `-` is left out: it
/// separates a function from the number of a planned copy (`worker-1`).
pub fn is_declared_name(name: &str) -> bool {
    is_function_name(name) && !name.contains('-')
}

impl TranspileConfig {
    pub fn validate(&self) -> Result<(), CompileError> {
        if self.namespace.is_empty() || !self.namespace.chars().all(is_resource_char) {
            return Err(CompileError::config(format!(
                "invalid namespace '{}': expected lowercase letters, digits, '_', '.' or '-'",
                self.namespace
            )));
        }
        let root_ok = !self.out_root.is_empty()
            && !self.out_root.starts_with('/')
            && self
                .out_root
                .split('/')
                .all(|seg| !seg.is_empty() && seg != ".." && seg.chars().all(is_resource_char));
        if !root_ok {
            return Err(CompileError::config(format!(
                "invalid output root '{}': expected a relative resource path",
                self.out_root
            )));
        }
        if !is_declared_name(&self.entry) {
            return Err(CompileError::config(format!(
                "invalid entry function name '{}': expected lowercase letters, digits, '_' or '.'",
                self.entry
            )));
        }
        if self.audience.trim().is_empty() || self.audience.contains('\n') {
            return Err(CompileError::config("audience selector must be a single non-empty line"));
        }
        Ok(())
    }

    /// Artifact path for a resource, relative to the datapack `data/` directory.
    pub fn artifact_path(&self, resource: &str) -> String {
        format!("{}/{}/{}.mcfunction", self.namespace, self.out_root, resource)
    }

    /// Path of a `minecraft` function tag such as `load`, relative to the
    /// datapack `data/` directory. The tag registry shares its directory
    /// name with `out_root` (`function` or legacy `functions`).
    pub fn tag_path(&self, tag: &str) -> String {
        let registry = self.out_root.split('/').next().unwrap_or(&self.out_root);
        format!("minecraft/tags/{}/{}.json", registry, tag)
    }

    /// Function id the game uses to invoke a resource.
    pub fn function_id(&self, resource: &str) -> String {
        format!("{}:{}", self.namespace, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn defaults_are_valid() {
        let cfg = TranspileConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.artifact_path("main"),
            "namespace/function/main.mcfunction"
        );
        assert_eq!(cfg.function_id("__mcfn/dispatch"), "namespace:__mcfn/dispatch");
        assert_eq!(cfg.tag_path("load"), "minecraft/tags/function/load.json");
    }

    #[test]
    fn legacy_out_root_moves_the_tags_too() {
        let cfg = TranspileConfig {
            out_root: "functions".into(),
            ..Default::default()
        };
        assert_eq!(cfg.tag_path("tick"), "minecraft/tags/functions/tick.json");
    }

    #[test]
    fn rejects_uppercase_namespace() {
        let cfg = TranspileConfig {
            namespace: "MyPack".into(),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.stage, Stage::Config);
        assert!(err.message.contains("MyPack"));
    }

    #[test]
    fn rejects_escaping_out_root() {
        for root in ["", "/abs", "../up", "a//b"] {
            let cfg = TranspileConfig {
                out_root: root.into(),
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "accepted out_root {:?}", root);
        }
        let legacy = TranspileConfig {
            out_root: "functions".into(),
            ..Default::default()
        };
        assert!(legacy.validate().is_ok());
    }

    #[test]
    fn rejects_bad_entry_name() {
        let cfg = TranspileConfig {
            entry: "Main".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn entry_name_cannot_look_like_a_planned_copy() {
        let cfg = TranspileConfig {
            entry: "worker-1".into(),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.stage, Stage::Config);
        assert!(err.message.contains("'worker-1'"), "{}", err.message);
        assert!(is_function_name("worker-1"));
        assert!(!is_declared_name("worker-1"));
        assert!(is_declared_name("start.v2"));
    }
}
