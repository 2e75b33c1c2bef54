//! Settings layering: defaults, then the `[build]` table of `mcfn.toml`,
//! then command-line flags.

use std::path::{Path, PathBuf};

use mcfn_core::TranspileConfig;
use serde::Deserialize;

use crate::ConfigArgs;

pub(crate) const SETTINGS_FILE: &str = "mcfn.toml";
const DEFAULT_OUT_DIR: &str = "out";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    build: toml::Table,
}

/// The `[build]` table: every [`TranspileConfig`] field plus `out`.
#[derive(Debug, Default)]
struct BuildTable {
    config: TranspileConfig,
    /// Relative paths resolve against the settings file's directory.
    out: Option<PathBuf>,
}

/// Fully layered settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub config: TranspileConfig,
    pub out_dir: PathBuf,
}

fn read_table(path: &Path) -> Result<BuildTable, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading settings '{}': {}", path.display(), e))?;
    let parse_err =
        |e: toml::de::Error| format!("error parsing settings '{}': {}", path.display(), e);
    let file: SettingsFile = toml::from_str(&text).map_err(parse_err)?;
    let mut build = file.build;
    let out = build
        .remove("out")
        .map(|v| v.try_into::<PathBuf>())
        .transpose()
        .map_err(parse_err)?;
    let config: TranspileConfig = toml::Value::Table(build).try_into().map_err(parse_err)?;
    Ok(BuildTable { config, out })
}

/// The explicit `--config` file, or `mcfn.toml` beside the input.
fn settings_path(input: &Path, args: &ConfigArgs) -> Option<PathBuf> {
    if let Some(p) = &args.config {
        return Some(p.clone());
    }
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let candidate = dir.join(SETTINGS_FILE);
    candidate.is_file().then_some(candidate)
}

pub(crate) fn resolve(
    input: &Path,
    args: &ConfigArgs,
    out: Option<&Path>,
) -> Result<Settings, String> {
    let mut config = TranspileConfig::default();
    let mut out_dir = PathBuf::from(DEFAULT_OUT_DIR);

    if let Some(path) = settings_path(input, args) {
        tracing::debug!(settings = %path.display(), "loading settings");
        let table = read_table(&path)?;
        config = table.config;
        if let Some(v) = table.out {
            out_dir = match path.parent() {
                Some(base) if v.is_relative() => base.join(v),
                _ => v,
            };
        }
    }

    if let Some(v) = &args.namespace {
        config.namespace = v.clone();
    }
    if let Some(v) = &args.out_root {
        config.out_root = v.clone();
    }
    if let Some(v) = &args.entry {
        config.entry = v.clone();
    }
    if let Some(v) = out {
        out_dir = v.to_path_buf();
    }

    Ok(Settings { config, out_dir })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_settings_file() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("game.mcfn");
        let s = resolve(&input, &ConfigArgs::default(), None).unwrap();
        assert_eq!(s.config, TranspileConfig::default());
        assert_eq!(s.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn file_then_flags() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(SETTINGS_FILE),
            "[build]\nnamespace = \"arena\"\nentry = \"start\"\naudience = \"@p\"\nout = \"pack\"\n",
        )
        .unwrap();
        let input = tmp.path().join("game.mcfn");
        let args = ConfigArgs {
            entry: Some("boot".into()),
            ..ConfigArgs::default()
        };
        let s = resolve(&input, &args, None).unwrap();
        assert_eq!(s.config.namespace, "arena");
        assert_eq!(s.config.entry, "boot");
        assert_eq!(s.config.audience, "@p");
        assert_eq!(s.config.out_root, "function");
        assert_eq!(s.out_dir, tmp.path().join("pack"));

        let s = resolve(&input, &args, Some(Path::new("elsewhere"))).unwrap();
        assert_eq!(s.out_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[build]\nnamspace = \"x\"\n").unwrap();
        let args = ConfigArgs {
            config: Some(path),
            ..ConfigArgs::default()
        };
        let err = resolve(&tmp.path().join("a.mcfn"), &args, None).unwrap_err();
        assert!(err.contains("error parsing settings"), "{}", err);
        assert!(err.contains("namspace"), "{}", err);
    }

    #[test]
    fn build_table_keeps_defaults_for_missing_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(SETTINGS_FILE),
            "[build]\nout_root = \"functions\"\n",
        )
        .unwrap();
        let s = resolve(&tmp.path().join("game.mcfn"), &ConfigArgs::default(), None).unwrap();
        assert_eq!(
            s.config,
            TranspileConfig {
                out_root: "functions".into(),
                ..TranspileConfig::default()
            }
        );
        assert_eq!(s.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn wrongly_typed_key_is_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(SETTINGS_FILE),
            "[build]\nentry = 3\nout = \"pack\"\n",
        )
        .unwrap();
        let err = resolve(&tmp.path().join("game.mcfn"), &ConfigArgs::default(), None).unwrap_err();
        assert!(err.contains("error parsing settings"), "{}", err);
    }

    #[test]
    fn missing_explicit_settings_file() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("definitely/not/here.toml")),
            ..ConfigArgs::default()
        };
        let err = resolve(Path::new("a.mcfn"), &args, None).unwrap_err();
        assert!(err.contains("error reading settings"), "{}", err);
    }
}
