mod build;
mod check;

pub(crate) use build::cmd_build;
pub(crate) use check::cmd_check;

use std::path::Path;
use std::process;

use mcfn_core::ArtifactMap;

use crate::settings::{self, Settings};
use crate::{report_compile_error, report_error, ConfigArgs, OutputFormat};

/// Shared front half of `build` and `check`: extension check, settings,
/// source read and the full pipeline. Exits the process on any failure.
fn transpile_file(
    file: &Path,
    args: &ConfigArgs,
    out: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) -> (Settings, ArtifactMap) {
    if file.extension().and_then(|e| e.to_str()) != Some("mcfn") {
        let msg = format!("input '{}' must have the .mcfn extension", file.display());
        report_error(&msg, output, quiet);
        process::exit(1);
    }

    let settings = match settings::resolve(file, args, out) {
        Ok(s) => s,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let src = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    match mcfn_core::transpile(&src, &settings.config) {
        Ok(artifacts) => (settings, artifacts),
        Err(e) => {
            if output == OutputFormat::Json || !quiet {
                report_compile_error(file, &e, output);
            }
            process::exit(1);
        }
    }
}
