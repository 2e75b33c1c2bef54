use std::path::Path;
use std::process;

use crate::{report_error, ConfigArgs, OutputFormat};

pub(crate) fn cmd_build(
    file: &Path,
    out: Option<&Path>,
    args: &ConfigArgs,
    output: OutputFormat,
    quiet: bool,
) {
    let (settings, artifacts) = super::transpile_file(file, args, out, output, quiet);

    // The map is complete before anything touches the disk.
    for (rel, text) in &artifacts {
        let path = settings.out_dir.join(rel);
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                let msg = format!("error creating directory '{}': {}", dir.display(), e);
                report_error(&msg, output, quiet);
                process::exit(1);
            }
        }
        if let Err(e) = std::fs::write(&path, text) {
            let msg = format!("error writing '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
        tracing::debug!(path = %path.display(), "wrote artifact");
    }

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "out": settings.out_dir.display().to_string(),
                "namespace": settings.config.namespace,
                "artifacts": artifacts.keys().collect::<Vec<_>>(),
            });
            let json = serde_json::to_string_pretty(&summary)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!(
                "Wrote {} artifacts to {}",
                artifacts.len(),
                settings.out_dir.display()
            );
        }
    }
}
