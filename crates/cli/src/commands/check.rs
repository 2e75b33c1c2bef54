use std::path::Path;

use crate::{ConfigArgs, OutputFormat};

pub(crate) fn cmd_check(file: &Path, args: &ConfigArgs, output: OutputFormat, quiet: bool) {
    let (settings, artifacts) = super::transpile_file(file, args, None, output, quiet);

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "ok": true,
                "namespace": settings.config.namespace,
                "artifacts": artifacts.keys().collect::<Vec<_>>(),
            });
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            for path in artifacts.keys() {
                println!("  {}", path);
            }
            println!("{}: ok, {} artifacts", file.display(), artifacts.len());
        }
    }
}
