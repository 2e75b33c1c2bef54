mod commands;
mod settings;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mcfn_core::CompileError;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// MCFN-DSL to Minecraft datapack function transpiler.
#[derive(Parser)]
#[command(
    name = "mcfn",
    version,
    about = "MCFN-DSL to Minecraft datapack function transpiler"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log pipeline progress to stderr (overridden by MCFN_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every command that runs the pipeline.
#[derive(Args, Debug, Default)]
pub(crate) struct ConfigArgs {
    /// Datapack namespace
    #[arg(long = "ns")]
    pub namespace: Option<String>,
    /// Function directory inside the namespace (e.g. `function`)
    #[arg(long)]
    pub out_root: Option<String>,
    /// Name of the function that holds top-level statements
    #[arg(long)]
    pub entry: Option<String>,
    /// Settings file (default: mcfn.toml next to the input, if present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Transpile a .mcfn file and write its .mcfunction artifacts
    Build {
        /// Path to the .mcfn source file
        file: PathBuf,
        /// Directory the artifact tree is written under
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        settings: ConfigArgs,
    },

    /// Transpile a .mcfn file without writing anything
    Check {
        /// Path to the .mcfn source file
        file: PathBuf,
        #[command(flatten)]
        settings: ConfigArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            file,
            out,
            settings,
        } => {
            commands::cmd_build(&file, out.as_deref(), &settings, cli.output, cli.quiet);
        }
        Commands::Check { file, settings } => {
            commands::cmd_check(&file, &settings, cli.output, cli.quiet);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("MCFN_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            let v = serde_json::json!({ "error": msg });
            eprintln!("{}", v);
        }
    }
}

/// Print a pipeline error with its source position unchanged.
pub(crate) fn report_compile_error(
    file: &std::path::Path,
    err: &CompileError,
    output: OutputFormat,
) {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&err.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", err));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => match err.position {
            Some(p) => eprintln!(
                "{}:{}:{}: error: {}",
                file.display(),
                p.line,
                p.column,
                err.message
            ),
            None => eprintln!("{}: error: {}", file.display(), err.message),
        },
    }
}
