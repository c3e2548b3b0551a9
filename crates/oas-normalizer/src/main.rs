//! CLI for `oas-normalizer`.
//!
//! # Subcommands
//!
//! ```text
//! # Normalize a spec
//! oas-normalizer fix --input openapi.yaml --output openapi.fixed.json
//!
//! # Invoke the external client generator on a normalized spec
//! oas-normalizer generate-client \
//!   --spec openapi.fixed.json \
//!   --client MyClient \
//!   --library my.library \
//!   --target-dir clients/my-client
//! ```
//!
//! The pipeline itself has no runtime configuration: the pass catalogue and
//! its order are fixed at compile time. Cancellation is cooperative: Ctrl-C
//! cancels the token the library API takes, the run unwinds without writing
//! its output file, and the process exits 0.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// OpenAPI 3.x document normalizer for code generators.
#[derive(Parser)]
#[command(name = "oas-normalizer", version, about)]
enum Cli {
    /// Run the normalization pipeline on an OpenAPI document.
    Fix(FixArgs),

    /// Invoke the external client code generator on a normalized document.
    ///
    /// Thin wrapper: assembles the generator's CLI arguments and forwards
    /// its output. Requires the generator binary on `PATH`.
    GenerateClient(GenerateClientArgs),
}

#[derive(Parser)]
struct FixArgs {
    /// Path to the input OpenAPI document (YAML or JSON).
    #[arg(short, long)]
    input: PathBuf,

    /// Path for the normalized JSON output. Defaults to `<input>.fixed.json`.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct GenerateClientArgs {
    /// Path to the normalized OpenAPI document.
    #[arg(long)]
    spec: PathBuf,

    /// Client class name passed to the generator.
    #[arg(long)]
    client: String,

    /// Library / namespace name passed to the generator.
    #[arg(long)]
    library: String,

    /// Directory the generator runs in.
    #[arg(long, default_value = ".")]
    target_dir: PathBuf,

    /// Generator binary to invoke.
    #[arg(long, default_value = oas_normalizer::DEFAULT_GENERATOR)]
    generator: String,

    /// Target language for the generated client.
    #[arg(long, default_value = "csharp")]
    language: String,
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let result = match cli {
        Cli::Fix(args) => run_fix(&args, &cancel),
        Cli::GenerateClient(args) => run_generate_client(&args, &cancel),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => match error.downcast_ref::<oas_normalizer::Error>() {
            // Cancellation is not a failure: nothing was written.
            Some(oas_normalizer::Error::Cancelled) => ExitCode::SUCCESS,
            _ => {
                eprintln!("error: {error:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();
}

/// Cancel the token on the first Ctrl-C.
///
/// The pipeline is synchronous, so the signal listener runs on its own
/// thread with a minimal runtime. Passes poll the token at every outer
/// iteration; on cancellation the run unwinds and no output is written.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build();
        match runtime {
            Ok(runtime) => {
                if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                    eprintln!("Interrupted; finishing up without writing output");
                    cancel.cancel();
                }
            }
            Err(error) => {
                tracing::warn!(%error, "could not install Ctrl-C handler; runs are not interruptible");
            }
        }
    });
}

fn run_fix(args: &FixArgs, cancel: &CancellationToken) -> anyhow::Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));

    oas_normalizer::fix(&args.input, &output, cancel).with_context(|| {
        format!(
            "failed to normalize {} into {}",
            args.input.display(),
            output.display()
        )
    })?;

    eprintln!("Wrote normalized spec to {}", output.display());
    Ok(())
}

/// `openapi.yaml` → `openapi.fixed.json`.
fn default_output(input: &std::path::Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "openapi".to_string(), |stem| stem.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}.fixed.json"))
}

fn run_generate_client(args: &GenerateClientArgs, cancel: &CancellationToken) -> anyhow::Result<()> {
    oas_normalizer::generate_client(
        &args.generator,
        &args.language,
        &args.spec,
        &args.client,
        &args.library,
        &args.target_dir,
        cancel,
    )
    .with_context(|| format!("failed to generate client from {}", args.spec.display()))?;

    eprintln!("Generated client {} in {}", args.client, args.target_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_swaps_extension() {
        assert_eq!(
            default_output(std::path::Path::new("api/openapi.yaml")),
            PathBuf::from("api/openapi.fixed.json")
        );
        assert_eq!(
            default_output(std::path::Path::new("spec")),
            PathBuf::from("spec.fixed.json")
        );
    }
}
