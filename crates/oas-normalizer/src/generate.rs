//! Thin wrapper around the external client code generator.
//!
//! Carries no invariants of the rewrite engine: it only assembles the
//! generator's CLI arguments and forwards its output to the terminal.

use std::path::Path;
use std::process::Command;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Binary name of the external code generator, resolved via `PATH`.
pub const DEFAULT_GENERATOR: &str = "openapi-generator";

/// Invoke the external code generator on a normalized document.
///
/// Runs `<generator> generate -l <language> -d <fixed_path> -o src
/// -c <client_name> -n <library_name> --ebc --cc` inside `target_dir`,
/// forwarding stdout and stderr.
///
/// # Errors
///
/// Returns [`Error::Io`] when the generator cannot be spawned or exits
/// non-zero, and [`Error::Cancelled`] when the token is cancelled before
/// the generator starts.
#[allow(clippy::too_many_arguments)]
pub fn generate_client(
    generator: &str,
    language: &str,
    fixed_path: &Path,
    client_name: &str,
    library_name: &str,
    target_dir: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tracing::debug!(%generator, %language, %client_name, "invoking external code generator");
    let status = Command::new(generator)
        .arg("generate")
        .arg("-l")
        .arg(language)
        .arg("-d")
        .arg(fixed_path)
        .arg("-o")
        .arg("src")
        .arg("-c")
        .arg(client_name)
        .arg("-n")
        .arg(library_name)
        .arg("--ebc")
        .arg("--cc")
        .current_dir(target_dir)
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Io(std::io::Error::other(format!(
            "{generator} exited with {status}"
        ))))
    }
}
