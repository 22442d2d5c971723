//! Password protection through the `qpdf` command line tool.
//!
//! Exit codes: 0 success, 2 error, 3 success with warnings. With
//! `--requires-password`: 0 needs a password, 2 not encrypted, 3 encrypted
//! without a user password.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::Path;
use std::process::Output;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::PdfError;

const TOOL: &str = "qpdf";

async fn run<S: AsRef<OsStr>>(bin: &str, args: &[S]) -> Result<Output, PdfError> {
    debug!(bin, "Running qpdf");
    Command::new(bin)
        .args(args)
        .output()
        .await
        .map_err(|e| PdfError::tool(TOOL, format!("failed to start {bin}: {e}")))
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Whether the document is encrypted at all
async fn is_encrypted(bin: &str, input: &Path) -> Result<bool, PdfError> {
    let output = run(bin, &[OsStr::new("--requires-password"), input.as_os_str()]).await?;
    match output.status.code() {
        Some(0) | Some(3) => Ok(true),
        Some(2) if stderr(&output).is_empty() => Ok(false),
        _ => Err(classify(&stderr(&output))),
    }
}

/// Map qpdf's error text to what the user needs to hear
fn classify(stderr: &str) -> PdfError {
    let lower = stderr.to_lowercase();
    if lower.contains("invalid password") {
        PdfError::WrongPassword
    } else if lower.contains("unsupported") && lower.contains("encrypt") {
        PdfError::UnsupportedEncryption(stderr.to_string())
    } else if lower.contains("not a pdf")
        || lower.contains("can't find pdf header")
        || lower.contains("unable to find trailer")
        || lower.contains("file is damaged")
    {
        PdfError::InvalidPdf(stderr.to_string())
    } else {
        PdfError::tool(TOOL, stderr)
    }
}

fn check(output: &Output) -> Result<(), PdfError> {
    match output.status.code() {
        Some(0) => Ok(()),
        Some(3) => {
            warn!(stderr = %stderr(output), "qpdf finished with warnings");
            Ok(())
        }
        _ => Err(classify(&stderr(output))),
    }
}

pub async fn decrypt(bin: &str, input: &Path, password: &str, output: &Path) -> Result<(), PdfError> {
    if !is_encrypted(bin, input).await? {
        return Err(PdfError::NotEncrypted);
    }

    let secret = secret_file(input, &[password])?;
    let result = run(bin, &decrypt_args(secret.path(), input, output)).await?;
    check(&result)
}

/// AES-256 with the same user and owner password
pub async fn encrypt(bin: &str, input: &Path, password: &str, output: &Path) -> Result<(), PdfError> {
    if is_encrypted(bin, input).await? {
        return Err(PdfError::Encrypted);
    }

    let secret = secret_file(input, &["--encrypt", password, password, "256", "--"])?;
    let result = run(bin, &encrypt_args(secret.path(), input, output)).await?;
    check(&result)
}

/// Private file next to `input` holding one qpdf argument per line, so
/// passwords stay out of the process list. Removed when dropped.
fn secret_file(input: &Path, lines: &[&str]) -> Result<NamedTempFile, PdfError> {
    let dir = input
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::Builder::new().prefix(".qpdf-").tempfile_in(dir)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(file)
}

fn decrypt_args(password_file: &Path, input: &Path, output: &Path) -> Vec<OsString> {
    let mut password_arg = OsString::from("--password-file=");
    password_arg.push(password_file);
    vec![
        password_arg,
        "--decrypt".into(),
        input.into(),
        output.into(),
    ]
}

fn encrypt_args(arg_file: &Path, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args_arg = OsString::from("@");
    args_arg.push(arg_file);
    vec![args_arg, input.into(), output.into()]
}
