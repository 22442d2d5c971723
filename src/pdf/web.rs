//! Web page to PDF through an external HTML renderer (`wkhtmltopdf` by
//! default).

use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::PdfError;

/// Error text that means the page itself could not be fetched
const UNREACHABLE_MARKERS: &[&str] = &[
    "hostnotfounderror",
    "connectionrefusederror",
    "timeouterror",
    "failed to load",
    "network",
    "could not resolve",
];

pub async fn url_to_pdf(bin: &str, url: &str, output: &Path) -> Result<(), PdfError> {
    debug!(bin, url, "Converting web page");
    let result = Command::new(bin)
        .args(["--quiet", "--load-error-handling", "ignore", url])
        .arg(output)
        .output()
        .await
        .map_err(|e| PdfError::tool("html-to-pdf", format!("failed to start {bin}: {e}")))?;

    let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
    let produced = tokio::fs::metadata(output)
        .await
        .map(|meta| meta.len() > 0)
        .unwrap_or(false);

    if result.status.success() && produced {
        return Ok(());
    }

    warn!(url, status = ?result.status.code(), stderr = %stderr, "Web page conversion failed");
    if is_unreachable(&stderr) || !produced {
        Err(PdfError::UrlUnreachable(url.to_string()))
    } else {
        Err(PdfError::tool("html-to-pdf", stderr))
    }
}

fn is_unreachable(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    UNREACHABLE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// File name for a converted page: `<host>.pdf`
pub fn file_name_for(url: &str) -> String {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "webpage".to_string());
    format!("{}.pdf", crate::dialogue::sanitize_file_name(&host))
}
