//! Zip packaging for multi-file results.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::errors::PdfError;

/// Store `files` flat in a new zip archive at `output`, in order
pub fn zip_files(files: &[PathBuf], output: &Path) -> Result<(), PdfError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(output)?));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (index, path) in files.iter().enumerate() {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("file_{}", index + 1));

        zip.start_file(name, options)?;
        zip.write_all(&std::fs::read(path)?)?;
    }

    zip.finish()?.flush()?;
    Ok(())
}
