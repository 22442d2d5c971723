//! # PDF and image operations
//!
//! The conversation core only sees the [`DocumentEngine`] trait. The
//! [`LocalEngine`] implementation edits documents with `lopdf`, renders
//! pages with `pdfium-render` and shells out to `qpdf` for encryption and
//! to an HTML to PDF converter for web pages.
//!
//! Every operation reads from and writes to paths inside the caller's
//! step workspace; nothing here manages file lifetimes.

pub mod crypto;
pub mod edit;
pub mod images;
pub mod render;
pub mod web;

use async_trait::async_trait;
use lopdf::Document;
use std::path::{Path, PathBuf};

use crate::config::BotConfig;
use crate::errors::PdfError;
use crate::page_range::PageRange;
use crate::tasks::{Crop, Rotation, Scale};

#[async_trait]
pub trait DocumentEngine: Send + Sync {
    async fn decrypt(&self, input: &Path, password: &str, output: &Path) -> Result<(), PdfError>;
    async fn encrypt(&self, input: &Path, password: &str, output: &Path) -> Result<(), PdfError>;
    async fn rotate(&self, input: &Path, rotation: Rotation, output: &Path) -> Result<(), PdfError>;
    async fn scale(&self, input: &Path, scale: Scale, output: &Path) -> Result<(), PdfError>;
    async fn split(&self, input: &Path, range: &PageRange, output: &Path) -> Result<(), PdfError>;
    async fn crop(&self, input: &Path, crop: Crop, output: &Path) -> Result<(), PdfError>;

    /// Render the first page to a PNG
    async fn preview(&self, input: &Path, output: &Path) -> Result<(), PdfError>;

    /// Embedded images, written into `out_dir`
    async fn extract_images(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PdfError>;

    /// One PNG per page, written into `out_dir`
    async fn to_images(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PdfError>;

    /// Clean up photographed pages and combine them into one PDF
    async fn beautify_images(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PdfError>;

    /// Combine images into one PDF, one page each, in order
    async fn images_to_pdf(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PdfError>;

    /// Visual diff of two documents as a PNG
    async fn compare(&self, first: &Path, second: &Path, output: &Path) -> Result<(), PdfError>;

    /// Overlay the first page of `watermark` onto every page of `source`
    async fn watermark(&self, source: &Path, watermark: &Path, output: &Path)
        -> Result<(), PdfError>;

    async fn url_to_pdf(&self, url: &str, output: &Path) -> Result<(), PdfError>;
}

/// Production engine backed by lopdf, pdfium and external tools
#[derive(Clone, Debug)]
pub struct LocalEngine {
    qpdf_bin: String,
    html_to_pdf_bin: String,
}

impl LocalEngine {
    pub fn new(qpdf_bin: impl Into<String>, html_to_pdf_bin: impl Into<String>) -> Self {
        Self {
            qpdf_bin: qpdf_bin.into(),
            html_to_pdf_bin: html_to_pdf_bin.into(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.qpdf_bin.clone(), config.html_to_pdf_bin.clone())
    }
}

/// Run CPU-bound document work off the async workers
async fn blocking<T, F>(work: F) -> Result<T, PdfError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PdfError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PdfError::tool("worker", format!("task panicked: {e}")))?
}

#[async_trait]
impl DocumentEngine for LocalEngine {
    async fn decrypt(&self, input: &Path, password: &str, output: &Path) -> Result<(), PdfError> {
        crypto::decrypt(&self.qpdf_bin, input, password, output).await
    }

    async fn encrypt(&self, input: &Path, password: &str, output: &Path) -> Result<(), PdfError> {
        crypto::encrypt(&self.qpdf_bin, input, password, output).await
    }

    async fn rotate(&self, input: &Path, rotation: Rotation, output: &Path) -> Result<(), PdfError> {
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        blocking(move || edit::rotate(&input, rotation, &output)).await
    }

    async fn scale(&self, input: &Path, scale: Scale, output: &Path) -> Result<(), PdfError> {
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        blocking(move || edit::scale(&input, scale, &output)).await
    }

    async fn split(&self, input: &Path, range: &PageRange, output: &Path) -> Result<(), PdfError> {
        let (input, output, range) = (input.to_path_buf(), output.to_path_buf(), range.clone());
        blocking(move || edit::split(&input, &range, &output)).await
    }

    async fn crop(&self, input: &Path, crop: Crop, output: &Path) -> Result<(), PdfError> {
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        blocking(move || edit::crop(&input, crop, &output)).await
    }

    async fn preview(&self, input: &Path, output: &Path) -> Result<(), PdfError> {
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        blocking(move || render::preview(&input, &output)).await
    }

    async fn extract_images(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PdfError> {
        let (input, out_dir) = (input.to_path_buf(), out_dir.to_path_buf());
        blocking(move || images::extract_images(&input, &out_dir)).await
    }

    async fn to_images(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PdfError> {
        let (input, out_dir) = (input.to_path_buf(), out_dir.to_path_buf());
        blocking(move || render::to_images(&input, &out_dir)).await
    }

    async fn beautify_images(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PdfError> {
        let (inputs, output) = (inputs.to_vec(), output.to_path_buf());
        blocking(move || images::beautify_to_pdf(&inputs, &output)).await
    }

    async fn images_to_pdf(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PdfError> {
        let (inputs, output) = (inputs.to_vec(), output.to_path_buf());
        blocking(move || images::images_to_pdf(&inputs, &output)).await
    }

    async fn compare(&self, first: &Path, second: &Path, output: &Path) -> Result<(), PdfError> {
        let (first, second, output) = (first.to_path_buf(), second.to_path_buf(), output.to_path_buf());
        blocking(move || render::compare(&first, &second, &output)).await
    }

    async fn watermark(
        &self,
        source: &Path,
        watermark: &Path,
        output: &Path,
    ) -> Result<(), PdfError> {
        let (source, watermark, output) =
            (source.to_path_buf(), watermark.to_path_buf(), output.to_path_buf());
        blocking(move || edit::watermark(&source, &watermark, &output)).await
    }

    async fn url_to_pdf(&self, url: &str, output: &Path) -> Result<(), PdfError> {
        web::url_to_pdf(&self.html_to_pdf_bin, url, output).await
    }
}

/// Load a plaintext document, telling encrypted files apart from broken ones
pub(crate) fn load_plain(path: &Path) -> Result<Document, PdfError> {
    match Document::load(path) {
        Ok(doc) if doc.trailer.get(b"Encrypt").is_ok() => Err(PdfError::Encrypted),
        Ok(doc) => Ok(doc),
        Err(err) => {
            let bytes = std::fs::read(path)?;
            if contains(&bytes, b"/Encrypt") {
                Err(PdfError::Encrypted)
            } else {
                Err(err.into())
            }
        }
    }
}

pub(crate) fn save(doc: &mut Document, path: &Path) -> Result<(), PdfError> {
    doc.compress();
    doc.save(path)?;
    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::{dictionary, Document, Object, Stream};
    use std::path::Path;

    /// A document with `pages` empty A4 pages
    pub fn write_pdf(path: &Path, pages: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for n in 0..pages {
            let content = format!("BT /F1 12 Tf 72 720 Td (page {}) Tj ET", n + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_plain_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(load_plain(&path), Err(PdfError::InvalidPdf(_))));
    }

    #[test]
    fn test_load_plain_accepts_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        test_support::write_pdf(&path, 2);
        let doc = load_plain(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
