//! # Error Types Module
//!
//! Structured error types for the two seams the conversation core talks to:
//! the PDF/image operation library and the messaging adapter. Every variant
//! knows which localized message the user gets and how the conversation
//! should react to it.

use thiserror::Error;

/// How a failed step affects the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Ask for the same input again
    Reprompt,
    /// Reply with the error and end the conversation
    End,
}

/// Failures reported by the PDF/image operation boundary
#[derive(Debug, Error)]
pub enum PdfError {
    /// The file could not be parsed as a PDF document
    #[error("invalid PDF: {0}")]
    InvalidPdf(String),
    /// A plaintext document was expected
    #[error("PDF file is encrypted")]
    Encrypted,
    /// Decryption was requested on a plaintext document
    #[error("PDF file is not encrypted")]
    NotEncrypted,
    #[error("incorrect decryption password")]
    WrongPassword,
    #[error("unsupported encryption method: {0}")]
    UnsupportedEncryption(String),
    /// The page range is syntactically valid but selects no existing page
    #[error("page range selects no pages (document has {page_count} pages)")]
    PageRangeOutOfBounds { page_count: u32 },
    #[error("no images found in PDF")]
    NoImages,
    #[error("documents have no differences")]
    NoDifferences,
    #[error("unable to reach web page: {0}")]
    UrlUnreachable(String),
    /// An image could not be decoded or encoded
    #[error("image error: {0}")]
    Image(String),
    /// An external tool or rendering library failed
    #[error("{tool} failed: {detail}")]
    Tool { tool: String, detail: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    /// Localization key of the message shown to the user
    pub fn message_key(&self) -> &'static str {
        match self {
            PdfError::InvalidPdf(_) => "error-invalid-pdf",
            PdfError::Encrypted => "error-encrypted-pdf",
            PdfError::NotEncrypted => "error-not-encrypted",
            PdfError::WrongPassword => "error-wrong-password",
            PdfError::UnsupportedEncryption(_) => "error-unsupported-encryption",
            PdfError::PageRangeOutOfBounds { .. } => "error-range-out-of-bounds",
            PdfError::NoImages => "error-no-images",
            PdfError::NoDifferences => "compare-no-differences",
            PdfError::UrlUnreachable(_) => "error-url-unreachable",
            PdfError::Image(_) => "error-invalid-image",
            PdfError::Tool { .. } | PdfError::Io(_) => "error-processing-failed",
        }
    }

    /// Content errors can be fixed by the next message, everything else
    /// requires the user to send a new file
    pub fn recovery(&self) -> Recovery {
        match self {
            PdfError::WrongPassword | PdfError::PageRangeOutOfBounds { .. } => Recovery::Reprompt,
            _ => Recovery::End,
        }
    }

    /// Faults worth an error-level log entry, as opposed to user mistakes
    pub fn is_fault(&self) -> bool {
        matches!(self, PdfError::Tool { .. } | PdfError::Io(_))
    }

    pub fn tool(tool: &str, detail: impl Into<String>) -> Self {
        PdfError::Tool {
            tool: tool.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        PdfError::InvalidPdf(err.to_string())
    }
}

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::Image(err.to_string())
    }
}

impl From<zip::result::ZipError> for PdfError {
    fn from(err: zip::result::ZipError) -> Self {
        PdfError::tool("zip", err.to_string())
    }
}

/// Precondition failures detected by the messaging adapter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TelegramError {
    #[error("file of {size} bytes exceeds the {limit} bytes download limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("unsupported MIME type: {0}")]
    MimeType(String),
    #[error("message contains no image")]
    ImageNotFound,
    #[error("result of {size} bytes exceeds the {limit} bytes upload limit")]
    UploadTooLarge { size: u64, limit: u64 },
}

impl TelegramError {
    pub fn message_key(&self) -> &'static str {
        match self {
            TelegramError::FileTooLarge { .. } => "error-file-too-large",
            TelegramError::MimeType(_) => "error-unsupported-file",
            TelegramError::ImageNotFound => "error-image-not-found",
            TelegramError::UploadTooLarge { .. } => "error-result-too-large",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let err = PdfError::tool("qpdf", "exit status 2");
        assert_eq!(err.to_string(), "qpdf failed: exit status 2");

        let err = TelegramError::FileTooLarge { size: 30, limit: 20 };
        assert_eq!(
            err.to_string(),
            "file of 30 bytes exceeds the 20 bytes download limit"
        );
    }

    #[test]
    fn test_recovery_classification() {
        assert_eq!(PdfError::WrongPassword.recovery(), Recovery::Reprompt);
        assert_eq!(
            PdfError::PageRangeOutOfBounds { page_count: 2 }.recovery(),
            Recovery::Reprompt
        );
        assert_eq!(PdfError::InvalidPdf("bad".into()).recovery(), Recovery::End);
        assert_eq!(PdfError::Encrypted.recovery(), Recovery::End);
        assert_eq!(
            PdfError::UnsupportedEncryption("AES-512".into()).recovery(),
            Recovery::End
        );
    }

    #[test]
    fn test_faults_are_separated_from_user_errors() {
        assert!(PdfError::tool("pdfium", "crash").is_fault());
        assert!(!PdfError::WrongPassword.is_fault());
        assert!(!PdfError::NoImages.is_fault());
    }
}
