//! Conversation session kept per chat between message turns.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::tasks::{CropMethod, ScaleMethod};

lazy_static! {
    static ref INVALID_FILE_NAME_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();
}

/// The wait-state a conversation is in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitState {
    /// No conversation in progress
    #[default]
    Idle,
    WaitDocTask,
    WaitPhotoTask,
    WaitDecryptPassword,
    WaitEncryptPassword,
    WaitRotateDegree,
    WaitScaleType,
    WaitScalePercent,
    WaitScaleDimension,
    WaitSplitRange,
    WaitFileName,
    WaitCropType,
    WaitCropPercent,
    WaitCropOffset,
    WaitExtractPhotoType,
    WaitToPhotoType,
    WaitCompareFirst,
    WaitCompareSecond,
    WaitWatermarkSource,
    WaitWatermarkDoc,
}

impl WaitState {
    /// States that expect a document rather than text
    pub fn awaits_document(self) -> bool {
        matches!(
            self,
            WaitState::WaitCompareFirst
                | WaitState::WaitCompareSecond
                | WaitState::WaitWatermarkSource
                | WaitState::WaitWatermarkDoc
        )
    }
}

/// Platform file id plus the name the user sent it with
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub file_name: Option<String>,
}

impl FileRef {
    pub fn new(file_id: impl Into<String>, file_name: Option<String>) -> Self {
        Self {
            file_id: file_id.into(),
            file_name,
        }
    }

    /// File name without its extension, `file` when unknown
    pub fn stem(&self) -> String {
        let name = self.file_name.as_deref().unwrap_or("file");
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        };
        sanitize_file_name(stem)
    }
}

/// Parameters collected over several turns
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingParams {
    pub scale_method: Option<ScaleMethod>,
    pub crop_method: Option<CropMethod>,
    /// Target width, collected before the height
    pub width: Option<f64>,
    /// Wrong decryption passwords received so far
    pub password_attempts: u32,
}

impl PendingParams {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-chat conversation context
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub state: WaitState,
    /// File the current single-file task acts on
    pub file: Option<FileRef>,
    /// Files collected by multi-file flows, in arrival order
    pub files: Vec<FileRef>,
    pub params: PendingParams,
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Fresh session for a conversation entering `state`
    pub fn begin(state: WaitState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            started_at: Some(now),
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == WaitState::Idle
    }

    /// True when no file reference or parameter is held
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.files.is_empty() && self.params.is_empty()
    }
}

/// Type alias for the session dialogue
pub type SessionDialogue = Dialogue<Session, InMemStorage<Session>>;

/// Validates a new file name for the rename task, appending `.pdf`
pub fn validate_file_name(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if INVALID_FILE_NAME_CHARS.is_match(trimmed) {
        return Err("invalid_chars");
    }

    if trimmed.len() > 255 {
        return Err("too_long");
    }

    if trimmed.to_lowercase().ends_with(".pdf") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}.pdf"))
    }
}

/// Parses a strictly positive, finite number; a trailing `%` is allowed
pub fn parse_positive_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Some(value),
        _ => None,
    }
}

/// Replace characters that are unsafe in file names
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = INVALID_FILE_NAME_CHARS.replace_all(name, "_");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
