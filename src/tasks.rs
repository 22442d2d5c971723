//! Task descriptors: the operations a conversation can end in.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dialogue::FileRef;
use crate::page_range::PageRange;

/// How the scale task sizes pages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleMethod {
    ByPercent,
    ToDimensions,
}

/// How the crop task trims pages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropMethod {
    ByPercent,
    ByMargin,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scale {
    /// Uniform factor in percent, `50.0` halves every page
    ByPercent(f64),
    /// Target page size in points
    ToDimensions { width: f64, height: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Crop {
    /// Keep this percentage of each page dimension, centred
    Percent(f64),
    /// Trim this many points from every edge
    Margin(f64),
}

/// Clockwise page rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(self) -> i64 {
        match self {
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }
}

/// How image results are delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Packaging {
    /// One photo message per image
    Photos,
    /// A single zip archive
    Zipped,
}

/// A fully parameterised operation, ready to run
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
    Decrypt { file: FileRef, password: String },
    Encrypt { file: FileRef, password: String },
    Rotate { file: FileRef, rotation: Rotation },
    Scale { file: FileRef, scale: Scale },
    Split { file: FileRef, range: PageRange },
    Rename { file: FileRef, new_name: String },
    Crop { file: FileRef, crop: Crop },
    Preview { file: FileRef },
    ExtractImages { file: FileRef, packaging: Packaging },
    ToImages { file: FileRef, packaging: Packaging },
    BeautifyPhotos { photos: Vec<FileRef> },
    ConvertPhotos { photos: Vec<FileRef> },
    Compare { first: FileRef, second: FileRef },
    Watermark { source: FileRef, watermark: FileRef },
}

impl Task {
    /// Short identifier for logs
    pub fn name(&self) -> &'static str {
        match self {
            Task::Decrypt { .. } => "decrypt",
            Task::Encrypt { .. } => "encrypt",
            Task::Rotate { .. } => "rotate",
            Task::Scale { .. } => "scale",
            Task::Split { .. } => "split",
            Task::Rename { .. } => "rename",
            Task::Crop { .. } => "crop",
            Task::Preview { .. } => "preview",
            Task::ExtractImages { .. } => "extract_images",
            Task::ToImages { .. } => "to_images",
            Task::BeautifyPhotos { .. } => "beautify",
            Task::ConvertPhotos { .. } => "convert",
            Task::Compare { .. } => "compare",
            Task::Watermark { .. } => "watermark",
        }
    }

    /// Message sent while the task runs
    pub fn progress_key(&self) -> &'static str {
        match self {
            Task::Decrypt { .. } => "progress-decrypt",
            Task::Encrypt { .. } => "progress-encrypt",
            Task::Rotate { .. } => "progress-rotate",
            Task::Scale { .. } => "progress-scale",
            Task::Split { .. } => "progress-split",
            Task::Rename { .. } => "progress-rename",
            Task::Crop { .. } => "progress-crop",
            Task::Preview { .. } => "progress-preview",
            Task::ExtractImages { .. } => "progress-extract-images",
            Task::ToImages { .. } => "progress-to-images",
            Task::BeautifyPhotos { .. } => "progress-beautify",
            Task::ConvertPhotos { .. } => "progress-convert",
            Task::Compare { .. } => "progress-compare",
            Task::Watermark { .. } => "progress-watermark",
        }
    }

    /// Remote files the task needs downloaded, in order
    pub fn inputs(&self) -> Vec<&FileRef> {
        match self {
            Task::Decrypt { file, .. }
            | Task::Encrypt { file, .. }
            | Task::Rotate { file, .. }
            | Task::Scale { file, .. }
            | Task::Split { file, .. }
            | Task::Rename { file, .. }
            | Task::Crop { file, .. }
            | Task::Preview { file }
            | Task::ExtractImages { file, .. }
            | Task::ToImages { file, .. } => vec![file],
            Task::BeautifyPhotos { photos } | Task::ConvertPhotos { photos } => {
                photos.iter().collect()
            }
            Task::Compare { first, second } => vec![first, second],
            Task::Watermark { source, watermark } => vec![source, watermark],
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `<stem>_<suffix>.<ext>`, the naming convention of generated files
pub fn suffixed_file_name(file: &FileRef, suffix: &str, extension: &str) -> String {
    format!("{}_{}.{}", file.stem(), suffix, extension)
}

pub const BEAUTIFIED_FILE_NAME: &str = "Beautified.pdf";
pub const CONVERTED_FILE_NAME: &str = "Converted.pdf";
pub const WATERMARKED_FILE_NAME: &str = "File_with_watermark.pdf";
pub const DIFFERENCES_FILE_NAME: &str = "Differences.png";

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileRef {
        FileRef::new("file-id", Some(name.to_string()))
    }

    #[test]
    fn test_suffixed_file_name() {
        assert_eq!(
            suffixed_file_name(&file("report.pdf"), "decrypted", "pdf"),
            "report_decrypted.pdf"
        );
        assert_eq!(
            suffixed_file_name(&file("report.pdf"), "split", "pdf"),
            "report_split.pdf"
        );
    }

    #[test]
    fn test_inputs_keep_order() {
        let task = Task::ConvertPhotos {
            photos: vec![file("a.jpg"), file("b.jpg"), file("c.jpg")],
        };
        let names: Vec<_> = task
            .inputs()
            .iter()
            .map(|f| f.file_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);

        let task = Task::Compare {
            first: file("a.pdf"),
            second: file("b.pdf"),
        };
        assert_eq!(task.inputs().len(), 2);
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(Rotation::Clockwise90.degrees(), 90);
        assert_eq!(Rotation::Clockwise270.degrees(), 270);
    }
}
