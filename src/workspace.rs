//! Temporary files for one processing step.
//!
//! Every input download and every generated output of a task lives in a
//! [`StepWorkspace`]. The directory and everything in it is removed when
//! the workspace is dropped, on success, failure and panic alike.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, warn};

use crate::dialogue::sanitize_file_name;

pub struct StepWorkspace {
    dir: TempDir,
    counter: usize,
}

impl StepWorkspace {
    /// Create a workspace under `root`, or the system temp dir when `None`
    pub fn new(root: Option<&Path>) -> std::io::Result<Self> {
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix("pdf-bot-").tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix("pdf-bot-").tempdir()?,
        };
        debug!(path = %dir.path().display(), "Created step workspace");
        Ok(Self { dir, counter: 0 })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Fresh path for a downloaded input, keeping the extension of `name`
    pub fn input_path(&mut self, name: Option<&str>, default_extension: &str) -> PathBuf {
        self.counter += 1;
        let extension = name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(default_extension)
            .to_lowercase();
        self.dir
            .path()
            .join(format!("input_{}.{}", self.counter, extension))
    }

    /// Path for a generated file under the exact name the user receives
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        let out_dir = self.dir.path().join("out");
        if let Err(e) = std::fs::create_dir_all(&out_dir) {
            warn!(error = %e, "Failed to create output directory");
        }
        out_dir.join(sanitize_file_name(file_name))
    }

    /// Sub-directory for multi-file outputs
    pub fn scratch_dir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.dir.path().join(sanitize_file_name(name));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Remove everything now, reporting failures instead of ignoring them
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            error!(path = %path.display(), error = %e, "Failed to remove step workspace");
        } else {
            debug!(path = %path.display(), "Removed step workspace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let mut workspace = StepWorkspace::new(Some(root.path())).unwrap();
            let input = workspace.input_path(Some("scan.JPG"), "pdf");
            std::fs::write(&input, b"data").unwrap();
            assert!(input.ends_with("input_1.jpg"));
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_close_removes_outputs() {
        let workspace = StepWorkspace::new(None).unwrap();
        let out = workspace.output_path("report_split.pdf");
        std::fs::write(&out, b"%PDF").unwrap();
        let path = workspace.path().to_path_buf();
        workspace.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_input_paths_are_unique() {
        let mut workspace = StepWorkspace::new(None).unwrap();
        let a = workspace.input_path(None, "pdf");
        let b = workspace.input_path(Some("weird.name.with.ext!!"), "pdf");
        assert_ne!(a, b);
        assert_eq!(b.extension().unwrap(), "pdf");
    }
}
