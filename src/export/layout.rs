//! On-disk layout of an export.
//!
//! ```text
//! <root>/
//! ├── emails/<id:06>_<subject>.eml
//! ├── attachments/email_<id>/<name>
//! ├── IMPORT_INSTRUCTIONS.txt
//! └── download_progress.json
//! ```

use std::path::{Path, PathBuf};

use crate::error::{ExportError, Result};
use crate::model::MessageId;

/// Name of the progress record inside the output root.
pub const PROGRESS_FILE: &str = "download_progress.json";

/// Name of the import instructions inside the output root.
pub const INSTRUCTIONS_FILE: &str = "IMPORT_INSTRUCTIONS.txt";

/// Paths of one export rooted at a single directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the `.eml` archives.
    pub fn emails_dir(&self) -> PathBuf {
        self.root.join("emails")
    }

    /// Directory holding one subdirectory per message with attachments.
    pub fn attachments_dir(&self) -> PathBuf {
        self.root.join("attachments")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root.join(PROGRESS_FILE)
    }

    pub fn instructions_path(&self) -> PathBuf {
        self.root.join(INSTRUCTIONS_FILE)
    }

    /// Create the root, `emails/` and `attachments/` directories.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.emails_dir(), self.attachments_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| ExportError::io(&dir, e))?;
        }
        Ok(())
    }
}

/// `<attachment_root>/email_<id>`.
pub fn message_attachment_dir(attachment_root: &Path, id: MessageId) -> PathBuf {
    attachment_root.join(format!("email_{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/data/export");
        assert_eq!(layout.emails_dir(), Path::new("/data/export/emails"));
        assert_eq!(
            message_attachment_dir(&layout.attachments_dir(), MessageId(7)),
            Path::new("/data/export/attachments/email_7")
        );
        assert_eq!(
            layout.progress_path(),
            Path::new("/data/export/download_progress.json")
        );
    }

    #[test]
    fn test_create_dirs_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(tmp.path().join("out"));
        layout.create_dirs().unwrap();
        layout.create_dirs().unwrap();
        assert!(layout.emails_dir().is_dir());
        assert!(layout.attachments_dir().is_dir());
    }
}
