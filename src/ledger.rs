//! Progress ledger: the durable record that makes an export resumable.
//!
//! The record is pretty-printed JSON at `<output_root>/download_progress.json`:
//!
//! ```text
//! {
//!   "version": 1,
//!   "server": "mail.example.com",
//!   "folder": "INBOX",
//!   "requested_folder": "inbox",
//!   "total_emails": 1200,
//!   "last_processed_id": 340,
//!   "processed_count": 338,
//!   "completed_ids": [1, 2, ...],
//!   "timestamp": "2024-05-01T10:00:00Z",
//!   "output_root": "downloaded_emails"
//! }
//! ```
//!
//! A missing, truncated, unparseable, or inconsistent record is treated as
//! absent. The file has a single writer; running two exports against the same
//! output root at once is not supported.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};
use crate::export::OutputLayout;
use crate::model::job::{JobState, FORMAT_VERSION};

/// Reads and writes the progress record of one output root.
#[derive(Debug, Clone)]
pub struct ProgressLedger {
    path: PathBuf,
}

impl ProgressLedger {
    /// Ledger stored under `output_root`.
    pub fn for_root(output_root: impl AsRef<Path>) -> Self {
        Self {
            path: OutputLayout::new(output_root.as_ref()).progress_path(),
        }
    }

    /// Location of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record file is present (valid or not).
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist `state`, replacing any previous record.
    ///
    /// The record is written to a temporary sibling and renamed into place,
    /// so a crash mid-write leaves the previous checkpoint intact.
    pub fn save(&self, state: &JobState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| ExportError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            ExportError::io(&self.path, e)
        })?;

        debug!(
            path = %self.path.display(),
            processed = state.processed_count,
            total = state.total_emails,
            "Saved checkpoint"
        );
        Ok(())
    }

    /// Load the last checkpoint, if there is a usable one.
    pub fn load(&self) -> Option<JobState> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read progress file");
                return None;
            }
        };

        let state: JobState = match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt progress file");
                return None;
            }
        };

        if let Err(reason) = validate(&state) {
            warn!(path = %self.path.display(), reason = %reason, "Ignoring invalid progress file");
            return None;
        }

        Some(state)
    }

    /// Remove the record. A missing file is not an error.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Removed progress file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not remove progress file");
            }
        }
    }
}

/// Check that a decoded record matches the current format and its own invariants.
pub fn validate(state: &JobState) -> std::result::Result<(), String> {
    if state.version != FORMAT_VERSION {
        return Err(format!(
            "Incompatible version: expected {FORMAT_VERSION}, found {}",
            state.version
        ));
    }
    if state.completed_ids.len() != state.processed_count {
        return Err(format!(
            "processed_count {} does not match {} completed ids",
            state.processed_count,
            state.completed_ids.len()
        ));
    }
    if state.server.trim().is_empty() || state.folder.is_empty() {
        return Err("missing server or folder".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageId;

    fn sample(root: &Path) -> JobState {
        let mut state = JobState::new("mail.example.com", "INBOX", root);
        state.total_emails = 5;
        state.mark_completed(MessageId(1));
        state.mark_completed(MessageId(2));
        state.last_processed_id = Some(MessageId(2));
        state
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = ProgressLedger::for_root(tmp.path());
        let state = sample(tmp.path());
        ledger.save(&state).unwrap();

        assert_eq!(ledger.load(), Some(state));
        assert!(!tmp.path().join("download_progress.json.tmp").exists());
    }

    #[test]
    fn test_record_is_readable_json() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = ProgressLedger::for_root(tmp.path());
        ledger.save(&sample(tmp.path())).unwrap();

        let text = std::fs::read_to_string(ledger.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["completed_ids"], serde_json::json!([1, 2]));
        assert_eq!(value["processed_count"], 2);
    }

    #[test]
    fn test_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ProgressLedger::for_root(tmp.path()).load().is_none());
    }

    #[test]
    fn test_truncated_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = ProgressLedger::for_root(tmp.path());
        ledger.save(&sample(tmp.path())).unwrap();
        let text = std::fs::read_to_string(ledger.path()).unwrap();
        std::fs::write(ledger.path(), &text[..text.len() / 2]).unwrap();

        assert!(ledger.load().is_none());
    }

    #[test]
    fn test_wrong_version_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = ProgressLedger::for_root(tmp.path());
        let mut state = sample(tmp.path());
        state.version = FORMAT_VERSION + 1;
        ledger.save(&state).unwrap();

        assert!(ledger.load().is_none());
    }

    #[test]
    fn test_count_mismatch_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = ProgressLedger::for_root(tmp.path());
        let mut state = sample(tmp.path());
        state.processed_count = 7;
        ledger.save(&state).unwrap();

        assert!(ledger.load().is_none());
    }

    #[test]
    fn test_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = ProgressLedger::for_root(tmp.path());
        ledger.save(&sample(tmp.path())).unwrap();
        assert!(ledger.exists());

        ledger.clear();
        assert!(!ledger.exists());
        ledger.clear();
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let ledger = ProgressLedger::for_root(blocker.join("nested"));

        assert!(ledger.save(&sample(tmp.path())).is_err());
    }
}
