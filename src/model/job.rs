//! Export job state: the unit of resumability.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::message::MessageId;

/// Current progress record format version.
pub const FORMAT_VERSION: u32 = 1;

/// Durable progress of one export job for a (server, folder) pair.
///
/// `completed_ids.len() == processed_count` holds at all times; the ledger
/// rejects records where it does not.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JobState {
    /// Record format version (must equal [`FORMAT_VERSION`]).
    pub version: u32,

    /// Server address the job downloads from.
    pub server: String,

    /// Folder name as actually selected on the server.
    pub folder: String,

    /// Folder name the operator asked for, before resolution.
    #[serde(default)]
    pub requested_folder: String,

    /// Number of messages found at enumeration time.
    pub total_emails: usize,

    /// Last message the run attempted, successful or not.
    pub last_processed_id: Option<MessageId>,

    /// Number of messages persisted across all runs of this job.
    pub processed_count: usize,

    /// Every message persisted so far, in ascending order.
    pub completed_ids: BTreeSet<MessageId>,

    /// When the record was last checkpointed.
    pub timestamp: DateTime<Utc>,

    /// Root directory of the export.
    pub output_root: PathBuf,
}

impl JobState {
    /// Create an empty state for a fresh job.
    pub fn new(
        server: impl Into<String>,
        folder: impl Into<String>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        let folder = folder.into();
        Self {
            version: FORMAT_VERSION,
            server: server.into(),
            requested_folder: folder.clone(),
            folder,
            total_emails: 0,
            last_processed_id: None,
            processed_count: 0,
            completed_ids: BTreeSet::new(),
            timestamp: Utc::now(),
            output_root: output_root.into(),
        }
    }

    /// Record a successfully persisted message.
    ///
    /// Returns `false` (and changes nothing) if the id was already recorded.
    pub fn mark_completed(&mut self, id: MessageId) -> bool {
        if self.completed_ids.insert(id) {
            self.processed_count += 1;
            true
        } else {
            false
        }
    }

    /// Whether `id` has already been persisted.
    pub fn is_completed(&self, id: MessageId) -> bool {
        self.completed_ids.contains(&id)
    }

    /// Whether every enumerated message has been persisted.
    pub fn is_finished(&self) -> bool {
        self.processed_count >= self.total_emails
    }

    /// Take over the completed set of a previous run of the same job.
    ///
    /// Only ids still present in `enumerated` are kept, so a message that
    /// left the folder cannot count towards finishing the job.
    pub fn adopt_progress(&mut self, prior: &JobState, enumerated: &[MessageId]) {
        self.completed_ids = enumerated
            .iter()
            .copied()
            .filter(|id| prior.is_completed(*id))
            .collect();
        self.processed_count = self.completed_ids.len();
        self.last_processed_id = prior.last_processed_id;
        if !prior.requested_folder.is_empty() {
            self.requested_folder = prior.requested_folder.clone();
        }
    }

    /// Filter an enumeration down to the ids still to download,
    /// preserving enumeration order.
    pub fn remaining(&self, enumerated: &[MessageId]) -> Vec<MessageId> {
        enumerated
            .iter()
            .copied()
            .filter(|&id| !self.is_completed(id))
            .collect()
    }

    /// Whether this record was written for the given server.
    pub fn is_for_server(&self, server: &str) -> bool {
        self.server.eq_ignore_ascii_case(server.trim())
    }

    /// Whether `name` designates this record's folder, either as the
    /// resolved name or as the name originally asked for.
    pub fn is_for_folder(&self, name: &str) -> bool {
        self.folder == name
            || (!self.requested_folder.is_empty() && self.requested_folder == name)
    }

    /// Whether this record belongs to the given server and folder.
    pub fn matches(&self, server: &str, folder: &str) -> bool {
        self.is_for_server(server) && self.folder == folder
    }

    /// Refresh the checkpoint timestamp.
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<MessageId> {
        raw.iter().copied().map(MessageId).collect()
    }

    #[test]
    fn test_mark_completed_keeps_count_in_sync() {
        let mut state = JobState::new("mail.example.com", "INBOX", "/tmp/out");
        assert!(state.mark_completed(MessageId(3)));
        assert!(state.mark_completed(MessageId(1)));
        assert!(!state.mark_completed(MessageId(3)));
        assert_eq!(state.processed_count, 2);
        assert_eq!(state.completed_ids.len(), state.processed_count);
    }

    #[test]
    fn test_remaining_preserves_enumeration_order() {
        let mut state = JobState::new("mail.example.com", "INBOX", "/tmp/out");
        state.mark_completed(MessageId(2));
        state.mark_completed(MessageId(5));
        let enumerated = ids(&[9, 5, 1, 2, 7]);
        assert_eq!(state.remaining(&enumerated), ids(&[9, 1, 7]));
    }

    #[test]
    fn test_adopt_progress() {
        let mut prior = JobState::new("mail.example.com", "INBOX", "/tmp/out");
        prior.mark_completed(MessageId(1));
        prior.mark_completed(MessageId(2));
        prior.last_processed_id = Some(MessageId(2));

        let mut state = JobState::new("mail.example.com", "INBOX", "/tmp/out");
        state.adopt_progress(&prior, &ids(&[1, 2, 3]));
        assert_eq!(state.processed_count, 2);
        assert!(state.is_completed(MessageId(1)));
        assert_eq!(state.last_processed_id, Some(MessageId(2)));
    }

    #[test]
    fn test_adopt_progress_drops_ids_no_longer_enumerated() {
        let mut prior = JobState::new("mail.example.com", "INBOX", "/tmp/out");
        for id in [1, 2, 3, 5] {
            prior.mark_completed(MessageId(id));
        }

        let mut state = JobState::new("mail.example.com", "INBOX", "/tmp/out");
        state.total_emails = 4;
        state.adopt_progress(&prior, &ids(&[1, 2, 3, 4]));
        assert_eq!(state.processed_count, 3);
        assert_eq!(state.completed_ids.len(), state.processed_count);
        assert!(!state.is_completed(MessageId(5)));
        assert!(!state.is_finished());
    }

    #[test]
    fn test_matches_server_case_insensitive() {
        let state = JobState::new("Mail.Example.com", "INBOX.Sent", "/tmp/out");
        assert!(state.matches("mail.example.com", "INBOX.Sent"));
        assert!(!state.matches("mail.example.com", "INBOX"));
        assert!(!state.is_for_server("other.example.com"));
    }

    #[test]
    fn test_is_for_folder_accepts_requested_name() {
        let mut state = JobState::new("mail.example.com", "INBOX.Sent", "/tmp/out");
        state.requested_folder = "Sent".into();
        assert!(state.is_for_folder("Sent"));
        assert!(state.is_for_folder("INBOX.Sent"));
        assert!(!state.is_for_folder("Drafts"));
    }

    #[test]
    fn test_is_finished() {
        let mut state = JobState::new("s", "INBOX", "/tmp/out");
        state.total_emails = 1;
        assert!(!state.is_finished());
        state.mark_completed(MessageId(1));
        assert!(state.is_finished());
    }
}
