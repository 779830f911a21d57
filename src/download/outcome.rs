//! Per-step results, progress events, and the final summary of an export.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{PersistError, TransportError};
use crate::model::{ArchivedMessage, MessageId};

/// Result of fetching one message.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Vec<u8>),
    FetchFailed(TransportError),
}

/// Result of writing one fetched message to disk.
#[derive(Debug)]
pub enum PersistOutcome {
    Persisted(ArchivedMessage),
    PersistFailed(PersistError),
}

/// Progress notifications emitted while an export runs.
///
/// Positions are 1-based indices into the work list of the current run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    FolderResolved {
        requested: String,
        name: String,
    },
    Enumerated {
        total: usize,
    },
    /// The work list is known: `already_done` ids came from a previous run.
    Reconciled {
        pending: usize,
        already_done: usize,
    },
    MessageSaved {
        id: MessageId,
        position: usize,
        path: PathBuf,
        attachments: usize,
    },
    MessageSkipped {
        id: MessageId,
        position: usize,
        reason: String,
    },
    Checkpoint {
        position: usize,
        processed: usize,
    },
    CheckpointFailed {
        position: usize,
        reason: String,
    },
    /// Cancellation was observed before `position` was attempted.
    Interrupted {
        position: usize,
    },
}

/// What an export run achieved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    /// Folder name as selected on the server (empty if never resolved).
    pub folder: String,
    pub total_emails: usize,
    /// Messages persisted by this run.
    pub successful_downloads: usize,
    /// Messages persisted by this and all previous runs of the job.
    pub processed_count: usize,
    /// Ids that failed in this run, in the order they were attempted.
    pub skipped: Vec<MessageId>,
    pub interrupted: bool,
    /// Every enumerated message is persisted; the ledger has been removed.
    pub completed: bool,
    /// Size of the archives written by this run.
    pub bytes_written: u64,
    pub output_root: PathBuf,
}
