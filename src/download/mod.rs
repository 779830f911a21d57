//! Download orchestration.
//!
//! [`run`] drives one export through its phases:
//!
//! ```text
//! resolve folder ─▶ enumerate ─▶ reconcile with ledger ─▶ fetch/persist loop ─▶ finalize
//! ```
//!
//! Only folder resolution and enumeration can fail the run. Everything after
//! that is per-message and is reported, logged, and skipped.

pub mod outcome;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};
use crate::export::eml;
use crate::export::instructions::write_instructions;
use crate::export::OutputLayout;
use crate::folder;
use crate::ledger::ProgressLedger;
use crate::model::{JobState, MessageId};
use crate::transport::{MailTransport, Session};

pub use outcome::{ExportEvent, ExportSummary, FetchOutcome, PersistOutcome};

/// Default number of work-list positions between checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Parameters of one export.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub layout: OutputLayout,
    /// Folder name as requested by the operator; resolved against the server.
    pub folder: String,
    pub checkpoint_interval: usize,
    pub write_instructions: bool,
}

impl ExportJob {
    pub fn new(layout: OutputLayout, folder: impl Into<String>) -> Self {
        Self {
            layout,
            folder: folder.into(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            write_instructions: true,
        }
    }

    pub fn ledger(&self) -> ProgressLedger {
        ProgressLedger::for_root(self.layout.root())
    }
}

/// How to treat progress from an earlier run.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeChoice {
    /// Continue the given job, skipping everything it already persisted.
    Resume(JobState),
    /// Discard any previous progress and download everything.
    Fresh,
}

/// What a saved progress record means for the export about to start.
#[derive(Debug, Clone, PartialEq)]
pub enum PriorProgress {
    /// No readable record in the output root.
    Absent,
    /// The record belongs to this server and folder and can be resumed.
    Resumable(JobState),
    /// The record belongs to another server or folder. Starting this
    /// export replaces it.
    OtherJob(JobState),
}

/// Classify a saved record against the server and the folder the operator
/// asked for. With no folder given yet, any record for the server is
/// resumable.
///
/// The folder is matched on both the resolved name and the requested name,
/// so asking for `Sent` again finds a record saved as `INBOX.Sent`.
pub fn inspect_prior(
    prior: Option<JobState>,
    server: &str,
    folder: Option<&str>,
) -> PriorProgress {
    match prior {
        None => PriorProgress::Absent,
        Some(prior)
            if prior.is_for_server(server)
                && folder.is_none_or(|name| prior.is_for_folder(name)) =>
        {
            PriorProgress::Resumable(prior)
        }
        Some(prior) => PriorProgress::OtherJob(prior),
    }
}

/// Run an export on an authenticated session.
///
/// `cancel` is polled before each message; once set, the loop stops, a
/// checkpoint is written, and the summary is returned with `interrupted`.
pub fn run<T: MailTransport>(
    session: &mut Session<T>,
    job: &ExportJob,
    resume: ResumeChoice,
    cancel: &AtomicBool,
    observer: &mut dyn FnMut(ExportEvent),
) -> Result<ExportSummary> {
    let resolved = folder::resolve(session, &job.folder)?;
    observer(ExportEvent::FolderResolved {
        requested: job.folder.clone(),
        name: resolved.name.clone(),
    });

    let ids = session
        .search_all()
        .map_err(|source| ExportError::Enumerate {
            folder: resolved.name.clone(),
            source,
        })?;
    info!(folder = %resolved.name, count = ids.len(), "Enumerated messages");
    observer(ExportEvent::Enumerated { total: ids.len() });

    let root = job.layout.root().to_path_buf();
    if ids.is_empty() {
        info!(folder = %resolved.name, "Folder is empty, nothing to download");
        return Ok(ExportSummary {
            folder: resolved.name,
            total_emails: 0,
            successful_downloads: 0,
            processed_count: 0,
            skipped: Vec::new(),
            interrupted: false,
            completed: true,
            bytes_written: 0,
            output_root: root,
        });
    }

    job.layout.create_dirs()?;
    if job.write_instructions {
        if let Err(e) = write_instructions(&job.layout) {
            warn!(error = %e, "Could not write import instructions");
        }
    }

    let ledger = job.ledger();
    let mut state = JobState::new(session.server(), &resolved.name, &root);
    state.requested_folder = job.folder.clone();
    state.total_emails = ids.len();
    reconcile(&mut state, resume, &ids, &ledger);

    let work = state.remaining(&ids);
    let already_done = ids.len() - work.len();
    if already_done > 0 {
        info!(already_done, pending = work.len(), "Resuming previous export");
    }
    observer(ExportEvent::Reconciled {
        pending: work.len(),
        already_done,
    });

    let interval = job.checkpoint_interval.max(1);
    let emails_dir = job.layout.emails_dir();
    let attachments_dir = job.layout.attachments_dir();

    let mut successful = 0usize;
    let mut bytes_written = 0u64;
    let mut skipped: Vec<MessageId> = Vec::new();
    let mut interrupted = false;
    let mut dirty = false;

    for (index, &id) in work.iter().enumerate() {
        let position = index + 1;
        if cancel.load(Ordering::SeqCst) {
            info!(position, processed = state.processed_count, "Export interrupted");
            observer(ExportEvent::Interrupted { position });
            interrupted = true;
            break;
        }

        let fetched = match session.fetch(id) {
            Ok(raw) => FetchOutcome::Fetched(raw),
            Err(e) => FetchOutcome::FetchFailed(e),
        };

        let event = match fetched {
            FetchOutcome::Fetched(raw) => {
                let persisted = match eml::persist(id, &raw, &emails_dir, &attachments_dir) {
                    Ok(archived) => PersistOutcome::Persisted(archived),
                    Err(e) => PersistOutcome::PersistFailed(e),
                };
                match persisted {
                    PersistOutcome::Persisted(archived) => {
                        state.mark_completed(id);
                        successful += 1;
                        bytes_written += archived.size;
                        debug!(id = %id, path = %archived.path.display(), "Saved message");
                        ExportEvent::MessageSaved {
                            id,
                            position,
                            path: archived.path,
                            attachments: archived.attachments.len(),
                        }
                    }
                    PersistOutcome::PersistFailed(e) => {
                        warn!(id = %id, error = %e, "Skipping message");
                        skipped.push(id);
                        ExportEvent::MessageSkipped {
                            id,
                            position,
                            reason: e.to_string(),
                        }
                    }
                }
            }
            FetchOutcome::FetchFailed(e) => {
                warn!(id = %id, error = %e, "Skipping message");
                skipped.push(id);
                ExportEvent::MessageSkipped {
                    id,
                    position,
                    reason: e.to_string(),
                }
            }
        };
        observer(event);

        state.last_processed_id = Some(id);
        dirty = true;

        if position % interval == 0 || position == work.len() {
            checkpoint(&ledger, &mut state, position, observer);
            dirty = false;
        }
    }

    if dirty || interrupted {
        let position = state
            .last_processed_id
            .and_then(|last| work.iter().position(|&id| id == last))
            .map_or(0, |i| i + 1);
        checkpoint(&ledger, &mut state, position, observer);
    }

    let completed = state.is_finished();
    if completed {
        ledger.clear();
        info!(
            folder = %state.folder,
            total = state.total_emails,
            "Export complete"
        );
    }

    Ok(ExportSummary {
        folder: state.folder,
        total_emails: state.total_emails,
        successful_downloads: successful,
        processed_count: state.processed_count,
        skipped,
        interrupted,
        completed,
        bytes_written,
        output_root: root,
    })
}

/// Seed `state` from the operator's resume decision.
///
/// A prior record for another server or folder is never merged in.
fn reconcile(
    state: &mut JobState,
    resume: ResumeChoice,
    enumerated: &[MessageId],
    ledger: &ProgressLedger,
) {
    match resume {
        ResumeChoice::Resume(prior) if prior.matches(&state.server, &state.folder) => {
            state.adopt_progress(&prior, enumerated);
        }
        ResumeChoice::Resume(prior) => {
            warn!(
                recorded_server = %prior.server,
                recorded_folder = %prior.folder,
                "Progress record belongs to another job, starting fresh"
            );
            ledger.clear();
        }
        ResumeChoice::Fresh => ledger.clear(),
    }
}

fn checkpoint(
    ledger: &ProgressLedger,
    state: &mut JobState,
    position: usize,
    observer: &mut dyn FnMut(ExportEvent),
) {
    state.touch();
    match ledger.save(state) {
        Ok(()) => observer(ExportEvent::Checkpoint {
            position,
            processed: state.processed_count,
        }),
        Err(e) => {
            warn!(error = %e, "Could not save progress, continuing");
            observer(ExportEvent::CheckpointFailed {
                position,
                reason: e.to_string(),
            });
        }
    }
}
