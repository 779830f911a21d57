//! Centralized error types for imapdump.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::MessageId;

/// All errors produced by the imapdump library.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mail server rejected or dropped a protocol operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No variant of the requested folder could be selected.
    #[error(transparent)]
    Folder(#[from] FolderError),

    /// Listing the messages of the selected folder failed.
    #[error("Could not enumerate messages in '{folder}': {source}")]
    Enumerate {
        folder: String,
        source: TransportError,
    },

    /// A MIME decoding error.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// The progress record could not be encoded.
    #[error("Could not encode progress record: {0}")]
    Ledger(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, ExportError>`.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by a [`MailTransport`](crate::transport::MailTransport).
#[derive(Error, Debug)]
pub enum TransportError {
    /// TCP or TLS connection could not be established.
    #[error("Connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    /// The server rejected the credentials.
    #[error("Authentication failed for '{principal}': {reason}")]
    Auth { principal: String, reason: String },

    /// The server refused to select a folder.
    #[error("Could not select folder '{folder}': {reason}")]
    Select { folder: String, reason: String },

    /// The folder list could not be retrieved.
    #[error("Could not list folders: {0}")]
    List(String),

    /// The message search failed.
    #[error("Search failed: {0}")]
    Search(String),

    /// A single message could not be retrieved.
    #[error("Fetch of message {id} failed: {reason}")]
    Fetch { id: MessageId, reason: String },

    /// The connection dropped mid-session.
    #[error("Connection lost: {0}")]
    Disconnected(String),

    /// An operation was issued in the wrong session state.
    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

/// Folder resolution failures.
#[derive(Error, Debug)]
pub enum FolderError {
    /// Every candidate spelling was rejected by the server.
    #[error("Folder '{requested}' not found (tried: {})", tried.join(", "))]
    NotFound {
        requested: String,
        tried: Vec<String>,
    },

    /// The connection failed while trying candidates.
    #[error("Folder resolution aborted: {0}")]
    Transport(TransportError),
}

/// Failure to persist one message. Never fatal to the job.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The archive file could not be written.
    #[error("Could not write archive for message {id} to '{path}': {source}")]
    Archive {
        id: MessageId,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Allow `?` on `std::io::Error` inside functions returning `ExportError`
/// when no path context is available (rare; prefer `ExportError::io`).
impl From<std::io::Error> for ExportError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
