//! Attachment records.
//!
//! Only metadata is kept after the payload has been written to disk.

use std::path::PathBuf;

/// An attachment that was materialized next to an archived message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    /// Final filename after sanitizing and collision suffixing.
    pub filename: String,

    /// Per-message directory (`attachments/email_<id>`).
    pub directory: PathBuf,

    /// Full path of the written file.
    pub path: PathBuf,

    /// Decoded size in bytes.
    pub size: u64,
}
