//! Persist fetched messages as individual `.eml` files.
//!
//! The raw bytes are written untouched so that mail clients importing the
//! `.eml` see exactly what the server delivered. Attachments are extracted
//! next to the archive as a convenience.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PersistError;
use crate::model::{ArchivedMessage, MessageId};
use crate::parser::{header, mime};

use super::attachment::save_attachment;
use super::layout::message_attachment_dir;
use super::sanitize::{sanitize, truncate_chars};

/// Subject used when the header is missing or cannot be decoded.
pub const SUBJECT_PLACEHOLDER: &str = "No Subject";

/// Maximum characters of the subject kept in an archive filename.
const SUBJECT_PREFIX_LEN: usize = 50;

/// Write `raw` as `<archive_root>/<id:06>_<subject>.eml` and extract its
/// attachments under `attachment_root`.
///
/// Only the archive write can fail this call. Decoding problems fall back to
/// [`SUBJECT_PLACEHOLDER`] and skip attachment extraction; individual
/// attachment failures are logged and skipped.
pub fn persist(
    message_id: MessageId,
    raw: &[u8],
    archive_root: &Path,
    attachment_root: &Path,
) -> Result<ArchivedMessage, PersistError> {
    let parsed = match mime::parse_message(raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(id = %message_id, error = %e, "Could not decode message, archiving raw bytes only");
            None
        }
    };

    let subject = parsed
        .as_ref()
        .and_then(|p| p.subject.clone())
        .or_else(|| header::raw_subject(raw))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| SUBJECT_PLACEHOLDER.to_string());

    let display_name = truncate_chars(&sanitize(&subject), SUBJECT_PREFIX_LEN).to_string();
    let path = archive_root.join(eml_filename(message_id, &subject));
    write_atomically(&path, raw).map_err(|source| PersistError::Archive {
        id: message_id,
        path: path.clone(),
        source,
    })?;
    debug!(id = %message_id, path = %path.display(), "Archived message");

    let mut attachments = Vec::new();
    if let Some(parsed) = parsed.filter(|p| p.attachments().next().is_some()) {
        clear_stale_attachments(attachment_root, message_id);
        for (i, part) in parsed.attachments().enumerate() {
            match save_attachment(part, message_id, i + 1, attachment_root) {
                Ok(record) => attachments.push(record),
                Err(e) => {
                    warn!(
                        id = %message_id,
                        sequence = i + 1,
                        error = %e,
                        "Failed to save attachment"
                    );
                }
            }
        }
    }

    Ok(ArchivedMessage {
        id: message_id,
        display_name,
        path,
        size: raw.len() as u64,
        attachments,
    })
}

/// Archive filename: `{id:06}_{subject}.eml`, the subject sanitized and cut
/// to its first 50 characters.
pub fn eml_filename(message_id: MessageId, subject: &str) -> String {
    let safe = sanitize(subject);
    format!(
        "{:06}_{}.eml",
        message_id.get(),
        truncate_chars(&safe, SUBJECT_PREFIX_LEN)
    )
}

/// Ids that already have an archive file in `archive_root`.
pub fn archived_ids(archive_root: &Path) -> BTreeSet<MessageId> {
    let Ok(dir) = std::fs::read_dir(archive_root) else {
        return BTreeSet::new();
    };

    dir.filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".eml") {
                return None;
            }
            let (prefix, _) = name.split_once('_')?;
            prefix.parse::<u32>().ok().map(MessageId)
        })
        .collect()
}

/// Write to a `.part` sibling first, then rename into place.
fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = partial_path(path);
    if let Err(e) = std::fs::write(&tmp, data).and_then(|()| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Remove attachments left by an earlier attempt at this message.
///
/// Only ids that never reached the progress record are persisted, so
/// anything in their directory is from an interrupted attempt.
fn clear_stale_attachments(attachment_root: &Path, message_id: MessageId) {
    let dir = message_attachment_dir(attachment_root, message_id);
    if dir.is_dir() {
        debug!(id = %message_id, dir = %dir.display(), "Removing attachments of an earlier attempt");
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "Could not remove stale attachments");
        }
    }
}
