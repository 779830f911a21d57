//! Write decoded attachment parts into per-message directories.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ExportError, Result};
use crate::model::{AttachmentRecord, DecodedPart, MessageId};
use crate::parser::decode_header_text;

use super::layout::message_attachment_dir;
use super::sanitize::{sanitize, split_extension};

/// Save one attachment part of `message_id` under `attachment_root`.
///
/// The file lands in `attachment_root/email_<id>/`. A declared filename is
/// decoded and sanitized; parts without one get
/// `attachment_<id>_<sequence><ext>` with the extension chosen from the
/// part's content category. Existing files are never overwritten: a numeric
/// suffix is added before the extension instead.
pub fn save_attachment(
    part: &DecodedPart,
    message_id: MessageId,
    sequence: usize,
    attachment_root: &Path,
) -> Result<AttachmentRecord> {
    let filename = attachment_filename(part, message_id, sequence);

    let directory = message_attachment_dir(attachment_root, message_id);
    std::fs::create_dir_all(&directory).map_err(|e| ExportError::io(&directory, e))?;

    let path = unique_path(&directory.join(&filename));
    std::fs::write(&path, &part.payload).map_err(|e| ExportError::io(&path, e))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(filename);
    debug!(id = %message_id, file = %filename, bytes = part.payload.len(), "Saved attachment");

    Ok(AttachmentRecord {
        filename,
        directory,
        path,
        size: part.payload.len() as u64,
    })
}

/// Resolve the filename an attachment part should be saved under.
pub fn attachment_filename(part: &DecodedPart, message_id: MessageId, sequence: usize) -> String {
    match part.filename.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => sanitize(&decode_header_text(name)),
        _ => format!(
            "attachment_{message_id}_{sequence}{}",
            part.category.extension()
        ),
    }
}

/// If `path` already exists, append `_1`, `_2`, ... before the extension
/// until a free name is found.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);
    let parent = path.parent().unwrap_or(Path::new("."));

    (1usize..)
        .map(|i| parent.join(format!("{stem}_{i}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
