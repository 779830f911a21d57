//! Static import instructions written next to an export.

use std::path::PathBuf;

use crate::error::{ExportError, Result};

use super::layout::OutputLayout;

const INSTRUCTIONS: &str = "\
Importing the exported messages
===============================

Every message is stored as a standard .eml file with its original headers,
body and embedded attachments untouched.

Microsoft Outlook (desktop)
  Drag .eml files from the 'emails' folder onto an Outlook folder, or open
  them individually and use Move > Other Folder.

Outlook.com / Windows Mail
  Drag .eml files directly into the message list of the target folder.

Thunderbird
  Install the ImportExportTools NG add-on, then right-click a folder and
  choose ImportExportTools NG > Import messages > Import EML files.

Apple Mail
  Drag .eml files onto a mailbox in the sidebar.

Notes
  - Attachments remain embedded in each .eml. Copies are also extracted to
    'attachments/email_<number>/' for direct access.
  - File names start with the six-digit message number assigned by the
    server at download time.
  - Very large exports are easier to import in batches.

Layout
  emails/                  one .eml per message
  attachments/             extracted attachment copies
  IMPORT_INSTRUCTIONS.txt  this file
";

/// Write `IMPORT_INSTRUCTIONS.txt` into the output root.
pub fn write_instructions(layout: &OutputLayout) -> Result<PathBuf> {
    let path = layout.instructions_path();
    std::fs::write(&path, INSTRUCTIONS).map_err(|e| ExportError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_instructions() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(tmp.path());
        let path = write_instructions(&layout).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("emails/"));
        assert!(text.contains("Thunderbird"));
    }
}
