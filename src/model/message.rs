//! Message identifiers, decoded MIME parts, and archived message artifacts.

use std::fmt;
use std::path::PathBuf;

use super::attachment::AttachmentRecord;

/// Server-assigned identifier of one message within a folder enumeration.
///
/// This is the IMAP sequence number reported by `SEARCH ALL`. It is only
/// unique within one (server, folder) session and is not stable if the
/// mailbox is mutated concurrently.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u32);

impl MessageId {
    /// The raw numeric value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MessageId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Coarse content category of a MIME part, used to pick a file extension
/// when the part carries no filename of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Image,
    Text,
    Pdf,
    Other,
}

impl ContentCategory {
    /// Classify a MIME type such as `"image/png"` or `"application/pdf"`.
    ///
    /// Checked in the order image, text, pdf, so `"text/pdf"` is text.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("image") {
            Self::Image
        } else if mime.contains("text") {
            Self::Text
        } else if mime.contains("pdf") {
            Self::Pdf
        } else {
            Self::Other
        }
    }

    /// Extension (with leading dot) for synthesized attachment names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Image => ".jpg",
            Self::Text => ".txt",
            Self::Pdf => ".pdf",
            Self::Other => ".bin",
        }
    }
}

/// One MIME part after transfer decoding.
#[derive(Debug, Clone)]
pub struct DecodedPart {
    /// Category derived from [`DecodedPart::mime_type`].
    pub category: ContentCategory,

    /// Full MIME type (e.g. `"application/pdf"`).
    pub mime_type: String,

    /// Declared filename with RFC 2047/2231 encoding already resolved.
    pub filename: Option<String>,

    /// `true` when `Content-Disposition` is `attachment`.
    pub is_attachment: bool,

    /// Decoded payload bytes.
    pub payload: Vec<u8>,
}

/// Result of decoding a raw message.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    /// Decoded `Subject:` header, if one was present.
    pub subject: Option<String>,

    /// Every leaf part of the message, in document order.
    pub parts: Vec<DecodedPart>,
}

impl ParsedMessage {
    /// Parts whose disposition marks them as attachments.
    pub fn attachments(&self) -> impl Iterator<Item = &DecodedPart> {
        self.parts.iter().filter(|p| p.is_attachment)
    }
}

/// A message that has been written to the archive directory.
#[derive(Debug, Clone)]
pub struct ArchivedMessage {
    /// Sequence number the message was fetched under.
    pub id: MessageId,

    /// Sanitized subject used in the filename.
    pub display_name: String,

    /// Location of the `.eml` file.
    pub path: PathBuf,

    /// Number of raw bytes written.
    pub size: u64,

    /// Attachments extracted alongside the archive.
    pub attachments: Vec<AttachmentRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_mime() {
        assert_eq!(ContentCategory::from_mime("image/png"), ContentCategory::Image);
        assert_eq!(ContentCategory::from_mime("TEXT/plain"), ContentCategory::Text);
        assert_eq!(
            ContentCategory::from_mime("application/pdf"),
            ContentCategory::Pdf
        );
        assert_eq!(
            ContentCategory::from_mime("application/zip"),
            ContentCategory::Other
        );
    }

    #[test]
    fn test_category_extension() {
        assert_eq!(ContentCategory::Image.extension(), ".jpg");
        assert_eq!(ContentCategory::Other.extension(), ".bin");
    }

    #[test]
    fn test_message_id_display_and_serde() {
        let id = MessageId(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }
}
