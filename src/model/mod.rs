//! Core data model types: message identifiers, archived messages, attachments, and job state.

pub mod attachment;
pub mod job;
pub mod message;

pub use attachment::AttachmentRecord;
pub use job::JobState;
pub use message::{ArchivedMessage, ContentCategory, DecodedPart, MessageId, ParsedMessage};
