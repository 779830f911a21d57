//! Export functionality: archive layout, `.eml` persistence, attachments, and filename safety.

pub mod attachment;
pub mod eml;
pub mod instructions;
pub mod layout;
pub mod sanitize;

pub use layout::OutputLayout;
