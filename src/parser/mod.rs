//! Message decoding: header text and MIME part walking.

pub mod header;
pub mod mime;

pub use header::decode_header_text;
pub use mime::parse_message;
