//! MIME message parsing: flatten a raw message into decoded parts.

use std::panic::{self, AssertUnwindSafe};

use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{ExportError, Result};
use crate::model::{ContentCategory, DecodedPart, ParsedMessage};

/// Parse a complete raw message (headers + body) into its subject and leaf parts.
///
/// Multipart containers are skipped; every other part is returned with its
/// transfer encoding removed. A nested `message/rfc822` part is returned
/// whole and its own parts follow it.
/// A panic inside the decoder is contained here and reported as an error.
pub fn parse_message(raw_message: &[u8]) -> Result<ParsedMessage> {
    match panic::catch_unwind(AssertUnwindSafe(|| parse_parts(raw_message))) {
        Ok(Some(parsed)) => Ok(parsed),
        Ok(None) => Err(ExportError::MimeError(
            "message has no parseable headers".into(),
        )),
        Err(_) => Err(ExportError::MimeError("decoder panicked".into())),
    }
}

fn parse_parts(raw_message: &[u8]) -> Option<ParsedMessage> {
    let msg = MessageParser::default().parse(raw_message)?;

    let subject = msg.subject().map(str::to_string);
    let mut parts = Vec::new();
    collect_parts(&msg.parts, &mut parts);

    Some(ParsedMessage { subject, parts })
}

fn collect_parts(parts: &[MessagePart<'_>], out: &mut Vec<DecodedPart>) {
    for part in parts {
        out.extend(decode_part(part));
        if let PartType::Message(inner) = &part.body {
            collect_parts(&inner.parts, out);
        }
    }
}

fn decode_part(part: &MessagePart<'_>) -> Option<DecodedPart> {
    if matches!(part.body, PartType::Multipart(_)) {
        return None;
    }

    let mime_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| default_mime_type(&part.body).to_string())
        .to_ascii_lowercase();

    let is_attachment = part
        .content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"));

    Some(DecodedPart {
        category: ContentCategory::from_mime(&mime_type),
        mime_type,
        filename: part.attachment_name().map(String::from),
        is_attachment,
        payload: part.contents().to_vec(),
    })
}

fn default_mime_type(body: &PartType<'_>) -> &'static str {
    match body {
        PartType::Text(_) => "text/plain",
        PartType::Html(_) => "text/html",
        PartType::Message(_) => "message/rfc822",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: alice@example.com\r\n\
Subject: =?UTF-8?B?UmVwb3J0IMOpdMOp?=\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
See attached.\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--XYZ\r\n\
Content-Type: image/png\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw==\r\n\
--XYZ--\r\n";

    #[test]
    fn test_parse_subject_and_parts() {
        let parsed = parse_message(MULTIPART.as_bytes()).unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("Report été"));
        assert_eq!(parsed.parts.len(), 3);
        assert_eq!(parsed.attachments().count(), 2);
    }

    #[test]
    fn test_attachment_payload_is_decoded() {
        let parsed = parse_message(MULTIPART.as_bytes()).unwrap();
        let pdf = parsed
            .attachments()
            .find(|p| p.filename.as_deref() == Some("report.pdf"))
            .unwrap();
        assert_eq!(pdf.payload, b"%PDF-1.4");
        assert_eq!(pdf.category, ContentCategory::Pdf);
    }

    #[test]
    fn test_unnamed_attachment_keeps_category() {
        let parsed = parse_message(MULTIPART.as_bytes()).unwrap();
        let image = parsed.attachments().find(|p| p.filename.is_none()).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.category, ContentCategory::Image);
    }

    #[test]
    fn test_forwarded_message_attachments_are_included() {
        let raw = "From: bob@example.com\r\n\
Subject: Fwd: report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"OUTER\"\r\n\
\r\n\
--OUTER\r\n\
Content-Type: text/plain\r\n\
\r\n\
Forwarding this.\r\n\
--OUTER\r\n\
Content-Type: message/rfc822\r\n\
Content-Disposition: attachment; filename=\"original.eml\"\r\n\
\r\n".to_string()
            + MULTIPART
            + "\r\n--OUTER--\r\n";

        let parsed = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("Fwd: report"));
        let names: Vec<Option<&str>> = parsed
            .attachments()
            .map(|p| p.filename.as_deref())
            .collect();
        assert!(names.contains(&Some("original.eml")));
        assert!(names.contains(&Some("report.pdf")));
        let pdf = parsed
            .attachments()
            .find(|p| p.filename.as_deref() == Some("report.pdf"))
            .unwrap();
        assert_eq!(pdf.payload, b"%PDF-1.4");
    }

    #[test]
    fn test_single_part_has_no_attachments() {
        let raw = b"Subject: Hi\r\n\r\nJust text\r\n";
        let parsed = parse_message(raw).unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("Hi"));
        assert_eq!(parsed.attachments().count(), 0);
    }
}
