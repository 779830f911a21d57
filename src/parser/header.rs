//! Header decoding: RFC 2047 encoded-words, folding, and raw 8-bit fallbacks.

use mail_parser::MessageParser;

/// Decode a raw header value into display text.
///
/// Encoded-words (`=?UTF-8?B?...?=`) are resolved by `mail-parser`. Unknown
/// charsets and malformed words degrade to the input text; this never fails.
pub fn decode_header_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains("=?") {
        return trimmed.to_string();
    }

    // mail-parser only decodes headers in the context of a message,
    // so wrap the value in a minimal one.
    let wrapped = format!("Subject: {trimmed}\r\n\r\n");
    MessageParser::default()
        .parse(wrapped.as_bytes())
        .and_then(|msg| msg.subject().map(str::to_string))
        .unwrap_or_else(|| trimmed.to_string())
}

/// Pull the `Subject:` header straight out of the raw header block.
///
/// Used when the full MIME parse fails; the header bytes are decoded as
/// UTF-8, or Windows-1252 when they are not valid UTF-8.
pub fn raw_subject(raw_message: &[u8]) -> Option<String> {
    let end = find_header_end(raw_message).unwrap_or(raw_message.len());
    let text = decode_header_bytes(&raw_message[..end]);
    let headers = unfold_headers(&text);
    headers
        .iter()
        .find(|(name, _)| name == "subject")
        .map(|(_, value)| decode_header_text(value))
}

/// Decode raw header bytes to a string.
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines and return `(lowercase_name, value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    result
}

/// Offset of the blank line separating headers from the body.
fn find_header_end(data: &[u8]) -> Option<usize> {
    let lf = data.windows(2).position(|w| w == b"\n\n");
    let crlf = data.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_header_text("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_header_text("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_plain_passthrough() {
        assert_eq!(decode_header_text("  Quarterly report "), "Quarterly report");
    }

    #[test]
    fn test_decode_malformed_word_degrades() {
        let out = decode_header_text("=?bogus");
        assert!(out.contains("bogus"));
    }

    #[test]
    fn test_raw_subject_folded() {
        let raw = b"From: a@b.com\r\nSubject: Part one\r\n\tpart two\r\n\r\nBody";
        assert_eq!(raw_subject(raw).as_deref(), Some("Part one part two"));
    }

    #[test]
    fn test_raw_subject_latin1_bytes() {
        let raw = b"Subject: caf\xe9\n\nBody";
        assert_eq!(raw_subject(raw).as_deref(), Some("café"));
    }

    #[test]
    fn test_raw_subject_missing() {
        assert_eq!(raw_subject(b"From: a@b.com\n\nSubject: in body"), None);
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"From: a@b.com\nSubject: Hi\n\nBody\n"), Some(25));
        assert_eq!(
            find_header_end(b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n"),
            Some(26)
        );
    }
}
