//! Filename sanitizing for untrusted subjects and attachment names.

/// Maximum length of a sanitized name, in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Name used when nothing usable is left of the input.
pub const FALLBACK_NAME: &str = "unnamed_file";

/// Longest suffix after the final `.` still treated as an extension.
const MAX_EXTENSION_LEN: usize = 16;

/// Map arbitrary text to a safe local filename.
///
/// Characters illegal on common filesystems (`<>:"/\|?*` and control
/// characters) become `_`, leading and trailing dots and whitespace are
/// trimmed, and the result is cut to [`MAX_NAME_LEN`] characters while
/// keeping a trailing extension intact.
pub fn sanitize(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    if trimmed.chars().count() <= MAX_NAME_LEN {
        return trimmed.to_string();
    }

    let (stem, ext) = split_extension(trimmed);
    let keep = MAX_NAME_LEN.saturating_sub(ext.chars().count());
    format!("{}{ext}", truncate_chars(stem, keep))
}

/// Return at most `max` leading characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Split `name` into stem and extension (the extension keeps its dot).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_LEN + 1 => {
            name.split_at(dot)
        }
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_illegal_characters() {
        assert_eq!(sanitize("a/b\\c:d*e"), "a_b_c_d_e");
        assert_eq!(sanitize("<x>|\"y\"?"), "_x___y__");
    }

    #[test]
    fn test_trims_dots_and_spaces() {
        assert_eq!(sanitize("  ..hidden.txt. "), "hidden.txt");
    }

    #[test]
    fn test_empty_uses_fallback() {
        assert_eq!(sanitize(""), FALLBACK_NAME);
        assert_eq!(sanitize(" . "), FALLBACK_NAME);
    }

    #[test]
    fn test_long_name_keeps_extension() {
        let raw = format!("My:Report*2024{}.pdf", "x".repeat(300));
        let out = sanitize(&raw);
        assert!(out.chars().count() <= MAX_NAME_LEN);
        assert!(out.ends_with(".pdf"));
        assert!(!out.contains(':') && !out.contains('*'));
        assert!(out.starts_with("My_Report_2024"));
    }

    #[test]
    fn test_long_multibyte_name() {
        let raw = "é".repeat(400);
        let out = sanitize(&raw);
        assert_eq!(out.chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("invoice.pdf"), ("invoice", ".pdf"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".profile"), (".profile", ""));
    }

    #[test]
    fn test_never_contains_forbidden_characters() {
        let forbidden = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
        let inputs = [
            "What? Why: now/then",
            "\"quoted\" <tag>",
            "pipe|star*back\\slash",
            "\u{0}\u{7}ctrl",
        ];
        for input in inputs {
            let out = sanitize(input);
            assert!(
                !out.chars().any(|c| forbidden.contains(&c) || c.is_control()),
                "unsafe output {out:?} for {input:?}"
            );
        }
    }
}
