//! Input sanitization for user-supplied text embedded in prompts.

/// Strips C0 control characters and DEL, keeping tab, newline and carriage
/// return. Every other character, multi-byte included, passes through.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !is_stripped_control(*c)).collect()
}

fn is_stripped_control(c: char) -> bool {
    matches!(
        c,
        '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}'
    )
}

/// Sanitizes `text` and wraps it in `<label>` delimiters so the model can
/// tell untrusted user content apart from instructions.
pub fn wrap_user_content(label: &str, text: &str) -> String {
    format!("<{label}>\n{}\n</{label}>", sanitize(text))
}

/// Like [`wrap_user_content`] for optional inputs; absent or blank values
/// render as `not specified`.
pub fn wrap_optional(label: &str, text: Option<&str>) -> String {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => wrap_user_content(label, t),
        None => wrap_user_content(label, "not specified"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_every_listed_control_byte() {
        let mut input = String::new();
        for b in (0x00u8..=0x08).chain([0x0B, 0x0C]).chain(0x0E..=0x1F).chain([0x7F]) {
            input.push(b as char);
        }
        input.push_str("ok");
        assert_eq!(sanitize(&input), "ok");
    }

    #[test]
    fn test_preserves_tab_newline_carriage_return() {
        let input = "line one\r\n\tline two\n";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_preserves_unicode_and_emoji() {
        let input = "Ingénieur logiciel — 東京 🚀 \u{200B}";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let input = "Senior\x00 Engineer\x1b[31m\x7f";
        let once = sanitize(input);
        assert_eq!(once, "Senior Engineer[31m");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_wrap_user_content_delimits_and_sanitizes() {
        let wrapped = wrap_user_content("role", "Staff\x07 Engineer");
        assert_eq!(wrapped, "<role>\nStaff Engineer\n</role>");
    }

    #[test]
    fn test_wrap_optional_defaults_blank_values() {
        assert_eq!(
            wrap_optional("location", Some("   ")),
            "<location>\nnot specified\n</location>"
        );
        assert_eq!(
            wrap_optional("location", Some("Berlin")),
            "<location>\nBerlin\n</location>"
        );
    }
}
