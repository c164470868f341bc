use serde::Serialize;
use std::fmt::Write;

/// Single-line rendering used for key labels in the list pane.
pub fn format_bytes_inline(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "(empty)".to_string();
    }

    if let Some(text) = utf8_if_printable(bytes) {
        return escape_inline(&text);
    }

    hex_inline(bytes)
}

pub fn format_bytes_block(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "(empty)".to_string();
    }

    if let Some(text) = utf8_if_printable(bytes) {
        return text;
    }

    hex_multiline(bytes)
}

/// Pretty-prints `raw` when it is JSON, otherwise returns it untouched.
pub fn format_json_pretty(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() || value.is_array() => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string())
        }
        _ => raw.to_string(),
    }
}

/// Indented JSON for composite values (lists, sets, hashes).
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// `93784` -> `1d 02h 03m 04s`. Leading zero units are omitted.
pub fn format_ttl(seconds: i64) -> String {
    if seconds <= 0 {
        return "No expiry".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {:02}h {:02}m {:02}s", days, hours, minutes, secs)
    } else if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Thousands separators: `1234567` -> `1,234,567`.
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn utf8_if_printable(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;

    if text.chars().all(is_printable_char) {
        Some(text.to_string())
    } else {
        None
    }
}

fn is_printable_char(ch: char) -> bool {
    if ch.is_control() {
        matches!(ch, '\n' | '\r' | '\t')
    } else {
        true
    }
}

fn escape_inline(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn hex_inline(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (idx, byte) in bytes.iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        write!(out, "{:02X}", byte).ok();
    }
    out
}

fn hex_multiline(bytes: &[u8]) -> String {
    const LINE_BYTES: usize = 16;
    let mut out = String::new();
    let total_lines = bytes.len().div_ceil(LINE_BYTES);

    for (line_index, chunk) in bytes.chunks(LINE_BYTES).enumerate() {
        let offset = line_index * LINE_BYTES;
        write!(out, "{:08X}: ", offset).ok();
        for (idx, byte) in chunk.iter().enumerate() {
            if idx > 0 {
                out.push(' ');
            }
            write!(out, "{:02X}", byte).ok();
        }
        if line_index + 1 < total_lines {
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_escapes_control_characters() {
        assert_eq!(format_bytes_inline(b"a\nb"), "a\\nb");
        assert_eq!(format_bytes_inline(&[0x00, 0xFF, 0x10]), "00 FF 10");
    }

    #[test]
    fn block_keeps_newlines_and_dumps_binary() {
        assert_eq!(format_bytes_block(b"hi\nthere"), "hi\nthere");
        assert_eq!(format_bytes_block(&[0x00, 0x01]), "00000000: 00 01");
    }

    #[test]
    fn json_strings_are_pretty_printed() {
        assert_eq!(format_json_pretty(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
        assert_eq!(format_json_pretty("not-json"), "not-json");
        // Bare scalars stay verbatim.
        assert_eq!(format_json_pretty("42"), "42");
    }

    #[test]
    fn ttl_is_human_readable() {
        assert_eq!(format_ttl(0), "No expiry");
        assert_eq!(format_ttl(59), "59s");
        assert_eq!(format_ttl(61), "1m 01s");
        assert_eq!(format_ttl(3_600), "1h 00m 00s");
        assert_eq!(format_ttl(93_784), "1d 02h 03m 04s");
    }

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
