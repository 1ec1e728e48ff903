//! Escaping of single path elements for the storage engine.
//!
//! The storage engine reserves `%`, `/`, `:`, `[`, `]`, `*`, `|`, quotes and
//! control whitespace inside names, rejects `.`-only names, and trims
//! leading/trailing whitespace (any Unicode whitespace, not just spaces). Each offending character is written as `%XX`
//! per UTF-8 byte. Escaping applies to one element at a time; callers split
//! on `/` first so real separators survive.

use std::borrow::Cow;

fn must_escape(c: char, index: usize, last: usize, short_name: bool) -> bool {
    match c {
        '%' | '/' | ':' | '[' | ']' | '*' | '|' | '\'' | '"' | '\t' | '\r' | '\n' => true,
        '.' => short_name,
        c if c.is_whitespace() => index == 0 || index == last,
        _ => false,
    }
}

/// Escape one path element.
pub fn escape_element(name: &str) -> Cow<'_, str> {
    let short_name = name.chars().count() < 3;
    // Byte offset of the final char, to compare against `char_indices`.
    let last = name.char_indices().next_back().map_or(0, |(i, _)| i);
    let needs_escape = name
        .char_indices()
        .any(|(i, c)| must_escape(c, i, last, short_name));
    if !needs_escape {
        return Cow::Borrowed(name);
    }

    let mut escaped = String::with_capacity(name.len() + 8);
    for (i, c) in name.char_indices() {
        if must_escape(c, i, last, short_name) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push('%');
                escaped.push_str(&format!("{byte:02X}"));
            }
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

/// Reverse [`escape_element`]. Sequences that are not `%` followed by two
/// hex digits are kept verbatim.
pub fn unescape_element(name: &str) -> Cow<'_, str> {
    if !name.contains('%') {
        return Cow::Borrowed(name);
    }

    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                decoded.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(decoded) {
        Ok(s) => Cow::Owned(s),
        Err(e) => Cow::Owned(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
