use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Longest UTF-8 encoding of one char; bounds the bytes read for `max_chars`.
const MAX_UTF8_BYTES: usize = 4;

/// Read at most `max_chars` characters of `path` as text.
///
/// Decoding is lossy. Returns `Ok(None)` for binary content (a NUL byte in
/// the prefix).
pub fn read_text_prefix(path: &Path, max_chars: usize) -> io::Result<Option<String>> {
    let limit = max_chars.saturating_mul(MAX_UTF8_BYTES) as u64;
    let mut buffer = Vec::new();
    File::open(path)?.take(limit).read_to_end(&mut buffer)?;

    if buffer.contains(&0) {
        return Ok(None);
    }

    let text = String::from_utf8_lossy(&buffer);
    Ok(Some(truncate_chars(&text, max_chars).to_string()))
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
