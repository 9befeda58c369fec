pub mod chunker;

const UTF8_BOM: char = '\u{feff}';

/// Decode extracted document bytes, replacing invalid UTF-8 and dropping a
/// leading byte-order mark.
pub fn decode_text(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let text: &str = &decoded;
    text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string()
}
