//! Reversible mapping from table and database names to file names.
//!
//! ASCII alphanumerics and `_` are kept as is; every other byte of the UTF-8
//! encoding becomes `%XX` with upper-case hex digits. The mapping is injective,
//! and the output never contains `/`, `.` or a leading dot, so escaped names
//! cannot collide with hidden files or the record suffixes.

/// Escape `name` so it can be used as a single path component.
///
/// ```
/// use common::escape_for_file_name;
///
/// assert_eq!(escape_for_file_name("hits_v1"), "hits_v1");
/// assert_eq!(escape_for_file_name(".inner.mv"), "%2Einner%2Emv");
/// ```
pub fn escape_for_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(hex_digit(byte >> 4));
            out.push(hex_digit(byte & 0x0f));
        }
    }
    out
}

/// Inverse of [`escape_for_file_name`]; `None` if `file_name` could not have
/// been produced by it.
pub fn unescape_for_file_name(file_name: &str) -> Option<String> {
    let bytes = file_name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            let decoded = (hi << 4) | lo;
            // Plain characters are never escaped.
            if decoded.is_ascii_alphanumeric() || decoded == b'_' {
                return None;
            }
            out.push(decoded);
            i += 3;
        } else if byte.is_ascii_alphanumeric() || byte == b'_' {
            out.push(byte);
            i += 1;
        } else {
            return None;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_digit(nibble: u8) -> char {
    char::from(b"0123456789ABCDEF"[usize::from(nibble)])
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
