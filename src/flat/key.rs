//! Flat key syntax.
//!
//! A flat key is a list of path segments joined by [`SEPARATOR`]. Segments
//! that are canonical non-negative integers address array elements. A key
//! whose last segment ends in [`SECRET_MARKER`] holds ciphertext.

/// Separator between path segments.
pub const SEPARATOR: char = ':';

/// Suffix marking a leaf whose stored value is ciphertext.
pub const SECRET_MARKER: char = '*';

/// Join a path prefix and a child segment.
pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        let mut key = String::with_capacity(prefix.len() + 1 + segment.len());
        key.push_str(prefix);
        key.push(SEPARATOR);
        key.push_str(segment);
        key
    }
}

/// Split a key into its segments.
pub fn segments(key: &str) -> std::str::Split<'_, char> {
    key.split(SEPARATOR)
}

/// Parse a segment as an array index.
///
/// Only canonical decimal forms count: `0`, `7`, `42`. Leading zeros, signs
/// and whitespace make the segment an object field name.
pub fn parse_index(segment: &str) -> Option<usize> {
    let bytes = segment.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    segment.parse().ok()
}

/// True if `segment` is a canonical array index.
pub fn is_index(segment: &str) -> bool {
    parse_index(segment).is_some()
}

/// True if the key carries the secret marker.
pub fn is_marked(key: &str) -> bool {
    key.ends_with(SECRET_MARKER)
}

/// Append the secret marker to a key.
pub fn mark(key: &str) -> String {
    let mut marked = String::with_capacity(key.len() + 1);
    marked.push_str(key);
    marked.push(SECRET_MARKER);
    marked
}

/// Strip the secret marker, if present.
pub fn strip_marker(key: &str) -> Option<&str> {
    key.strip_suffix(SECRET_MARKER)
}

/// Case-insensitive form used for key identity.
pub fn fold(key: &str) -> String {
    key.to_lowercase()
}

/// True if `key` is part of `section`: the section itself, its marked leaf,
/// or anything beneath it. Matching is case-insensitive and a prefix only
/// counts when followed by the separator, so `FooBar` is not part of `Foo`.
pub fn belongs_to_section(key: &str, section: &str) -> bool {
    let key = fold(key);
    let section = fold(section);

    if key == section {
        return true;
    }

    match key.strip_prefix(section.as_str()) {
        Some(rest) => {
            rest.starts_with(SEPARATOR) || (rest.len() == 1 && rest.starts_with(SECRET_MARKER))
        }
        None => false,
    }
}
