use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    // "335 Ecce autem", " 336-338 ...", "335. Hic"
    static ref RE_LEADING_VERSE_NUMBER: Regex = Regex::new(r"^\s*(\d+)").unwrap();
}

/// Collapses every whitespace run to a single space, keeping a leading or trailing
/// space if there was whitespace there. Pretty-printed XML indentation would otherwise
/// leak into the rendered text.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").into_owned()
}

/// Collapse and trim, for titles, labels and other single-line values.
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(text).trim().to_string()
}

/// Strips the document-local pointer marker: "#la.5.335" -> "la.5.335"
pub fn strip_pointer(pointer: &str) -> &str {
    let pointer = pointer.trim();
    pointer.strip_prefix('#').unwrap_or(pointer)
}

/// The last dot-separated component of an id: "Theb.5.335" -> "335"
pub fn id_suffix(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

/// Leading verse number of a commentary title: "335 Ecce autem" -> Some("335")
pub fn leading_verse_number(title: &str) -> Option<&str> {
    RE_LEADING_VERSE_NUMBER
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Normalizes a witness declaration: "#P #V2" -> "P V2"
pub fn witness_label(wit: &str) -> String {
    wit.split_whitespace()
        .map(strip_pointer)
        .filter(|s| !s.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Returns `value` unless it's blank, in which case `None`.
pub fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
