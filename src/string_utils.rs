//! Character-column string utilities
//!
//! Document positions count characters, while Rust strings are indexed by
//! UTF-8 bytes. These helpers convert between the two so that slicing a line
//! at a `Position::column` never lands inside a multi-byte character.
//!
//! # Example
//! ```ignore
//! use crate::string_utils::{char_to_byte, split_at_column};
//!
//! let line = "Hei på deg"; // 'å' is 2 bytes
//! assert_eq!(char_to_byte(line, 6), 7);
//! assert_eq!(split_at_column(line, 5), ("Hei p", "å deg"));
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Column Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Number of characters in `s`.
#[inline]
pub fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the character at `column`.
///
/// Columns past the end of the string clamp to `s.len()`.
pub fn char_to_byte(s: &str, column: usize) -> usize {
    s.char_indices()
        .nth(column)
        .map(|(index, _)| index)
        .unwrap_or(s.len())
}

/// Character column of the byte index `index`.
///
/// Indices inside a multi-byte character round down to that character.
pub fn byte_to_char(s: &str, index: usize) -> usize {
    s.char_indices().take_while(|(i, _)| *i < index).count()
        - usize::from(index < s.len() && !s.is_char_boundary(index))
}

/// Split a line at a character column.
pub fn split_at_column(s: &str, column: usize) -> (&str, &str) {
    s.split_at(char_to_byte(s, column))
}

// ─────────────────────────────────────────────────────────────────────────────
// Whitespace Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Whether `s` consists only of whitespace (true for the empty string).
#[inline]
pub fn is_blank(s: &str) -> bool {
    s.chars().all(char::is_whitespace)
}

/// Count non-whitespace characters.
///
/// This is the "significant length" the reformatter budgets line breaks with.
pub fn significant_len(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

/// Remove every whitespace character from `s`.
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Leading indentation of a line (spaces and tabs only).
pub fn leading_indent(s: &str) -> &str {
    let end = s.len() - s.trim_start_matches([' ', '\t']).len();
    &s[..end]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
