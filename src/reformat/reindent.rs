//! Bracket-depth reindentation.

use crate::token::{RTokenizer, TokenKind};
use std::collections::HashSet;

/// Re-indent every line by bracket depth.
///
/// A line starting with closing brackets lines up with the line that opened
/// them. Other lines sit one level deeper than the innermost open bracket.
/// Blank lines become empty, and the continuation rows of multi-line strings
/// are left untouched.
pub fn reindent(text: &str, tab_size: usize) -> String {
    let tokens = RTokenizer::tokenize(text);

    let mut verbatim = HashSet::new();
    for token in &tokens {
        if token.is_whitespace() || token.kind.is_comment() {
            continue;
        }
        let start = token.position().row;
        let end = token.end().row;
        verbatim.extend(start + 1..=end);
    }

    // Brackets per row, in order
    let mut brackets: Vec<Vec<bool>> = Vec::new();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Paren) {
        let row = token.position().row;
        if brackets.len() <= row {
            brackets.resize_with(row + 1, Vec::new);
        }
        if token.is_open_bracket() {
            brackets[row].push(true);
        } else if token.is_close_bracket() {
            brackets[row].push(false);
        }
    }

    let mut stack: Vec<usize> = Vec::new();
    let mut out: Vec<String> = Vec::new();

    for (row, line) in text.split('\n').enumerate() {
        let row_brackets = brackets.get(row).map(Vec::as_slice).unwrap_or(&[]);

        let leading_closers = row_brackets
            .iter()
            .take_while(|open| !**open)
            .count()
            .min(stack.len());
        let level = if leading_closers > 0 && line_starts_with_closer(line) {
            stack[stack.len() - leading_closers]
        } else {
            stack.last().map_or(0, |level| level + 1)
        };

        if verbatim.contains(&row) {
            out.push(line.to_string());
        } else if line.trim().is_empty() {
            out.push(String::new());
        } else {
            out.push(format!("{}{}", " ".repeat(level * tab_size), line.trim_start()));
        }

        for &open in row_brackets {
            if open {
                stack.push(level);
            } else {
                stack.pop();
            }
        }
    }

    out.join("\n")
}

fn line_starts_with_closer(line: &str) -> bool {
    matches!(line.trim_start().chars().next(), Some(')' | ']' | '}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_blocks() {
        let input = "f <- function(x) {\nif (x) {\ny\n}\n}";
        assert_eq!(
            reindent(input, 2),
            "f <- function(x) {\n  if (x) {\n    y\n  }\n}"
        );
    }

    #[test]
    fn test_call_arguments() {
        let input = "foo(\na,\nbar(\nb\n)\n)";
        assert_eq!(reindent(input, 4), "foo(\n    a,\n    bar(\n        b\n    )\n)");
    }

    #[test]
    fn test_closer_then_opener_on_one_line() {
        let input = "if (x) {\na\n} else {\nb\n}";
        assert_eq!(reindent(input, 2), "if (x) {\n  a\n} else {\n  b\n}");
    }

    #[test]
    fn test_blank_lines_emptied() {
        assert_eq!(reindent("{\n   \nx\n}", 2), "{\n\n  x\n}");
    }

    #[test]
    fn test_multiline_string_untouched() {
        let input = "{\nx <- \"one\n    two\"\n}";
        assert_eq!(reindent(input, 2), "{\n  x <- \"one\n    two\"\n}");
    }

    #[test]
    fn test_brackets_in_strings_and_comments_ignored() {
        let input = "{\nx <- \"(\" # {\ny\n}";
        assert_eq!(reindent(input, 2), "{\n  x <- \"(\" # {\n  y\n}");
    }

    #[test]
    fn test_unbalanced_closers() {
        assert_eq!(reindent("  }\n  x", 2), "}\nx");
    }
}
