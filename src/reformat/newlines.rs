//! Newline and whitespace insertion for R source.
//!
//! The reformatter walks a token buffer one bracketed region at a time. For
//! each region it first scans ahead to score how long and how busy the
//! region is, decides whether to break after commas and after the opening
//! bracket, then walks the region again normalizing whitespace and
//! recursing into nested regions. Token values are rewritten in place and
//! concatenated at the end, so no token is ever dropped or reordered.

use super::cursor::TokenCursor;
use super::reindent::reindent;
use crate::config::FormatterSettings;
use crate::document::Position;
use crate::string_utils::significant_len;
use crate::token::{closing_bracket, opening_bracket, RTokenizer, Token, TokenKind};
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

/// Keywords followed by exactly one space.
const SPACED_KEYWORDS: &[&str] = &["if", "for", "while", "repeat"];

/// Operators that bind without surrounding spaces.
const TIGHT_OPERATORS: &[&str] = &["$", "@", ":", "::", ":::"];

/// Logical operators that end a line inside a long `if` condition.
const LOGICAL_OPERATORS: &[&str] = &["&&", "||", "&", "|"];

fn trailing_space_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]*\n").expect("trailing space pattern is valid"))
}

fn trailing_newlines_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+$").expect("trailing newline pattern is valid"))
}

/// Line breaking decisions for one bracketed region.
#[derive(Debug, Default, Clone, Copy)]
struct Breaks {
    after_comma: bool,
    after_brace: bool,
}

/// Formats R source by inserting newlines and normalizing whitespace.
#[derive(Debug, Clone, Default)]
pub struct Reformatter {
    settings: FormatterSettings,
}

impl Reformatter {
    pub fn new(settings: FormatterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FormatterSettings {
        &self.settings
    }

    /// Reformat a piece of R source.
    pub fn reformat(&self, text: &str) -> String {
        let mut tokens = RTokenizer::tokenize(text);
        self.insert_pretty_newlines(&mut tokens);

        let joined: String = tokens.iter().map(Token::value).collect();
        let joined = trailing_space_regex().replace_all(&joined, "\n");
        let joined = trailing_newlines_regex().replace(&joined, "\n");

        if self.settings.reindent {
            reindent(&joined, usize::from(self.settings.tab_size))
        } else {
            joined.into_owned()
        }
    }

    /// Rewrite token values in place. Concatenating the values afterwards
    /// gives the formatted text.
    ///
    /// Unmatched brackets end the walk early; tokens past them keep their
    /// values.
    pub fn insert_pretty_newlines(&self, tokens: &mut Vec<Token>) {
        // The walk starts after its cursor, so the root region starts on an
        // empty token placed in front of the first real one.
        tokens.insert(0, Token::new(TokenKind::Text, "", Position::default()));
        self.format_region(tokens, TokenCursor::new(0), "", 0, 0, true);

        let root = tokens.remove(0);
        if !root.is_empty() {
            if let Some(first) = tokens.first_mut() {
                let value = format!("{}{}", root.value(), first.value());
                first.set_value(value);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Regions
    // ─────────────────────────────────────────────────────────────────────────

    /// Format the region opened at `cursor`. `opener` is empty for the root.
    fn format_region(
        &self,
        tokens: &mut [Token],
        mut cursor: TokenCursor,
        opener: &'static str,
        paren_nest: usize,
        brace_nest: usize,
        top_level: bool,
    ) {
        let settings = &self.settings;
        let closer = closing_bracket(opener).unwrap_or("");
        let root = paren_nest == 0 && opener.is_empty();
        let mut paren_nest = paren_nest;

        let mut ahead = cursor;
        let before_start = ahead.move_prev_significant(tokens).then_some(ahead);
        let prev_value = before_start
            .map(|c| c.value(tokens).trim().to_string())
            .unwrap_or_default();
        let after_control_flow = before_start.is_some_and(|c| c.is_control_flow_keyword(tokens));

        if !root {
            if let Some(next) = cursor.peek(tokens, 1) {
                next.trim_whitespace_fwd(tokens);
            }
        }

        let scan = self.scan(tokens, cursor, closer, top_level);
        let mut breaks = scan.breaks;

        if opener == "{" {
            if let Some(prev) = cursor.peek(tokens, -1) {
                if prev.value(tokens) == ")" {
                    prev.set_value(tokens, ") ");
                }
            }
        }

        let mut comma_score = scan.commas.saturating_sub(1) * settings.comma_penalty;
        if prev_value == "function" {
            comma_score += settings.function_args_penalty;
        }
        let equals_score = scan.equals.saturating_sub(1) * settings.equals_penalty;
        let indent = brace_nest * usize::from(settings.tab_size);

        if !root && opener == "(" {
            let score = scan.length + comma_score + equals_score + indent;
            if score + paren_nest * settings.paren_nesting_penalty >= settings.brace_break_threshold {
                breaks.after_brace = true;
                paren_nest = 0;
            }
            if score >= settings.comma_break_threshold {
                breaks.after_comma = true;
            }
        }

        if after_control_flow {
            breaks.after_brace = false;
        }
        if settings.always_break_calls.iter().any(|call| *call == prev_value)
            && scan.length >= settings.condition_break_length
        {
            breaks = Breaks {
                after_comma: true,
                after_brace: true,
            };
        }
        if scan.keep_together {
            breaks = Breaks::default();
        }

        debug!(
            "Region '{}' after '{}': length {}, commas {}, equals {}, {:?}",
            opener, prev_value, scan.length, scan.commas, scan.equals, breaks
        );

        let next = cursor.peek(tokens, 1);
        if opener == "{" {
            if !next.is_some_and(|n| n.has_newline(tokens)) {
                cursor.set_value(tokens, "{\n");
            }
        } else if breaks.after_brace {
            let next_blocks = next.is_some_and(|n| {
                n.is_open_bracket(tokens) || n.is_close_bracket(tokens) || n.has_newline(tokens)
            });
            if !root && !next_blocks {
                cursor.set_value(tokens, format!("{}\n", opener));
            }
        } else if !root {
            if let Some(next) = next {
                next.trim_whitespace_fwd(tokens);
            }
        }

        let break_logical = prev_value == "if" && scan.length >= settings.condition_break_length;

        while cursor.move_next(tokens) {
            if cursor.is_comment(tokens) {
                continue;
            }
            if !root && cursor.is_close_bracket(tokens) {
                break;
            }

            let value = cursor.value(tokens).to_string();
            if SPACED_KEYWORDS.contains(&value.as_str()) {
                cursor.ensure_single_space_follows(tokens);
            }

            if value == "else" {
                self.space_else(tokens, cursor);
                continue;
            }

            if cursor.kind(tokens).is_some_and(|k| k.is_operator()) {
                self.space_operator(tokens, cursor, &value, break_logical);
            }

            if value == "," {
                let next = cursor.peek(tokens, 1);
                let next_has_newline = next.is_some_and(|n| n.has_newline(tokens));
                let next_is_whitespace = next.is_some_and(|n| n.is_whitespace(tokens));
                if breaks.after_comma && !next_has_newline {
                    cursor.set_value(tokens, ",\n");
                } else if !breaks.after_comma && !next_is_whitespace {
                    cursor.set_value(tokens, ", ");
                }
            }

            if value == ";" {
                cursor.set_value(tokens, "\n");
            }

            if cursor.is_open_bracket(tokens) {
                if opener != "(" || breaks.after_brace {
                    paren_nest = 0;
                }
                let paren_step = usize::from(opener == "(" && !after_control_flow);
                let brace_step = usize::from(value == "{");

                let region = cursor;
                let matched = cursor.fwd_to_matching(tokens, None);
                let nested_opener = closing_bracket(&value).and_then(opening_bracket).unwrap_or("");
                self.format_region(
                    tokens,
                    region,
                    nested_opener,
                    paren_nest + paren_step,
                    brace_nest + brace_step,
                    false,
                );

                // The nested walk already ran to the end of the buffer
                if !matched {
                    return;
                }
            }
        }

        // `if (x) y` and `function(x) y` put the body on its own line
        if cursor.value(tokens) == ")"
            && after_control_flow
            && cursor.next_significant(tokens).map(Token::value) != Some("{")
        {
            cursor.ensure_newline_follows(tokens);
        }

        if !closer.is_empty() && cursor.value(tokens) == closer {
            if let Some(prev) = cursor.peek(tokens, -1) {
                if breaks.after_brace || closer == "}" {
                    if !prev.has_newline(tokens) {
                        let value = format!("{}\n", prev.value(tokens));
                        prev.set_value(tokens, value);
                    }
                } else {
                    prev.trim_whitespace_bwd(tokens);
                }
            }
        }
    }

    /// Measure the region opened at `cursor` without changing it.
    fn scan(&self, tokens: &[Token], cursor: TokenCursor, closer: &str, top_level: bool) -> RegionScan {
        let mut scan = RegionScan::default();
        let mut ahead = cursor;

        while ahead.move_next(tokens) {
            if ahead.is_comment(tokens) {
                continue;
            }

            let value = ahead.value(tokens);
            scan.length += significant_len(value);
            if ahead.kind(tokens) == Some(TokenKind::Text) {
                scan.commas += value.matches(',').count();
            }

            // `lapply(x, function(y) ...)` stays on one line
            if value == "function"
                && ahead
                    .previous_significant(tokens)
                    .is_some_and(|t| t.value().contains(','))
            {
                scan.keep_together = true;
            }

            // So does `tryCatch({`
            if value == "{" {
                let mut before = ahead;
                if before.move_prev_significant(tokens) && before.is_open_bracket(tokens) {
                    scan.keep_together = true;
                }
            }

            if value == "=" {
                scan.equals += 1;
                // Functions assigned inside calls go on their own lines
                if ahead.move_next_significant(tokens) && ahead.value(tokens) == "function" {
                    scan.breaks = Breaks {
                        after_comma: true,
                        after_brace: true,
                    };
                    continue;
                }
            }

            let value = ahead.value(tokens);
            if value == "{" || value == "[" {
                ahead.fwd_to_matching(tokens, None);
                continue;
            }

            if value == "(" {
                let mut before = ahead;
                if before.move_prev_significant(tokens) {
                    if before.kind(tokens) == Some(TokenKind::Keyword) {
                        ahead.fwd_to_matching(tokens, None);
                    } else {
                        let mut nested = 0;
                        ahead.fwd_to_matching(tokens, Some(&mut nested));
                        scan.length += nested;
                    }
                }
                continue;
            }

            if !top_level && value == closer {
                break;
            }
        }
        scan
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token Rules
    // ─────────────────────────────────────────────────────────────────────────

    /// A bare `else` starts its own line and ends it unless a block or an
    /// `if` follows.
    fn space_else(&self, tokens: &mut [Token], cursor: TokenCursor) {
        let after_block = cursor
            .previous_significant(tokens)
            .map(|t| t.value().trim() == "}");
        if after_block == Some(false) {
            cursor.ensure_newline_precedes(tokens);
        }

        let spaced = cursor
            .previous_token(tokens)
            .is_some_and(|t| t.kind.is_comment() || t.value().ends_with(char::is_whitespace));
        if !spaced {
            cursor.ensure_whitespace_precedes(tokens);
        }

        let next = cursor
            .next_significant(tokens)
            .map(|t| t.value().trim().to_string());
        if !matches!(next.as_deref(), Some("{") | Some("if")) {
            cursor.ensure_newline_follows(tokens);
        }
    }

    fn space_operator(&self, tokens: &mut [Token], cursor: TokenCursor, value: &str, break_logical: bool) {
        let wrap = self.settings.wrap_column;

        if TIGHT_OPERATORS.contains(&value) {
            if let Some(prev) = cursor.peek(tokens, -1) {
                prev.trim_whitespace_bwd(tokens);
            }
            if let Some(next) = cursor.peek(tokens, 1) {
                next.trim_whitespace_fwd(tokens);
            }
        } else if matches!(value, "-" | "+" | "!") {
            let mut prev = cursor;
            let has_prev = prev.move_prev_significant(tokens);
            let mut next = cursor;
            let has_next = next.move_next_significant(tokens);

            let prev_kind = prev.kind(tokens);
            let next_kind = next.kind(tokens);
            let binary = has_prev
                && (prev.is_close_bracket(tokens)
                    || prev_kind == Some(TokenKind::Identifier)
                    || prev_kind.is_some_and(|k| k.is_constant()))
                && (!has_next
                    || next.is_open_bracket(tokens)
                    || !next_kind.is_some_and(|k| k.contains_operator())
                    || next_kind.is_some_and(|k| k.is_constant()));

            if binary {
                cursor.ensure_whitespace_follows(tokens, wrap);
                cursor.ensure_whitespace_precedes(tokens);
            } else {
                if let Some(after) = cursor.peek(tokens, 1) {
                    after.trim_whitespace_fwd(tokens);
                }
                // `x <- -1` keeps the space after the assignment
                if !has_prev || !prev_kind.is_some_and(|k| k.contains_operator()) {
                    if let Some(before) = cursor.peek(tokens, -1) {
                        before.trim_whitespace_bwd(tokens);
                    }
                }
            }
        } else {
            cursor.ensure_whitespace_follows(tokens, wrap);
            cursor.ensure_whitespace_precedes(tokens);
        }

        if break_logical && LOGICAL_OPERATORS.contains(&value) {
            let next_has_newline = cursor
                .peek(tokens, 1)
                .is_some_and(|n| n.has_newline(tokens));
            if !cursor.has_newline(tokens) && !next_has_newline {
                let value = format!("{}\n", cursor.value(tokens));
                cursor.set_value(tokens, value);
            }
        }
    }
}

/// What the look-ahead pass learned about a region.
#[derive(Debug, Default)]
struct RegionScan {
    /// Significant characters, counting into nested calls
    length: usize,
    commas: usize,
    equals: usize,
    keep_together: bool,
    /// Breaks forced by the contents, such as `name = function`
    breaks: Breaks,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string_utils::strip_whitespace;

    fn format(text: &str) -> String {
        Reformatter::default().reformat(text)
    }

    fn format_raw(text: &str) -> String {
        let settings = FormatterSettings {
            reindent: false,
            ..FormatterSettings::default()
        };
        Reformatter::new(settings).reformat(text)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Line breaking
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_short_call_stays_on_one_line() {
        assert_eq!(format("foo(a,b)"), "foo(a, b)");
    }

    #[test]
    fn test_long_call_breaks_after_paren_and_commas() {
        let out = format("foo(a,b,c_very_long_identifier_name_that_pushes_length_past_threshold)");
        assert_eq!(
            out,
            "foo(\n  a,\n  b,\n  c_very_long_identifier_name_that_pushes_length_past_threshold\n)"
        );
    }

    #[test]
    fn test_if_keeps_condition_on_one_line() {
        let out = format_raw("if (x) y");
        assert!(out.starts_with("if (x)"));
        assert!(!out.contains("(\n"));
    }

    #[test]
    fn test_braces_always_break() {
        assert_eq!(format("f <- function(x){x}"), "f <- function(x) {\n  x\n}");
    }

    #[test]
    fn test_anonymous_function_argument_stays_inline() {
        let out = format_raw("lapply(some_long_list_name, function(element) element + another_long_name)");
        assert!(out.starts_with("lapply(some_long_list_name, function(element)"));
    }

    #[test]
    fn test_try_catch_breaks_everywhere() {
        let out = format_raw("tryCatch(expr = compute(value), finally = cleanup(value))");
        assert!(out.starts_with("tryCatch(\n"));
        assert!(out.contains(",\n"));
    }

    #[test]
    fn test_long_if_condition_breaks_after_logical_operator() {
        let out = format_raw("if (first_condition && second_condition) x");
        assert!(out.contains("&&\n"));
        assert!(out.starts_with("if (first_condition &&"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Whitespace rules
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_binary_operators_spaced() {
        assert_eq!(format("x<-a+b*2"), "x <- a + b * 2");
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(format("if (-x < -y) z"), "if (-x < -y)\nz");
        assert_eq!(format("x<- -1"), "x <- -1");
        assert_eq!(format("y <- !done"), "y <- !done");
    }

    #[test]
    fn test_tight_operators() {
        assert_eq!(format("x $ name"), "x$name");
        assert_eq!(format("stats :: median(x)"), "stats::median(x)");
        assert_eq!(format("1 : 10"), "1:10");
    }

    #[test]
    fn test_keyword_spacing() {
        assert_eq!(format("for(i in x) print(i)"), "for (i in x)\nprint(i)");
        assert_eq!(format("while(TRUE) {\nbreak\n}"), "while (TRUE) {\n  break\n}");
    }

    #[test]
    fn test_else_on_its_own_line() {
        assert_eq!(format("if (x) y else z"), "if (x)\ny\nelse\nz");
        assert_eq!(
            format("if (x) {\na\n} else {\nb\n}"),
            "if (x) {\n  a\n} else {\n  b\n}"
        );
    }

    #[test]
    fn test_semicolons_become_newlines() {
        assert_eq!(format("a <- 1; b <- 2"), "a <- 1\nb <- 2");
    }

    #[test]
    fn test_trailing_whitespace_collapsed() {
        assert_eq!(format_raw("x <- 1   \n\n\n"), "x <- 1\n");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Robustness
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_unmatched_bracket_keeps_tokens() {
        let input = "foo(a, bar(b,";
        let out = format(input);
        assert_eq!(strip_whitespace(&out), strip_whitespace(input));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(format(""), "");
    }

    #[test]
    fn test_comment_keeps_its_newline() {
        let out = format_raw("f(a # note\n)");
        assert!(out.contains("# note\n"));
    }

    #[test]
    fn test_insert_pretty_newlines_on_buffer() {
        let mut tokens = RTokenizer::tokenize("if(x)y");
        Reformatter::default().insert_pretty_newlines(&mut tokens);
        let text: String = tokens.iter().map(Token::value).collect();
        assert_eq!(text, "if (x)\ny");
        assert_eq!(tokens.len(), RTokenizer::tokenize("if(x)y").len());
    }
}
