//! A movable position in a token buffer.
//!
//! The cursor is only an index. The buffer stays with the caller and is
//! passed to every operation, so any number of cursors can walk the same
//! tokens, and copying a cursor never copies tokens.

use crate::string_utils::{char_count, significant_len};
use crate::token::{closing_bracket, opening_bracket, Token, TokenKind};

/// Keywords that introduce control flow.
const CONTROL_FLOW: &[&str] = &[
    "if", "else", "try", "for", "while", "repeat", "break", "next", "function",
];

/// Operators that read better at the end of a wrapped line.
const WRAP_AFTER: &[&str] = &["&&", "||", "&", "|", "<-", "<<-"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCursor {
    offset: usize,
}

impl TokenCursor {
    pub fn new(offset: usize) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    pub fn token<'a>(&self, tokens: &'a [Token]) -> Option<&'a Token> {
        tokens.get(self.offset)
    }

    /// Value of the current token, empty past the end.
    pub fn value<'a>(&self, tokens: &'a [Token]) -> &'a str {
        self.token(tokens).map(Token::value).unwrap_or("")
    }

    pub fn set_value(&self, tokens: &mut [Token], value: impl Into<String>) {
        if let Some(token) = tokens.get_mut(self.offset) {
            token.set_value(value);
        }
    }

    pub fn kind(&self, tokens: &[Token]) -> Option<TokenKind> {
        self.token(tokens).map(|t| t.kind)
    }

    /// The cursor `delta` tokens away, if that is inside the buffer.
    pub fn peek(&self, tokens: &[Token], delta: isize) -> Option<TokenCursor> {
        let offset = self.offset.checked_add_signed(delta)?;
        (offset < tokens.len()).then_some(TokenCursor { offset })
    }

    pub fn previous_token<'a>(&self, tokens: &'a [Token]) -> Option<&'a Token> {
        self.peek(tokens, -1).and_then(|c| c.token(tokens))
    }

    pub fn next_token<'a>(&self, tokens: &'a [Token]) -> Option<&'a Token> {
        self.peek(tokens, 1).and_then(|c| c.token(tokens))
    }

    pub fn previous_significant<'a>(&self, tokens: &'a [Token]) -> Option<&'a Token> {
        let mut cursor = *self;
        cursor
            .move_prev_significant(tokens)
            .then(|| cursor.token(tokens))
            .flatten()
    }

    pub fn next_significant<'a>(&self, tokens: &'a [Token]) -> Option<&'a Token> {
        let mut cursor = *self;
        cursor
            .move_next_significant(tokens)
            .then(|| cursor.token(tokens))
            .flatten()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Classification
    // ─────────────────────────────────────────────────────────────────────────

    /// Whitespace-only text, including tokens emptied by earlier passes.
    pub fn is_whitespace(&self, tokens: &[Token]) -> bool {
        self.token(tokens).is_some_and(Token::is_whitespace)
    }

    pub fn is_comment(&self, tokens: &[Token]) -> bool {
        self.token(tokens).is_some_and(|t| t.kind.is_comment())
    }

    pub fn is_open_bracket(&self, tokens: &[Token]) -> bool {
        self.token(tokens).is_some_and(Token::is_open_bracket)
    }

    pub fn is_close_bracket(&self, tokens: &[Token]) -> bool {
        self.token(tokens).is_some_and(Token::is_close_bracket)
    }

    pub fn is_control_flow_keyword(&self, tokens: &[Token]) -> bool {
        CONTROL_FLOW.contains(&self.value(tokens).trim())
    }

    pub fn has_newline(&self, tokens: &[Token]) -> bool {
        self.value(tokens).contains('\n')
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Movement
    // ─────────────────────────────────────────────────────────────────────────

    pub fn move_next(&mut self, tokens: &[Token]) -> bool {
        if self.offset + 1 >= tokens.len() {
            return false;
        }
        self.offset += 1;
        true
    }

    pub fn move_prev(&mut self) -> bool {
        if self.offset == 0 {
            return false;
        }
        self.offset -= 1;
        true
    }

    /// Step to the next token that is not whitespace.
    pub fn move_next_significant(&mut self, tokens: &[Token]) -> bool {
        if !self.move_next(tokens) {
            return false;
        }
        while self.is_whitespace(tokens) {
            if !self.move_next(tokens) {
                return false;
            }
        }
        true
    }

    /// Step to the previous token that is not whitespace.
    pub fn move_prev_significant(&mut self, tokens: &[Token]) -> bool {
        if !self.move_prev() {
            return false;
        }
        while self.is_whitespace(tokens) {
            if !self.move_prev() {
                return false;
            }
        }
        true
    }

    /// Move from an opening bracket to its match.
    ///
    /// When `counter` is given it receives the significant length of every
    /// non-comment token at the top nesting level of the bracketed region,
    /// the closing bracket included. On failure the cursor does not move.
    pub fn fwd_to_matching(&mut self, tokens: &[Token], mut counter: Option<&mut usize>) -> bool {
        if !self.is_open_bracket(tokens) {
            return false;
        }
        let lhs = self.value(tokens);
        let rhs = match closing_bracket(lhs) {
            Some(rhs) => rhs,
            None => return false,
        };

        let mut nested: Vec<&str> = Vec::new();
        let mut same = 0usize;
        let mut counting = true;
        let mut cursor = *self;

        while cursor.move_next(tokens) {
            let value = cursor.value(tokens);
            if counting && !cursor.is_comment(tokens) {
                if let Some(counter) = counter.as_deref_mut() {
                    *counter += significant_len(value);
                }
            }

            if cursor.is_open_bracket(tokens) {
                nested.push(value);
                if value == lhs {
                    same += 1;
                }
                counting = false;
            } else if cursor.is_close_bracket(tokens) {
                nested.pop();
                counting = nested.is_empty();
                if value == rhs {
                    if same == 0 {
                        *self = cursor;
                        return true;
                    }
                    same -= 1;
                }
            }
        }
        false
    }

    /// Move from a closing bracket back to its match.
    pub fn bwd_to_matching(&mut self, tokens: &[Token]) -> bool {
        if !self.is_close_bracket(tokens) {
            return false;
        }
        let rhs = self.value(tokens);
        let lhs = match opening_bracket(rhs) {
            Some(lhs) => lhs,
            None => return false,
        };

        let mut same = 0usize;
        let mut cursor = *self;
        while cursor.move_prev() {
            let value = cursor.value(tokens);
            if value == rhs {
                same += 1;
            } else if value == lhs {
                if same == 0 {
                    *self = cursor;
                    return true;
                }
                same -= 1;
            }
        }
        false
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Whitespace Normalization
    // ─────────────────────────────────────────────────────────────────────────

    /// Put a newline between the previous token and this one.
    pub fn ensure_newline_precedes(&self, tokens: &mut [Token]) {
        let Some(prev) = self.peek(tokens, -1) else {
            return;
        };
        if ends_with_newline(prev.value(tokens)) || starts_with_newline(self.value(tokens)) {
            return;
        }
        let value = format!("{}\n", prev.value(tokens));
        prev.set_value(tokens, value);
    }

    /// Put a newline between this token and the next one.
    pub fn ensure_newline_follows(&self, tokens: &mut [Token]) {
        let value = self.value(tokens);
        if ends_with_newline(value) {
            return;
        }
        match self.peek(tokens, 1) {
            Some(next) => {
                if starts_with_newline(next.value(tokens)) {
                    return;
                }
                let value = format!("\n{}", next.value(tokens));
                next.set_value(tokens, value);
            }
            None => {
                let value = format!("{}\n", value);
                self.set_value(tokens, value);
            }
        }
    }

    /// Exactly one space between this token and the next.
    pub fn ensure_single_space_follows(&self, tokens: &mut [Token]) {
        let trimmed = self.value(tokens).trim_end().to_string();
        if let Some(next) = self.peek(tokens, 1) {
            let rest = next.value(tokens).trim_start().to_string();
            next.set_value(tokens, rest);
        }
        self.set_value(tokens, trimmed + " ");
    }

    /// Follow a binary operator with a space, or with a newline once the
    /// line has grown past `wrap_column`.
    pub fn ensure_whitespace_follows(&self, tokens: &mut [Token], wrap_column: usize) {
        let value = self.value(tokens);
        if WRAP_AFTER.contains(&value) && self.current_line_length(tokens) >= wrap_column {
            if let Some(next) = self.peek(tokens, 1) {
                if next.has_newline(tokens) {
                    return;
                }
            }
            let value = format!("{}\n", value);
            self.set_value(tokens, value);
            return;
        }

        let separator = if self.distance_to_previous_newline(tokens) >= wrap_column {
            "\n"
        } else {
            " "
        };
        let next_is_whitespace = self
            .peek(tokens, 1)
            .is_some_and(|next| next.is_whitespace(tokens));
        if !next_is_whitespace {
            let value = format!("{}{}", value, separator);
            self.set_value(tokens, value);
        }
    }

    pub fn ensure_whitespace_precedes(&self, tokens: &mut [Token]) {
        let prev_is_whitespace = self
            .peek(tokens, -1)
            .is_some_and(|prev| prev.is_whitespace(tokens));
        if !prev_is_whitespace {
            let value = format!(" {}", self.value(tokens));
            self.set_value(tokens, value);
        }
    }

    /// Empty this token and the whitespace tokens after it.
    pub fn trim_whitespace_fwd(&self, tokens: &mut [Token]) {
        let mut cursor = *self;
        while cursor.is_whitespace(tokens) {
            cursor.clear_whitespace(tokens);
            if !cursor.move_next(tokens) {
                return;
            }
        }
    }

    /// Empty this token and the whitespace tokens before it.
    pub fn trim_whitespace_bwd(&self, tokens: &mut [Token]) {
        let mut cursor = *self;
        while cursor.is_whitespace(tokens) {
            cursor.clear_whitespace(tokens);
            if !cursor.move_prev() {
                return;
            }
        }
    }

    /// A comment still needs the newline that ends it.
    fn clear_whitespace(&self, tokens: &mut [Token]) {
        let after_comment = self
            .previous_token(tokens)
            .is_some_and(|t| t.kind.is_comment());
        let keep = if after_comment && self.has_newline(tokens) {
            "\n"
        } else {
            ""
        };
        self.set_value(tokens, keep);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Line Metrics
    // ─────────────────────────────────────────────────────────────────────────

    /// Length of the line the current token sits on, as the tokens now read.
    pub fn current_line_length(&self, tokens: &[Token]) -> usize {
        let before = self.distance_to_previous_newline(tokens);
        let mut after = 0;
        for token in &tokens[self.offset.min(tokens.len())..] {
            match token.value().find('\n') {
                Some(index) => {
                    after += char_count(&token.value()[..index]);
                    break;
                }
                None => after += token.len(),
            }
        }
        before + after
    }

    /// Characters between the last newline before this token and the token.
    pub fn distance_to_previous_newline(&self, tokens: &[Token]) -> usize {
        let mut distance = 0;
        for token in tokens[..self.offset.min(tokens.len())].iter().rev() {
            match token.value().rfind('\n') {
                Some(index) => {
                    distance += char_count(&token.value()[index + 1..]);
                    break;
                }
                None => distance += token.len(),
            }
        }
        distance
    }
}

/// Whether only whitespace follows the last newline of `s`.
fn ends_with_newline(s: &str) -> bool {
    s[s.trim_end().len()..].contains('\n')
}

/// Whether only whitespace precedes the first newline of `s`.
fn starts_with_newline(s: &str) -> bool {
    s[..s.len() - s.trim_start().len()].contains('\n')
}
