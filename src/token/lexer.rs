//! R and R Markdown scanner
//!
//! The scanner is resumable: everything it needs to continue lexing on the
//! next row (an open string, the bracket stack, the literate region) lives in
//! a [`LexState`] the caller carries from row to row.

use super::{Token, TokenKind};
use crate::document::Position;
use regex::Regex;
use std::sync::OnceLock;

const KEYWORDS: &[&str] = &[
    "function", "if", "else", "for", "in", "while", "repeat", "break", "next", "return",
    "switch",
];

const LANGUAGE_CONSTANTS: &[&str] = &[
    "TRUE",
    "FALSE",
    "T",
    "F",
    "NULL",
    "NA",
    "NA_integer_",
    "NA_real_",
    "NA_character_",
    "NA_complex_",
    "Inf",
    "NaN",
];

/// Operators, longest first so the first match is the longest match.
const OPERATORS: &[&str] = &[
    "<<-", "->>", ":::", "::", "<-", "->", "<=", ">=", "==", "!=", "&&", "||", "|>", ":=",
    "**", "+", "-", "*", "/", "^", "<", ">", "=", "!", "&", "|", "~", "?", ":", "$", "@",
];

fn section_comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#.*(?:-{4,}|={4,}|#{4,})\s*$").expect("section comment pattern is valid")
    })
}

fn chunk_begin_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*`{3,}\s*\{.*\}\s*$").expect("chunk fence pattern is valid"))
}

fn chunk_end_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*`{3,}\s*$").expect("chunk fence pattern is valid"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Lexer State
// ─────────────────────────────────────────────────────────────────────────────

/// Which part of a document the scanner is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Region {
    /// Plain R source
    #[default]
    Code,
    /// Markdown text
    Prose,
    /// YAML header between `---` lines at the top of a literate document
    FrontMatter,
    /// Inside an executable chunk
    Chunk,
    /// Inside a non-executable fenced code block
    Verbatim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Paren,
    Brace,
    Single,
    Double,
}

/// Scanner state carried across rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexState {
    pub region: Region,
    string: Option<char>,
    brackets: Vec<Bracket>,
}

impl LexState {
    /// State at the start of an R script.
    pub fn code() -> Self {
        Self::default()
    }

    /// State at the start of a literate document.
    pub fn literate() -> Self {
        Self {
            region: Region::Prose,
            ..Self::default()
        }
    }

    /// Whether the previous row ended inside a string.
    pub fn in_string(&self) -> bool {
        self.string.is_some()
    }

    pub fn bracket_depth(&self) -> usize {
        self.brackets.len()
    }

    fn reset_code(&mut self) {
        self.string = None;
        self.brackets.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Points
// ─────────────────────────────────────────────────────────────────────────────

/// Lex R source starting at `origin`. `text` may span several rows.
pub fn lex_r(text: &str, origin: Position, state: &mut LexState) -> Vec<Token> {
    let mut scanner = Scanner::new(text, origin, state);
    scanner.run();
    scanner.tokens
}

/// Lex one row of an R Markdown document.
pub fn lex_literate_line(line: &str, row: usize, state: &mut LexState) -> Vec<Token> {
    let start = Position::row_start(row);
    let whole = |kind| {
        if line.is_empty() {
            Vec::new()
        } else {
            vec![Token::new(kind, line, start)]
        }
    };

    match state.region {
        Region::Code => lex_r(line, start, state),
        Region::Chunk => {
            if chunk_end_regex().is_match(line) {
                state.region = Region::Prose;
                state.reset_code();
                whole(TokenKind::CodeEnd)
            } else {
                lex_r(line, start, state)
            }
        }
        Region::FrontMatter => {
            if matches!(line.trim_end(), "---" | "...") {
                state.region = Region::Prose;
            }
            whole(TokenKind::Prose)
        }
        Region::Verbatim => {
            if is_plain_fence(line) {
                state.region = Region::Prose;
            }
            whole(TokenKind::Prose)
        }
        Region::Prose => {
            if row == 0 && line.trim_end() == "---" {
                state.region = Region::FrontMatter;
                whole(TokenKind::Prose)
            } else if chunk_begin_regex().is_match(line) {
                state.region = Region::Chunk;
                state.reset_code();
                whole(TokenKind::CodeBegin)
            } else if is_plain_fence(line) {
                state.region = Region::Verbatim;
                whole(TokenKind::Prose)
            } else if let Some(level) = heading_level(line) {
                whole(TokenKind::Heading(level))
            } else if line.trim().is_empty() {
                Vec::new()
            } else {
                whole(TokenKind::Prose)
            }
        }
    }
}

fn is_plain_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Level of an ATX heading (`#` to `######` followed by a space).
pub(crate) fn heading_level(line: &str) -> Option<u8> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    Some(hashes as u8)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scanner
// ─────────────────────────────────────────────────────────────────────────────

struct Scanner<'a> {
    chars: Vec<char>,
    index: usize,
    row: usize,
    column: usize,
    tokens: Vec<Token>,
    state: &'a mut LexState,
}

impl<'a> Scanner<'a> {
    fn new(text: &str, origin: Position, state: &'a mut LexState) -> Self {
        Self {
            chars: text.chars().collect(),
            index: 0,
            row: origin.row,
            column: origin.column,
            tokens: Vec::new(),
            state,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    /// Length of the run starting at `from` whose chars satisfy `pred`.
    fn run_len(&self, from: usize, pred: impl Fn(char) -> bool) -> usize {
        self.chars[from.min(self.chars.len())..]
            .iter()
            .take_while(|&&c| pred(c))
            .count()
    }

    /// Consume `len` chars into a token.
    fn emit(&mut self, kind: TokenKind, len: usize) {
        let end = (self.index + len).min(self.chars.len());
        let position = Position::new(self.row, self.column);
        let value: String = self.chars[self.index..end].iter().collect();
        for &c in &self.chars[self.index..end] {
            if c == '\n' {
                self.row += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.index = end;
        self.tokens.push(Token::new(kind, value, position));
    }

    fn run(&mut self) {
        while self.index < self.chars.len() {
            if let Some(quote) = self.state.string {
                let (len, closed) = self.string_body_len(self.index, quote);
                self.emit(TokenKind::String, len);
                if closed {
                    self.state.string = None;
                }
                continue;
            }

            let c = self.chars[self.index];
            match c {
                _ if c.is_whitespace() => {
                    let len = self.run_len(self.index, char::is_whitespace);
                    self.emit(TokenKind::Text, len);
                }
                '#' => self.comment(),
                '"' | '\'' => {
                    let (len, closed) = self.string_body_len(self.index + 1, c);
                    self.emit(TokenKind::String, len + 1);
                    if !closed {
                        self.state.string = Some(c);
                    }
                }
                '`' => {
                    let body = self.run_len(self.index + 1, |c| c != '`' && c != '\n');
                    let closing = usize::from(self.peek(body + 1) == Some('`'));
                    self.emit(TokenKind::Identifier, body + 1 + closing);
                }
                _ if c.is_ascii_digit()
                    || (c == '.' && self.peek(1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    self.number()
                }
                _ if c.is_alphabetic() || c == '.' || c == '_' => self.identifier(),
                '%' => {
                    let body = self.run_len(self.index + 1, |c| c != '%' && c != '\n');
                    if self.peek(body + 1) == Some('%') {
                        self.emit(TokenKind::InfixOperator, body + 2);
                    } else {
                        self.emit(TokenKind::Operator, 1);
                    }
                }
                '(' | ')' | '{' | '}' | '[' | ']' => self.bracket(c),
                _ => self.operator_or_text(),
            }
        }
    }

    /// Length of a string body starting at `from`, and whether the closing
    /// quote was found.
    fn string_body_len(&self, from: usize, quote: char) -> (usize, bool) {
        let mut j = from;
        while j < self.chars.len() {
            match self.chars[j] {
                '\\' => j += 2,
                c if c == quote => return (j + 1 - from, true),
                _ => j += 1,
            }
        }
        (self.chars.len() - from.min(self.chars.len()), false)
    }

    fn comment(&mut self) {
        let len = self.run_len(self.index, |c| c != '\n');
        let text: String = self.chars[self.index..self.index + len].iter().collect();
        let kind = if section_comment_regex().is_match(&text) {
            TokenKind::SectionComment
        } else {
            TokenKind::Comment
        };
        self.emit(kind, len);
    }

    fn number(&mut self) {
        let mut len;
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X')) {
            len = 2 + self.run_len(self.index + 2, |c| c.is_ascii_hexdigit());
        } else {
            len = self.run_len(self.index, |c| c.is_ascii_digit());
            if self.peek(len) == Some('.') {
                len += 1 + self.run_len(self.index + len + 1, |c| c.is_ascii_digit());
            }
            if matches!(self.peek(len), Some('e' | 'E')) {
                let sign = usize::from(matches!(self.peek(len + 1), Some('+' | '-')));
                let digits = self.run_len(self.index + len + 1 + sign, |c| c.is_ascii_digit());
                if digits > 0 {
                    len += 1 + sign + digits;
                }
            }
        }
        if matches!(self.peek(len), Some('L' | 'i')) {
            len += 1;
        }
        self.emit(TokenKind::Numeric, len);
    }

    fn identifier(&mut self) {
        let len = self.run_len(self.index, |c| c.is_alphanumeric() || c == '.' || c == '_');
        let word: String = self.chars[self.index..self.index + len].iter().collect();
        let kind = if KEYWORDS.contains(&word.as_str()) {
            TokenKind::Keyword
        } else if LANGUAGE_CONSTANTS.contains(&word.as_str()) {
            TokenKind::LanguageConstant
        } else {
            TokenKind::Identifier
        };
        self.emit(kind, len);
    }

    fn bracket(&mut self, c: char) {
        let brackets = &mut self.state.brackets;
        let len = match c {
            '(' => {
                brackets.push(Bracket::Paren);
                1
            }
            '{' => {
                brackets.push(Bracket::Brace);
                1
            }
            '[' if self.chars.get(self.index + 1) == Some(&'[') => {
                brackets.push(Bracket::Double);
                2
            }
            '[' => {
                brackets.push(Bracket::Single);
                1
            }
            ')' => {
                pop_if(brackets, Bracket::Paren);
                1
            }
            '}' => {
                pop_if(brackets, Bracket::Brace);
                1
            }
            _ => {
                if brackets.last() == Some(&Bracket::Double)
                    && self.chars.get(self.index + 1) == Some(&']')
                {
                    brackets.pop();
                    2
                } else {
                    pop_if(brackets, Bracket::Single);
                    1
                }
            }
        };
        self.emit(TokenKind::Paren, len);
    }

    fn operator_or_text(&mut self) {
        let rest = &self.chars[self.index..];
        let matched = OPERATORS.iter().find(|op| {
            let mut chars = op.chars();
            let len = op.chars().count();
            rest.len() >= len && rest[..len].iter().all(|&c| Some(c) == chars.next())
        });
        match matched {
            Some(op) => {
                let len = op.chars().count();
                self.emit(TokenKind::Operator, len)
            }
            None => self.emit(TokenKind::Text, 1),
        }
    }
}

fn pop_if(brackets: &mut Vec<Bracket>, expected: Bracket) {
    if brackets.last() == Some(&expected) {
        brackets.pop();
    }
}
