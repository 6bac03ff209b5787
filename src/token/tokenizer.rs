//! Selection and document tokenizers.

use super::lexer::{lex_literate_line, lex_r, LexState};
use super::Token;
use crate::document::{Document, Position};
use log::trace;
use std::path::Path;

// ─────────────────────────────────────────────────────────────────────────────
// Selection Tokenizer
// ─────────────────────────────────────────────────────────────────────────────

/// Tokenizes a free-standing piece of R source, such as an editor selection.
///
/// Whitespace runs may contain newlines, so concatenating the token values
/// reproduces the input exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct RTokenizer;

impl RTokenizer {
    pub fn tokenize(text: &str) -> Vec<Token> {
        lex_r(text, Position::default(), &mut LexState::code())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Tokenizer
// ─────────────────────────────────────────────────────────────────────────────

/// Source language of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flavor {
    #[default]
    RScript,
    /// R Markdown and Quarto: Markdown prose with executable chunks
    RMarkdown,
}

impl Flavor {
    /// Pick a flavor from a file extension (`.Rmd`, `.qmd` and `.md` are
    /// literate, everything else is treated as R).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("rmd" | "qmd" | "md" | "rmarkdown") => Flavor::RMarkdown,
            _ => Flavor::RScript,
        }
    }

    fn initial_state(&self) -> LexState {
        match self {
            Flavor::RScript => LexState::code(),
            Flavor::RMarkdown => LexState::literate(),
        }
    }
}

#[derive(Debug)]
struct RowTokens {
    tokens: Vec<Token>,
    end_state: LexState,
}

/// Per-row tokens of a document, lexed lazily and cached.
///
/// Row `n` can only be lexed once row `n - 1` has been, because its start
/// state is the previous row's end state. Edits invalidate the cache from
/// the edited row on.
#[derive(Debug, Default)]
pub struct DocumentTokenizer {
    flavor: Flavor,
    rows: Vec<RowTokens>,
}

impl DocumentTokenizer {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            rows: Vec::new(),
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Number of rows with cached tokens.
    pub fn cached_rows(&self) -> usize {
        self.rows.len()
    }

    /// Forget every row from `row` on.
    pub fn invalidate_from(&mut self, row: usize) {
        if row < self.rows.len() {
            trace!("Dropping cached tokens for rows {}..{}", row, self.rows.len());
        }
        self.rows.truncate(row);
    }

    /// Tokens of `row`, lexing any uncached rows before it first. Rows
    /// outside the document have no tokens.
    pub fn row_tokens<D: Document + ?Sized>(&mut self, doc: &D, row: usize) -> &[Token] {
        if row >= doc.row_count() {
            return &[];
        }
        while self.rows.len() <= row {
            let next = self.rows.len();
            let mut state = self
                .rows
                .last()
                .map(|r| r.end_state.clone())
                .unwrap_or_else(|| self.flavor.initial_state());
            let line = doc.line(next).unwrap_or("");
            let tokens = match self.flavor {
                Flavor::RScript => lex_r(line, Position::row_start(next), &mut state),
                Flavor::RMarkdown => lex_literate_line(line, next, &mut state),
            };
            self.rows.push(RowTokens {
                tokens,
                end_state: state,
            });
        }
        &self.rows[row].tokens
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Iterator
// ─────────────────────────────────────────────────────────────────────────────

/// A movable cursor over a document's tokens, across rows.
pub struct TokenIterator<'a, D: Document + ?Sized> {
    tokenizer: &'a mut DocumentTokenizer,
    doc: &'a D,
    row: usize,
    index: usize,
    valid: bool,
}

impl<'a, D: Document + ?Sized> TokenIterator<'a, D> {
    pub fn new(tokenizer: &'a mut DocumentTokenizer, doc: &'a D) -> Self {
        Self {
            tokenizer,
            doc,
            row: 0,
            index: 0,
            valid: false,
        }
    }

    /// Move to the token covering `pos`. Fails when `pos` lies between
    /// tokens or outside the document.
    pub fn seek(&mut self, pos: Position) -> bool {
        let tokens = self.tokenizer.row_tokens(self.doc, pos.row);
        let found = tokens.iter().position(|t| {
            let start = t.position();
            start <= pos && (pos < t.end() || (t.is_empty() && start == pos))
        });
        match found {
            Some(index) => self.place(pos.row, index),
            None => self.valid = false,
        }
        self.valid
    }

    /// Move to the first token starting at or after `pos`, or covering it.
    /// Fails only when no token follows `pos` anywhere in the document.
    pub fn seek_at_or_after(&mut self, pos: Position) -> bool {
        let rows = self.doc.row_count();
        let mut row = pos.row;
        while row < rows {
            let tokens = self.tokenizer.row_tokens(self.doc, row);
            let found = tokens.iter().position(|t| row > pos.row || t.end() > pos);
            if let Some(index) = found {
                self.place(row, index);
                return true;
            }
            row += 1;
        }
        self.valid = false;
        false
    }

    pub fn move_next(&mut self) -> bool {
        if !self.valid {
            return false;
        }
        if self.index + 1 < self.tokenizer.row_tokens(self.doc, self.row).len() {
            self.index += 1;
            return true;
        }
        let rows = self.doc.row_count();
        let mut row = self.row + 1;
        while row < rows {
            if !self.tokenizer.row_tokens(self.doc, row).is_empty() {
                self.place(row, 0);
                return true;
            }
            row += 1;
        }
        self.valid = false;
        false
    }

    pub fn move_prev(&mut self) -> bool {
        if !self.valid {
            return false;
        }
        if self.index > 0 {
            self.index -= 1;
            return true;
        }
        let mut row = self.row;
        while row > 0 {
            row -= 1;
            let len = self.tokenizer.row_tokens(self.doc, row).len();
            if len > 0 {
                self.place(row, len - 1);
                return true;
            }
        }
        self.valid = false;
        false
    }

    /// The token under the iterator, if it points at one.
    pub fn current(&mut self) -> Option<&Token> {
        if !self.valid {
            return None;
        }
        self.tokenizer.row_tokens(self.doc, self.row).get(self.index)
    }

    pub fn row(&self) -> usize {
        self.row
    }

    fn place(&mut self, row: usize, index: usize) {
        self.row = row;
        self.index = index;
        self.valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextDocument;
    use crate::token::TokenKind;

    #[test]
    fn test_tokenize_reproduces_text() {
        let text = "f <- function(x,\n  y) {\n  x + y\n}\n";
        let joined: String = RTokenizer::tokenize(text)
            .iter()
            .map(|t| t.value().to_string())
            .collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_flavor_from_path() {
        assert_eq!(Flavor::from_path(Path::new("report.Rmd")), Flavor::RMarkdown);
        assert_eq!(Flavor::from_path(Path::new("doc.qmd")), Flavor::RMarkdown);
        assert_eq!(Flavor::from_path(Path::new("script.R")), Flavor::RScript);
        assert_eq!(Flavor::from_path(Path::new("noext")), Flavor::RScript);
    }

    #[test]
    fn test_row_tokens_carry_state() {
        let doc = TextDocument::from_text("x <- \"multi\nline\" ; y");
        let mut tokenizer = DocumentTokenizer::new(Flavor::RScript);
        let second = tokenizer.row_tokens(&doc, 1).to_vec();
        assert_eq!(second[0].kind, TokenKind::String);
        assert_eq!(second[0].value(), "line\"");
        assert_eq!(tokenizer.cached_rows(), 2);
        assert!(tokenizer.row_tokens(&doc, 5).is_empty());
    }

    #[test]
    fn test_invalidate_from_truncates_cache() {
        let doc = TextDocument::from_text("a\nb\nc");
        let mut tokenizer = DocumentTokenizer::new(Flavor::RScript);
        tokenizer.row_tokens(&doc, 2);
        tokenizer.invalidate_from(1);
        assert_eq!(tokenizer.cached_rows(), 1);
    }

    #[test]
    fn test_iterator_walks_across_rows() {
        let doc = TextDocument::from_text("a <- 1\n\nb");
        let mut tokenizer = DocumentTokenizer::new(Flavor::RScript);
        let mut it = TokenIterator::new(&mut tokenizer, &doc);
        assert!(it.seek(Position::new(0, 2)));
        assert_eq!(it.current().map(|t| t.value().to_string()), Some("<-".into()));
        assert!(it.move_next());
        assert!(it.move_next());
        assert!(it.move_next());
        assert_eq!(it.current().map(|t| t.value().to_string()), Some("b".into()));
        assert_eq!(it.row(), 2);
        assert!(!it.move_next());
        assert!(it.current().is_none());
    }

    #[test]
    fn test_iterator_moves_back() {
        let doc = TextDocument::from_text("a\n\nb");
        let mut tokenizer = DocumentTokenizer::new(Flavor::RScript);
        let mut it = TokenIterator::new(&mut tokenizer, &doc);
        assert!(it.seek(Position::new(2, 0)));
        assert!(it.move_prev());
        assert_eq!(it.current().map(|t| t.value().to_string()), Some("a".into()));
        assert!(!it.move_prev());
    }

    #[test]
    fn test_seek_at_or_after_skips_empty_rows() {
        let doc = TextDocument::from_text("a\n\n\nb");
        let mut tokenizer = DocumentTokenizer::new(Flavor::RScript);
        let mut it = TokenIterator::new(&mut tokenizer, &doc);
        assert!(!it.seek(Position::new(1, 0)));
        assert!(it.seek_at_or_after(Position::new(1, 0)));
        assert_eq!(it.row(), 3);
        assert!(!it.seek_at_or_after(Position::new(3, 1)));
    }
}
