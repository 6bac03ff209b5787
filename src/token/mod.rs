//! Tokens and tokenizers
//!
//! An R scanner with a carried lexer state, a selection tokenizer for the
//! reformatter and a cached per-row document tokenizer for the scope
//! tracker.

mod lexer;
mod tokenizer;

pub use lexer::{LexState, Region};
pub use tokenizer::{DocumentTokenizer, Flavor, RTokenizer, TokenIterator};

use crate::document::Position;
use crate::string_utils::char_count;

// ─────────────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────────────

/// Lexical role of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Whitespace and unclassified punctuation (`,` and `;` among them)
    Text,
    Identifier,
    Keyword,
    Operator,
    /// User-defined `%op%` operators
    InfixOperator,
    /// `( ) [ ] [[ ]] { }`
    Paren,
    Numeric,
    LanguageConstant,
    String,
    Comment,
    /// A comment ending in four or more `-`, `=` or `#`
    SectionComment,
    /// The opening fence of a literate chunk, one token per fence line
    CodeBegin,
    /// The closing fence of a literate chunk
    CodeEnd,
    /// A Markdown ATX heading, one token per line
    Heading(u8),
    /// Markdown text outside chunks
    Prose,
}

impl TokenKind {
    /// Dotted type name in the style editor highlighters use.
    pub fn type_name(&self) -> &'static str {
        match self {
            TokenKind::Text => "text",
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword => "keyword",
            TokenKind::Operator => "keyword.operator",
            TokenKind::InfixOperator => "keyword.operator.infix",
            TokenKind::Paren => "paren.keyword.operator",
            TokenKind::Numeric => "constant.numeric",
            TokenKind::LanguageConstant => "constant.language",
            TokenKind::String => "string",
            TokenKind::Comment => "comment",
            TokenKind::SectionComment => "comment.sectionhead",
            TokenKind::CodeBegin => "support.function.codebegin",
            TokenKind::CodeEnd => "support.function.codeend",
            TokenKind::Heading(_) => "markup.heading",
            TokenKind::Prose => "text.prose",
        }
    }

    /// Whether the kind's type name carries `operator`.
    pub fn contains_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Operator | TokenKind::InfixOperator | TokenKind::Paren
        )
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, TokenKind::Operator | TokenKind::InfixOperator)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, TokenKind::Numeric | TokenKind::LanguageConstant)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::SectionComment)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────────────

/// A lexical unit. The position is fixed when the token is produced; the
/// value can be rewritten to stage replacement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    value: String,
    position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            value: value.into(),
            position,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Position just past the token's original text, assuming the value has
    /// not been rewritten.
    pub fn end(&self) -> Position {
        let mut row = self.position.row;
        let mut column = self.position.column;
        for c in self.value.chars() {
            if c == '\n' {
                row += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        Position::new(row, column)
    }

    pub fn len(&self) -> usize {
        char_count(&self.value)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Whitespace-only `Text`. An emptied token counts as whitespace.
    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Text && self.value.chars().all(char::is_whitespace)
    }

    pub fn is(&self, value: &str) -> bool {
        self.value == value
    }

    pub fn is_open_bracket(&self) -> bool {
        self.kind == TokenKind::Paren && matches!(self.value.as_str(), "(" | "[" | "[[" | "{")
    }

    pub fn is_close_bracket(&self) -> bool {
        self.kind == TokenKind::Paren && matches!(self.value.as_str(), ")" | "]" | "]]" | "}")
    }
}

/// Complement of an opening bracket.
pub fn closing_bracket(open: &str) -> Option<&'static str> {
    match open {
        "(" => Some(")"),
        "[" => Some("]"),
        "[[" => Some("]]"),
        "{" => Some("}"),
        _ => None,
    }
}

/// Complement of a closing bracket.
pub fn opening_bracket(close: &str) -> Option<&'static str> {
    match close {
        ")" => Some("("),
        "]" => Some("["),
        "]]" => Some("[["),
        "}" => Some("{"),
        _ => None,
    }
}
