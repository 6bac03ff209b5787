//! Per-token scope building for R and R Markdown.

use super::tree::{Scope, ScopeKind, ScopeTree};
use crate::chunks::ChunkOptions;
use crate::document::Position;
use crate::token::{Token, TokenKind};

/// The per-token hook a rebuild drives.
///
/// A rebuild may restart from any row, so `begin` must drop whatever
/// transient state the builder carried and rely only on the tree's open
/// scopes. A builder whose state runs across rows (a definition split over
/// several lines) reports through `resume_row` where a rebuild has to start
/// instead, so that feeding the tokens after `begin` yields the same tree.
pub trait ScopeBuilder {
    /// Called once before the first token of a rebuild starting at `start`.
    fn begin(&mut self, start: Position, tree: &ScopeTree);

    /// Earliest row at or before `row` from which a rebuild sees every token
    /// the state carried into `row` depends on.
    fn resume_row(&self, row: usize) -> usize {
        row
    }

    fn on_token(&mut self, token: &Token, position: Position, tree: &mut ScopeTree);

    /// Called once when the rebuild reaches the end of the document.
    fn finish(&mut self, _end: Position, _tree: &mut ScopeTree) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// R Scope Builder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum FunctionStage {
    /// Saw `function`, waiting for `(`
    ExpectArgs,
    /// Inside the argument list
    Args { depth: usize, expect_name: bool },
    /// Argument list closed, waiting for `{`
    ExpectBody,
}

#[derive(Debug, Clone)]
struct PendingFunction {
    name: Option<String>,
    preamble: Position,
    args: Vec<String>,
    stage: FunctionStage,
}

/// Scope builder for R scripts and the chunks of R Markdown documents.
#[derive(Debug, Default)]
pub struct RScopeBuilder {
    /// The last two significant tokens, most recent last
    recent: Vec<(TokenKind, String, Position)>,
    pending: Option<PendingFunction>,
    /// Rows `(first, last)` where state started on `first` was still live at
    /// a token on `last`. A rebuild starting inside `first + 1..=last` would
    /// lose it.
    carried: Vec<(usize, usize)>,
}

impl RScopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row of the earliest token the transient state still depends on: the
    /// preamble of a pending function, or the name of a `name <-` that a
    /// following `function` would take.
    fn state_origin(&self) -> Option<usize> {
        let head = match self.recent.as_slice() {
            [(_, _, name_pos), (TokenKind::Operator, op, _)]
                if matches!(op.as_str(), "<-" | "=" | "<<-") =>
            {
                Some(name_pos.row)
            }
            _ => None,
        };
        self.pending
            .as_ref()
            .map(|p| p.preamble.row)
            .into_iter()
            .chain(head)
            .min()
    }

    /// Note that the current state reaches `row`.
    fn carry_to(&mut self, row: usize) {
        let Some(first) = self.state_origin().filter(|&first| first < row) else {
            return;
        };
        match self.carried.last_mut() {
            Some(span) if span.0 == first => span.1 = span.1.max(row),
            _ => self.carried.push((first, row)),
        }
    }

    fn remember(&mut self, token: &Token, position: Position) {
        if self.recent.len() == 2 {
            self.recent.remove(0);
        }
        self.recent
            .push((token.kind, token.value().to_string(), position));
    }

    /// Name and preamble of a function introduced by `function` at
    /// `position`: `name <- function` and `name = function` are named.
    fn function_head(&self, position: Position) -> (Option<String>, Position) {
        if let [(name_kind, name, name_pos), (TokenKind::Operator, op, _)] = self.recent.as_slice() {
            if matches!(op.as_str(), "<-" | "=" | "<<-") {
                let name = match name_kind {
                    TokenKind::Identifier => Some(name.trim_matches('`').to_string()),
                    TokenKind::String => Some(name.trim_matches(['"', '\'']).to_string()),
                    _ => None,
                };
                if name.is_some() {
                    return (name, *name_pos);
                }
            }
        }
        (None, position)
    }

    /// Advance a pending function definition. Returns true when the token
    /// was consumed by it.
    fn advance_function(&mut self, token: &Token, tree: &mut ScopeTree) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        match &mut pending.stage {
            FunctionStage::ExpectArgs => {
                if token.is("(") {
                    pending.stage = FunctionStage::Args {
                        depth: 1,
                        expect_name: true,
                    };
                    true
                } else {
                    self.pending = None;
                    false
                }
            }
            FunctionStage::Args { depth, expect_name } => {
                match token.value() {
                    "(" | "[" | "[[" | "{" if token.kind == TokenKind::Paren => *depth += 1,
                    ")" | "]" | "]]" | "}" if token.kind == TokenKind::Paren => {
                        *depth -= 1;
                        if *depth == 0 {
                            pending.stage = FunctionStage::ExpectBody;
                            return true;
                        }
                    }
                    "," if *depth == 1 => *expect_name = true,
                    _ => {
                        if *depth == 1 && *expect_name && token.kind == TokenKind::Identifier {
                            pending.args.push(token.value().trim_matches('`').to_string());
                        }
                        *expect_name = false;
                    }
                }
                true
            }
            FunctionStage::ExpectBody => {
                if token.is("{") && token.kind == TokenKind::Paren {
                    let Some(done) = self.pending.take() else {
                        return false;
                    };
                    tree.push(
                        ScopeKind::Function {
                            name: done.name,
                            args: done.args,
                        },
                        done.preamble,
                        token.end(),
                    );
                    true
                } else {
                    self.pending = None;
                    false
                }
            }
        }
    }

    /// Open a section at `level`, first closing open sections at the same or a
    /// deeper level. Sections never open inside braces or functions.
    fn open_section(
        &mut self,
        label: String,
        level: u8,
        token: &Token,
        position: Position,
        tree: &mut ScopeTree,
    ) {
        let inside_code = tree
            .open_scopes()
            .iter()
            .any(|&id| matches!(tree.scope(id).kind, ScopeKind::Brace | ScopeKind::Function { .. }));
        if inside_code {
            return;
        }
        let boundary = Position::row_start(position.row);
        loop {
            let top = tree.current_open();
            let deeper = matches!(
                tree.scope(top).kind,
                ScopeKind::Section { level: open_level, .. } if open_level >= level
            );
            if !deeper {
                break;
            }
            tree.close(top, boundary);
        }
        tree.push(
            ScopeKind::Section { label, level },
            position,
            token.end(),
        );
    }

    fn close_brace(&mut self, token: &Token, tree: &mut ScopeTree) {
        let target = tree
            .open_scopes()
            .iter()
            .rev()
            .copied()
            .take_while(|&id| !tree.scope(id).is_chunk())
            .find(|&id| {
                let scope = tree.scope(id);
                scope.is_brace() || scope.is_function()
            });
        if let Some(id) = target {
            tree.close(id, token.end());
        }
    }
}

impl ScopeBuilder for RScopeBuilder {
    fn begin(&mut self, start: Position, _tree: &ScopeTree) {
        self.recent.clear();
        self.pending = None;
        self.carried.retain(|&(_, last)| last < start.row);
    }

    fn resume_row(&self, row: usize) -> usize {
        // State still live after the last token reaches every later row
        let live = self.state_origin().map(|first| (first, usize::MAX));
        let mut row = row;
        loop {
            let pulled = self
                .carried
                .iter()
                .copied()
                .chain(live)
                .filter(|&(first, last)| first < row && row <= last)
                .map(|(first, _)| first)
                .min()
                .unwrap_or(row);
            if pulled == row {
                return row;
            }
            row = pulled;
        }
    }

    fn on_token(&mut self, token: &Token, position: Position, tree: &mut ScopeTree) {
        if token.is_whitespace() || token.kind == TokenKind::Comment {
            return;
        }
        self.carry_to(position.row);

        if !self.advance_function(token, tree) {
            match token.kind {
                TokenKind::Keyword if token.is("function") => {
                    let (name, preamble) = self.function_head(position);
                    self.pending = Some(PendingFunction {
                        name,
                        preamble,
                        args: Vec::new(),
                        stage: FunctionStage::ExpectArgs,
                    });
                }
                TokenKind::Paren if token.is("{") => {
                    tree.push(ScopeKind::Brace, position, token.end());
                }
                TokenKind::Paren if token.is("}") => self.close_brace(token, tree),
                TokenKind::SectionComment => {
                    let hashes = token.value().chars().take_while(|&c| c == '#').count();
                    let label = section_label(token.value());
                    self.open_section(label, hashes.clamp(1, 6) as u8, token, position, tree);
                }
                TokenKind::Heading(level) => {
                    let label = heading_label(token.value());
                    self.open_section(label, level, token, position, tree);
                }
                TokenKind::CodeBegin => {
                    let header = token.value().to_string();
                    let label = ChunkOptions::parse_header(&header).label;
                    tree.push(
                        ScopeKind::Chunk { label, header },
                        position,
                        token.end(),
                    );
                }
                TokenKind::CodeEnd => {
                    tree.close_innermost(Scope::is_chunk, token.end());
                }
                _ => {}
            }
        }

        self.remember(token, position);
        self.carry_to(position.row);
    }

    fn finish(&mut self, end: Position, tree: &mut ScopeTree) {
        self.carry_to(end.row);
        self.recent.clear();
        loop {
            let top = tree.current_open();
            if !tree.scope(top).is_section() {
                break;
            }
            tree.close(top, end);
        }
        self.pending = None;
    }
}

/// Label of an R section comment: `## Load data ----` gives `Load data`.
pub(crate) fn section_label(comment: &str) -> String {
    comment
        .trim_start_matches('#')
        .trim_end()
        .trim_end_matches(['-', '=', '#'])
        .trim()
        .to_string()
}

/// Label of a Markdown heading: `## Results ##` gives `Results`.
pub(crate) fn heading_label(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_end_matches('#')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, TextDocument};
    use crate::token::{DocumentTokenizer, Flavor};

    fn build(text: &str, flavor: Flavor) -> ScopeTree {
        let doc = TextDocument::from_text(text);
        let mut tokenizer = DocumentTokenizer::new(flavor);
        let mut tree = ScopeTree::new();
        let mut builder = RScopeBuilder::new();
        builder.begin(Position::default(), &tree);
        for row in 0..doc.row_count() {
            for token in tokenizer.row_tokens(&doc, row).to_vec() {
                builder.on_token(&token, token.position(), &mut tree);
            }
        }
        builder.finish(Position::new(doc.row_count(), 0), &mut tree);
        tree
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Functions and Braces
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_named_function() {
        let tree = build("add <- function(x, y = 2) {\n  x + y\n}\n", Flavor::RScript);
        let (_, f) = tree.scopes().nth(1).unwrap();
        assert_eq!(
            f.kind,
            ScopeKind::Function {
                name: Some("add".into()),
                args: vec!["x".into(), "y".into()],
            }
        );
        assert_eq!(f.preamble, Position::new(0, 0));
        assert_eq!(f.body_start, Position::new(0, 27));
        assert_eq!(f.end, Some(Position::new(2, 1)));
    }

    #[test]
    fn test_anonymous_function_and_nested_brace() {
        let tree = build("lapply(x, function(i) {\n  if (i) {\n    i\n  }\n})", Flavor::RScript);
        assert_eq!(tree.len(), 3);
        let (fid, f) = tree.scopes().nth(1).unwrap();
        assert!(matches!(&f.kind, ScopeKind::Function { name: None, args } if args == &["i"]));
        assert_eq!(f.preamble, Position::new(0, 10));
        let (_, brace) = tree.scopes().nth(2).unwrap();
        assert!(brace.is_brace());
        assert_eq!(brace.parent, Some(fid));
        assert_eq!(brace.end, Some(Position::new(3, 3)));
    }

    #[test]
    fn test_function_without_braces_opens_nothing() {
        let tree = build("sq <- function(x) x^2\ny <- 1", Flavor::RScript);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_arguments_spanning_rows() {
        let tree = build("f <- function(a,\n              b)\n{\n  a\n}", Flavor::RScript);
        let (_, f) = tree.scopes().nth(1).unwrap();
        assert!(matches!(&f.kind, ScopeKind::Function { args, .. } if args == &["a", "b"]));
        assert_eq!(f.preamble, Position::new(0, 0));
        assert_eq!(f.body_start, Position::new(2, 1));
    }

    #[test]
    fn test_unmatched_close_brace_is_ignored() {
        let tree = build("}\nx <- {\n1\n", Flavor::RScript);
        assert_eq!(tree.len(), 2);
        let (_, brace) = tree.scopes().nth(1).unwrap();
        assert_eq!(brace.end, None);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sections and Chunks
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_section_comments_nest_by_level() {
        let tree = build(
            "# Setup ----\nx <- 1\n## Detail ----\ny <- 2\n# Next ----\n",
            Flavor::RScript,
        );
        let sections: Vec<_> = tree.scopes().skip(1).map(|(_, s)| s.clone()).collect();
        assert_eq!(sections.len(), 3);
        assert_eq!(
            sections[0].kind,
            ScopeKind::Section {
                label: "Setup".into(),
                level: 1
            }
        );
        assert_eq!(sections[0].end, Some(Position::new(4, 0)));
        assert_eq!(sections[1].parent.map(|p| p.index()), Some(1));
        assert_eq!(sections[1].end, Some(Position::new(4, 0)));
        assert_eq!(sections[2].parent.map(|p| p.index()), Some(0));
        assert_eq!(sections[2].end, Some(Position::new(6, 0)));
    }

    #[test]
    fn test_section_comment_inside_function_is_plain() {
        let tree = build("f <- function() {\n  # inner ----\n}", Flavor::RScript);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_chunks_under_headings() {
        let text = "# Intro\n\n```{r setup, include=FALSE}\nf <- function() {\n```\n\n## Plot\n```{python}\nx = 1\n```\n";
        let tree = build(text, Flavor::RMarkdown);
        let chunks: Vec<_> = tree.chunks().map(|(_, s)| s.clone()).collect();
        assert_eq!(chunks.len(), 2);
        assert!(matches!(&chunks[0].kind, ScopeKind::Chunk { label: Some(l), .. } if l == "setup"));
        assert_eq!(chunks[0].preamble, Position::new(2, 0));
        assert_eq!(chunks[0].end, Some(Position::new(4, 3)));
        assert_eq!(chunks[1].end, Some(Position::new(9, 3)));

        // The unterminated function brace is closed with its chunk.
        let function = tree.scopes().find(|(_, s)| s.is_function()).map(|(_, s)| s.clone());
        assert_eq!(function.and_then(|f| f.end), Some(Position::new(4, 3)));

        let plot = tree
            .scopes()
            .find(|(_, s)| matches!(&s.kind, ScopeKind::Section { label, .. } if label == "Plot"))
            .map(|(id, _)| id);
        assert!(plot.is_some());
        assert_eq!(tree.scope(tree.scope_at(Position::new(8, 0))).parent, plot);
    }

    #[test]
    fn test_labels() {
        assert_eq!(section_label("## Load data ----"), "Load data");
        assert_eq!(section_label("# Tidy ===="), "Tidy");
        assert_eq!(heading_label("## Results ##"), "Results");
    }
}
