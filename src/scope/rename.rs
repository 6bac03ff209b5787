//! Rename-in-scope and scope labels.

use super::builder::ScopeBuilder;
use super::tracker::ScopeTracker;
use super::tree::{ScopeId, ScopeKind, ScopeTree};
use crate::document::{Document, Position, Range};
use crate::token::{DocumentTokenizer, TokenIterator, TokenKind};

/// Operators after which an identifier names a member, not a variable.
const MEMBER_ACCESS: &[&str] = &["$", "@", "::", ":::"];

/// Ranges of every occurrence of the identifier under `pos` within its
/// innermost enclosing function (the whole document at top level).
///
/// Member accesses such as `x$name` are skipped. Returns nothing when `pos`
/// is not on an identifier.
pub fn occurrences_in_scope<B, D>(tracker: &ScopeTracker<B>, doc: &D, pos: Position) -> Vec<Range>
where
    B: ScopeBuilder,
    D: Document + ?Sized,
{
    let mut tokenizer = DocumentTokenizer::new(tracker.flavor());
    let mut it = TokenIterator::new(&mut tokenizer, doc);

    let target = match target_identifier(&mut it, pos) {
        Some(target) => target,
        None => return Vec::new(),
    };

    let tree = tracker.tree();
    let (start, end) = search_bounds(tree, tracker.scope_at(pos), doc);

    let mut ranges = Vec::new();
    let mut previous: Option<String> = None;
    if !it.seek_at_or_after(start) {
        return ranges;
    }
    while let Some(token) = it.current() {
        let token_pos = token.position();
        if token_pos > end {
            break;
        }
        if !token.is_whitespace() && !token.kind.is_comment() {
            let member = previous
                .as_deref()
                .is_some_and(|p| MEMBER_ACCESS.contains(&p));
            if token.kind == TokenKind::Identifier
                && token.value() == target.0
                && (!member || token_pos == target.1)
            {
                ranges.push(Range::from_points(token_pos, token.end()));
            }
            previous = Some(token.value().to_string());
        }
        if !it.move_next() {
            break;
        }
    }
    ranges
}

/// The identifier token at or just before `pos`, as (value, start).
fn target_identifier<D: Document + ?Sized>(
    it: &mut TokenIterator<'_, D>,
    pos: Position,
) -> Option<(String, Position)> {
    let mut candidates = vec![pos];
    if pos.column > 0 {
        candidates.push(Position::new(pos.row, pos.column - 1));
    }
    candidates.into_iter().find_map(|candidate| {
        if !it.seek(candidate) {
            return None;
        }
        it.current()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| (t.value().to_string(), t.position()))
    })
}

/// Bounds of the innermost function scope around `id`, or the document.
fn search_bounds<D: Document + ?Sized>(tree: &ScopeTree, id: ScopeId, doc: &D) -> (Position, Position) {
    let document_end = Position::row_start(doc.row_count());
    std::iter::once(id)
        .chain(tree.ancestors(id))
        .map(|id| tree.scope(id))
        .find(|scope| scope.is_function())
        .map(|scope| (scope.preamble, scope.end.unwrap_or(document_end)))
        .unwrap_or((Position::default(), document_end))
}

/// Label describing the scope at `id`, as an editor status bar shows it.
/// Braces take the label of the construct around them.
pub fn status_label(tree: &ScopeTree, id: ScopeId) -> String {
    let labelled = std::iter::once(id)
        .chain(tree.ancestors(id))
        .map(|id| tree.scope(id))
        .find(|scope| !scope.is_brace());
    match labelled.map(|scope| &scope.kind) {
        Some(ScopeKind::Function { name: Some(name), .. }) => name.clone(),
        Some(ScopeKind::Function { name: None, .. }) => "(Anonymous)".to_string(),
        Some(ScopeKind::Chunk { label: Some(label), .. }) => format!("Chunk: {}", label),
        Some(ScopeKind::Chunk { label: None, .. }) => "Chunk".to_string(),
        Some(ScopeKind::Section { label, .. }) if !label.is_empty() => label.clone(),
        Some(ScopeKind::Section { .. }) => "(Untitled)".to_string(),
        Some(ScopeKind::TopLevel) | Some(ScopeKind::Brace) | None => "(Top Level)".to_string(),
    }
}
