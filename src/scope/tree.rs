//! Scope tree
//!
//! Scopes live in an arena in the order they were discovered. Because a
//! scope is pushed when its body starts, body start positions never
//! decrease along the arena, which is what makes invalidation a truncation.
//! Parent links are arena indices and never own anything.

use crate::document::Position;
use log::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Scope
// ─────────────────────────────────────────────────────────────────────────────

/// Index of a scope in its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What construct a scope stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    TopLevel,
    /// A Markdown heading or an R section comment (`# Name ----`)
    Section { label: String, level: u8 },
    /// An executable chunk in a literate document
    Chunk {
        label: Option<String>,
        /// The opening fence line
        header: String,
    },
    /// `name <- function(args) { ... }`; anonymous functions have no name
    Function {
        name: Option<String>,
        args: Vec<String>,
    },
    Brace,
}

/// A node of the scope tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Where the construct begins (the function name, the fence line)
    pub preamble: Position,
    /// Where the body begins (just after `{`, the end of the fence line)
    pub body_start: Position,
    /// `None` while the scope is open or was never terminated
    pub end: Option<Position>,
    pub parent: Option<ScopeId>,
    children: Vec<ScopeId>,
}

impl Scope {
    fn new(kind: ScopeKind, preamble: Position, body_start: Position, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            preamble,
            body_start,
            end: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn is_top_level(&self) -> bool {
        matches!(self.kind, ScopeKind::TopLevel)
    }

    pub fn is_chunk(&self) -> bool {
        matches!(self.kind, ScopeKind::Chunk { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ScopeKind::Function { .. })
    }

    pub fn is_section(&self) -> bool {
        matches!(self.kind, ScopeKind::Section { .. })
    }

    pub fn is_brace(&self) -> bool {
        matches!(self.kind, ScopeKind::Brace)
    }

    /// Whether `pos` lies between the preamble and the end, both inclusive.
    /// Open scopes extend to the end of the document.
    pub fn contains(&self, pos: Position) -> bool {
        self.preamble <= pos && self.end.map_or(true, |end| pos <= end)
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScopeTree
// ─────────────────────────────────────────────────────────────────────────────

/// All scopes discovered so far, plus the stack of scopes still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    open: Vec<ScopeId>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    const ROOT: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(
                ScopeKind::TopLevel,
                Position::default(),
                Position::default(),
                None,
            )],
            open: Vec::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        Self::ROOT
    }

    /// Number of scopes, the top level included.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// True when only the top-level scope exists.
    pub fn is_empty(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0)
    }

    /// The scope for `id`, falling back to the top level for stale ids.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        self.scopes.get(id.0).unwrap_or(&self.scopes[0])
    }

    /// Every scope in discovery order, the top level first.
    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes.iter().enumerate().map(|(i, s)| (ScopeId(i), s))
    }

    pub fn chunks(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes().filter(|(_, s)| s.is_chunk())
    }

    pub fn children(&self, id: ScopeId) -> &[ScopeId] {
        self.get(id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// Parent chain of `id`, innermost first, ending at the top level.
    pub fn ancestors(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut current = self.get(id).and_then(|s| s.parent);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.get(parent).and_then(|s| s.parent);
        }
        chain
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Primitives
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a new scope as a child of the innermost open scope.
    pub fn push(&mut self, kind: ScopeKind, preamble: Position, body_start: Position) -> ScopeId {
        let parent = self.current_open();
        let id = ScopeId(self.scopes.len());
        let parent_preamble = self.scope(parent).preamble;
        self.scopes.push(Scope::new(
            kind,
            preamble.max(parent_preamble),
            body_start.max(preamble),
            Some(parent),
        ));
        self.scopes[parent.0].children.push(id);
        self.open.push(id);
        id
    }

    /// Close `id` at `end`, together with every scope opened inside it that
    /// is still open. Returns false when `id` is not open.
    pub fn close(&mut self, id: ScopeId, end: Position) -> bool {
        let Some(depth) = self.open.iter().position(|&open| open == id) else {
            return false;
        };
        for closing in self.open.drain(depth..) {
            let scope = &mut self.scopes[closing.0];
            scope.end = Some(end.max(scope.body_start));
        }
        true
    }

    /// Close the innermost open scope matching `pred`.
    pub fn close_innermost(
        &mut self,
        pred: impl Fn(&Scope) -> bool,
        end: Position,
    ) -> Option<ScopeId> {
        let id = self
            .open
            .iter()
            .rev()
            .copied()
            .find(|&id| pred(&self.scopes[id.0]))?;
        self.close(id, end);
        Some(id)
    }

    /// The innermost open scope, the top level when nothing else is open.
    pub fn current_open(&self) -> ScopeId {
        self.open.last().copied().unwrap_or(Self::ROOT)
    }

    /// Open scopes, outermost first. The top level is not listed.
    pub fn open_scopes(&self) -> &[ScopeId] {
        &self.open
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The innermost scope containing `pos`. Where two siblings touch at a
    /// boundary, the later one wins.
    pub fn scope_at(&self, pos: Position) -> ScopeId {
        let mut current = Self::ROOT;
        loop {
            let next = self.scopes[current.0]
                .children
                .iter()
                .rev()
                .copied()
                .find(|&child| self.scopes[child.0].contains(pos));
            match next {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// Earliest position a rebuild has to start from after an edit at `pos`.
    ///
    /// Starts at the preamble of the innermost function, chunk or brace scope
    /// containing `pos` (sections only end at the next heading and reopen on
    /// invalidation), then moves back to the preamble of any scope that
    /// would be truncated from that row while its preamble lies before it.
    pub fn rebuild_point(&self, pos: Position) -> Position {
        let innermost = self.scope_at(pos);
        let mut row = std::iter::once(innermost)
            .chain(self.ancestors(innermost))
            .map(|id| &self.scopes[id.0])
            .find(|s| !s.is_top_level() && !s.is_section())
            .map_or(pos.row, |s| s.preamble.row.min(pos.row));

        loop {
            let pulled = self
                .scopes
                .iter()
                .skip(1)
                .filter(|s| s.body_start.row >= row)
                .map(|s| s.preamble.row)
                .min()
                .unwrap_or(row)
                .min(row);
            if pulled == row {
                return Position::row_start(row);
            }
            row = pulled;
        }
    }

    /// Drop every scope whose body starts at or after `pos` and reopen every
    /// surviving scope that ended at or after it.
    pub fn invalidate_from(&mut self, pos: Position) {
        let keep = self
            .scopes
            .iter()
            .skip(1)
            .position(|s| s.body_start >= pos)
            .map_or(self.scopes.len(), |i| i + 1);
        let dropped = self.scopes.len() - keep;
        self.scopes.truncate(keep);

        for scope in &mut self.scopes {
            scope.children.retain(|child| child.0 < keep);
            if scope.end.is_some_and(|end| end >= pos) {
                scope.end = None;
            }
        }
        self.scopes[0].end = None;

        self.open = self
            .scopes
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, s)| s.end.is_none())
            .map(|(i, _)| ScopeId(i))
            .collect();

        debug!(
            "Scope tree invalidated from {}: dropped {}, {} open",
            pos,
            dropped,
            self.open.len()
        );
    }

    /// Forget everything but the top level.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(row: usize, column: usize) -> Position {
        Position::new(row, column)
    }

    /// Two top-level functions spanning rows 0..10 and 10..20, the second
    /// with a nested brace at rows 12..14.
    fn two_functions() -> (ScopeTree, ScopeId, ScopeId, ScopeId) {
        let mut tree = ScopeTree::new();
        let f = tree.push(
            ScopeKind::Function {
                name: Some("f".into()),
                args: vec![],
            },
            p(0, 0),
            p(0, 16),
        );
        tree.close(f, p(9, 1));
        let g = tree.push(
            ScopeKind::Function {
                name: Some("g".into()),
                args: vec!["x".into()],
            },
            p(10, 0),
            p(10, 17),
        );
        let inner = tree.push(ScopeKind::Brace, p(12, 4), p(12, 5));
        tree.close(inner, p(14, 4));
        tree.close(g, p(19, 1));
        (tree, f, g, inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Building
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_push_links_parent_and_children() {
        let (tree, f, g, inner) = two_functions();
        assert_eq!(tree.children(tree.root()), &[f, g]);
        assert_eq!(tree.scope(inner).parent, Some(g));
        assert_eq!(tree.ancestors(inner), vec![g, tree.root()]);
        assert!(tree.open_scopes().is_empty());
    }

    #[test]
    fn test_close_closes_inner_open_scopes() {
        let mut tree = ScopeTree::new();
        let chunk = tree.push(
            ScopeKind::Chunk {
                label: None,
                header: "```{r}".into(),
            },
            p(0, 0),
            p(0, 6),
        );
        let brace = tree.push(ScopeKind::Brace, p(1, 0), p(1, 1));
        assert!(tree.close(chunk, p(3, 3)));
        assert_eq!(tree.scope(brace).end, Some(p(3, 3)));
        assert_eq!(tree.current_open(), tree.root());
        assert!(!tree.close(chunk, p(4, 0)));
    }

    #[test]
    fn test_close_innermost_matching() {
        let mut tree = ScopeTree::new();
        let outer = tree.push(ScopeKind::Brace, p(0, 0), p(0, 1));
        tree.push(
            ScopeKind::Section {
                label: "A".into(),
                level: 1,
            },
            p(1, 0),
            p(1, 9),
        );
        let closed = tree.close_innermost(Scope::is_brace, p(2, 1));
        assert_eq!(closed, Some(outer));
        assert!(tree.close_innermost(Scope::is_brace, p(3, 0)).is_none());
    }

    #[test]
    fn test_end_never_precedes_body_start() {
        let mut tree = ScopeTree::new();
        let b = tree.push(ScopeKind::Brace, p(2, 0), p(2, 1));
        tree.close(b, p(1, 0));
        assert_eq!(tree.scope(b).end, Some(p(2, 1)));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_scope_at_innermost() {
        let (tree, f, g, inner) = two_functions();
        assert_eq!(tree.scope_at(p(5, 2)), f);
        assert_eq!(tree.scope_at(p(13, 0)), inner);
        assert_eq!(tree.scope_at(p(15, 0)), g);
        assert_eq!(tree.scope_at(p(30, 0)), tree.root());
    }

    #[test]
    fn test_scope_at_prefers_later_sibling() {
        let mut tree = ScopeTree::new();
        let a = tree.push(ScopeKind::Brace, p(0, 0), p(0, 1));
        tree.close(a, p(2, 0));
        let b = tree.push(ScopeKind::Brace, p(2, 0), p(2, 1));
        tree.close(b, p(4, 0));
        assert_eq!(tree.scope_at(p(2, 0)), b);
    }

    #[test]
    fn test_rebuild_point_uses_enclosing_scope() {
        let (tree, ..) = two_functions();
        assert_eq!(tree.rebuild_point(p(15, 3)), p(10, 0));
        assert_eq!(tree.rebuild_point(p(13, 3)), p(12, 0));
        assert_eq!(tree.rebuild_point(p(25, 0)), p(25, 0));
    }

    #[test]
    fn test_rebuild_point_pulls_back_to_split_preamble() {
        let mut tree = ScopeTree::new();
        let f = tree.push(
            ScopeKind::Function {
                name: Some("f".into()),
                args: vec!["a".into(), "b".into()],
            },
            p(3, 0),
            p(6, 1),
        );
        tree.close(f, p(9, 1));
        assert_eq!(tree.rebuild_point(p(7, 0)), p(3, 0));
        assert_eq!(tree.rebuild_point(p(5, 0)), p(3, 0));
        assert_eq!(tree.rebuild_point(p(11, 0)), p(11, 0));
    }

    #[test]
    fn test_rebuild_point_skips_sections() {
        let mut tree = ScopeTree::new();
        tree.push(
            ScopeKind::Section {
                label: "Intro".into(),
                level: 1,
            },
            p(0, 0),
            p(0, 7),
        );
        assert_eq!(tree.rebuild_point(p(40, 2)), p(40, 0));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invalidation
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_invalidate_keeps_earlier_scopes() {
        let (mut tree, f, g, _) = two_functions();
        let before = tree.scope(f).clone();
        let point = tree.rebuild_point(p(15, 0));
        tree.invalidate_from(point);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.scope(f), &before);
        assert!(tree.get(g).is_none());
        assert_eq!(tree.children(tree.root()), &[f]);
    }

    #[test]
    fn test_invalidate_reopens_enclosing_scopes() {
        let (mut tree, _, g, inner) = two_functions();
        tree.invalidate_from(p(12, 0));
        assert!(tree.get(inner).is_none());
        assert_eq!(tree.scope(g).end, None);
        assert_eq!(tree.open_scopes(), &[g]);
        assert_eq!(tree.current_open(), g);
    }

    #[test]
    fn test_invalidate_from_start_leaves_root() {
        let (mut tree, ..) = two_functions();
        tree.invalidate_from(p(0, 0));
        assert!(tree.is_empty());
        assert!(tree.open_scopes().is_empty());
    }
}
