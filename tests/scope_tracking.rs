//! End-to-end checks of the incremental scope tracker.

use scopeline::config::ScopeSettings;
use scopeline::document::{Position, TextDocument};
use scopeline::scope::{ScopeId, ScopeKind, ScopeTracker, ScopeTree, TrackerEvent};
use scopeline::token::Flavor;

const NOTEBOOK: &str = "\
# Analysis

Some prose.

```{r setup}
helper <- function(x, y) {
  if (x) {
    y
  }
}
```

## Details

```{r}
local({
  z <- 1
})
```
";

fn build(doc: &TextDocument, flavor: Flavor, settings: &ScopeSettings) -> ScopeTracker {
    let mut tracker = ScopeTracker::new(flavor, settings);
    tracker.start(doc);
    tracker.flush(doc);
    tracker
}

/// Headers split over rows, a body brace on its own row and sections.
const SCRIPT: &str = "\
# Setup ----
helper <- function(x,
                   y)
{
  if (x) {
    y
  }
}
late <-
  function() {
    1
  }
## Tail ----
z <- \"a\"
";

/// Two functions covering rows 0..10 and 10..20.
fn two_functions() -> String {
    let mut lines = Vec::new();
    for name in ["first", "second"] {
        lines.push(format!("{} <- function() {{", name));
        lines.extend((0..8).map(|i| format!("  v{} <- {}", i, i)));
        lines.push("}".to_string());
    }
    lines.join("\n")
}

type Shape = (ScopeKind, Position, Position, Option<Position>, Option<ScopeId>);

/// Kind, preamble, body start, end and parent of every scope, in arena order.
fn shape(tree: &ScopeTree) -> Vec<Shape> {
    tree.scopes()
        .map(|(_, s)| (s.kind.clone(), s.preamble, s.body_start, s.end, s.parent))
        .collect()
}

/// Apply `text` at `pos`, let the tracker catch up and compare it with a
/// tracker built from scratch on the edited document.
fn assert_edit_matches_fresh(
    doc: &mut TextDocument,
    tracker: &mut ScopeTracker,
    flavor: Flavor,
    pos: Position,
    text: &str,
) {
    let change = doc.insert(pos, text);
    tracker.on_document_changed(doc, change.start);
    tracker.flush(doc);
    let fresh = build(doc, flavor, &ScopeSettings::default());
    assert_eq!(
        shape(tracker.tree()),
        shape(fresh.tree()),
        "inserting {:?} at {} of {:?}",
        text,
        pos,
        doc.lines()
    );
}

fn assert_contained(tree: &ScopeTree) {
    for (_, scope) in tree.scopes() {
        let Some(parent) = scope.parent else {
            continue;
        };
        let parent = tree.scope(parent);
        assert!(parent.preamble <= scope.preamble);
        if let (Some(end), Some(parent_end)) = (scope.end, parent.end) {
            assert!(end <= parent_end);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_children_lie_inside_parents() {
    let doc = TextDocument::from_text(NOTEBOOK);
    let tracker = build(&doc, Flavor::RMarkdown, &ScopeSettings::default());
    assert!(tracker.tree().len() > 5);
    assert_contained(tracker.tree());

    let doc = TextDocument::from_text(&two_functions());
    let tracker = build(&doc, Flavor::RScript, &ScopeSettings::default());
    assert_contained(tracker.tree());
}

#[test]
fn test_rebuild_is_idempotent() {
    let doc = TextDocument::from_text(NOTEBOOK);
    let mut tracker = build(&doc, Flavor::RMarkdown, &ScopeSettings::default());
    let first = shape(tracker.tree());

    tracker.start(&doc);
    tracker.flush(&doc);
    assert_eq!(shape(tracker.tree()), first);
}

#[test]
fn test_small_batches_build_the_same_tree() {
    let doc = TextDocument::from_text(NOTEBOOK);
    let whole = build(&doc, Flavor::RMarkdown, &ScopeSettings::default());
    let batched = build(
        &doc,
        Flavor::RMarkdown,
        &ScopeSettings {
            batch_rows: 3,
            ..ScopeSettings::default()
        },
    );
    assert_eq!(shape(whole.tree()), shape(batched.tree()));
}

#[test]
fn test_edit_keeps_earlier_scope() {
    let mut doc = TextDocument::from_text(&two_functions());
    let mut tracker = build(&doc, Flavor::RScript, &ScopeSettings::default());
    let first = tracker
        .tree()
        .scopes()
        .find(|(_, s)| s.is_function() && s.preamble.row == 0)
        .map(|(_, s)| s.clone())
        .expect("first function");
    assert_eq!(first.end.map(|e| e.row), Some(9));

    let change = doc.insert(Position::new(15, 2), "w");
    tracker.on_document_changed(&doc, change.start);

    let start = tracker.pending_rebuild_row().expect("rebuild scheduled");
    assert!(start <= 15);
    assert!(start >= 10);
    let kept = tracker
        .tree()
        .scopes()
        .find(|(_, s)| s.is_function() && s.preamble.row == 0)
        .map(|(_, s)| s.clone());
    assert_eq!(kept, Some(first));

    tracker.flush(&doc);
    let fresh = build(&doc, Flavor::RScript, &ScopeSettings::default());
    assert_eq!(shape(tracker.tree()), shape(fresh.tree()));
}

#[test]
fn test_incremental_rebuild_matches_full_build() {
    let inserts = ["{", "}", "\"", "\n", "# Part ----\n", "```\n"];
    for (flavor, text) in [(Flavor::RScript, SCRIPT), (Flavor::RMarkdown, NOTEBOOK)] {
        let original = TextDocument::from_text(text);
        for insert in inserts {
            for (row, line) in original.lines().iter().enumerate() {
                for col in 0..=line.chars().count() {
                    let mut doc = TextDocument::from_text(text);
                    let mut tracker = build(&doc, flavor, &ScopeSettings::default());
                    let pos = Position::new(row, col);
                    assert_edit_matches_fresh(&mut doc, &mut tracker, flavor, pos, insert);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_function_body_added_after_header() {
    let mut doc = TextDocument::from_text("f <- function(x)\n\n  x\n\n");
    let mut tracker = build(&doc, Flavor::RScript, &ScopeSettings::default());

    assert_edit_matches_fresh(&mut doc, &mut tracker, Flavor::RScript, Position::new(1, 0), "{");
    assert_edit_matches_fresh(&mut doc, &mut tracker, Flavor::RScript, Position::new(3, 0), "}");

    let f = tracker.tree().scope(tracker.scope_at(Position::new(2, 2)));
    assert_eq!(
        f.kind,
        ScopeKind::Function {
            name: Some("f".to_string()),
            args: vec!["x".to_string()],
        }
    );
    assert_eq!(f.preamble, Position::new(0, 0));
    assert_eq!(f.end, Some(Position::new(3, 1)));
}

#[test]
fn test_function_added_after_dangling_assignment() {
    let mut doc = TextDocument::from_text("g <-\n\n  x\n");
    let mut tracker = build(&doc, Flavor::RScript, &ScopeSettings::default());

    let pos = Position::new(1, 0);
    assert_edit_matches_fresh(&mut doc, &mut tracker, Flavor::RScript, pos, "function() {");
    let g = tracker.tree().scope(tracker.scope_at(Position::new(2, 2)));
    assert!(matches!(&g.kind, ScopeKind::Function { name: Some(name), .. } if name == "g"));
    assert_eq!(g.preamble, Position::new(0, 0));
}

#[test]
fn test_large_document_edit() {
    let text = (0..1000).map(|i| format!("x{} <- {}", i, i)).collect::<Vec<_>>().join("\n");
    let mut doc = TextDocument::from_text(&text);
    let mut tracker = build(&doc, Flavor::RScript, &ScopeSettings::default());
    tracker.drain_events();

    let change = doc.insert(Position::new(500, 0), "y");
    tracker.on_document_changed(&doc, change.start);
    let start = tracker.pending_rebuild_row().expect("rebuild scheduled");
    assert!(start <= 500);

    tracker.flush(&doc);
    assert_eq!(tracker.parse_position().row, 1000);
    assert!(tracker.is_ready(999));
    assert!(tracker.drain_events().iter().any(|e| matches!(
        e,
        TrackerEvent::ScopeTreeReady { parse_position, .. } if parse_position.row == 1000
    )));
}

#[test]
fn test_unterminated_scope_stays_open() {
    let doc = TextDocument::from_text("f <- function() {\n  x\n");
    let tracker = build(&doc, Flavor::RScript, &ScopeSettings::default());
    let id = tracker.scope_at(Position::new(1, 2));
    assert!(tracker.tree().scope(id).is_function());
    assert_eq!(tracker.tree().scope(id).end, None);
    assert!(tracker.is_initialized());
}
