//! In-memory document backed by a vector of lines.

use super::anchor::{AnchorEvent, AnchorId, AnchorSet, Anchors};
use super::position::{Position, Range};
use super::Document;
use crate::string_utils::{char_count, char_to_byte};

/// The extent of one mutation.
///
/// `start` is where the edit began, which is what the scope tracker
/// invalidates from. `old_end` is where the replaced text ended before the
/// edit and `new_end` where the new text ends after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentChange {
    pub start: Position,
    pub old_end: Position,
    pub new_end: Position,
}

impl DocumentChange {
    /// Whether the edit added or removed rows.
    pub fn changes_row_count(&self) -> bool {
        self.old_end.row != self.new_end.row
    }
}

/// A plain text document with a cursor and anchors.
#[derive(Debug, Default)]
pub struct TextDocument {
    lines: Vec<String>,
    cursor: Position,
    anchors: AnchorSet,
}

impl TextDocument {
    /// Build a document from text. `\r\n` line endings are normalized.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        Self {
            lines,
            cursor: Position::default(),
            anchors: AnchorSet::new(),
        }
    }

    /// The full text, rows joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Move the cursor, clamped to the document.
    pub fn set_cursor(&mut self, pos: Position) {
        self.cursor = self.clamp(pos);
    }

    /// Clamp a position to an existing row and column.
    pub fn clamp(&self, pos: Position) -> Position {
        let last_row = self.lines.len().saturating_sub(1);
        let row = pos.row.min(last_row);
        let len = self.lines.get(row).map(|l| char_count(l)).unwrap_or(0);
        Position::new(row, pos.column.min(len))
    }

    /// End of the document.
    pub fn end(&self) -> Position {
        let row = self.lines.len().saturating_sub(1);
        self.clamp(Position::new(row, usize::MAX))
    }

    /// Insert `text` at `pos`.
    pub fn insert(&mut self, pos: Position, text: &str) -> DocumentChange {
        let start = self.clamp(pos);
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }

        let line = &self.lines[start.row];
        let split = char_to_byte(line, start.column);
        let tail = line[split..].to_string();
        let head = line[..split].to_string();

        let mut pieces = text.split('\n').map(|p| p.strip_suffix('\r').unwrap_or(p));
        let first = pieces.next().unwrap_or("");
        let rest: Vec<&str> = pieces.collect();

        let new_end = if rest.is_empty() {
            self.lines[start.row] = format!("{}{}{}", head, first, tail);
            Position::new(start.row, start.column + char_count(first))
        } else {
            self.lines[start.row] = format!("{}{}", head, first);
            let last_index = rest.len() - 1;
            let mut inserted = Vec::with_capacity(rest.len());
            for (i, piece) in rest.iter().enumerate() {
                if i == last_index {
                    inserted.push(format!("{}{}", piece, tail));
                } else {
                    inserted.push(piece.to_string());
                }
            }
            let end = Position::new(start.row + rest.len(), char_count(rest[last_index]));
            let at = start.row + 1;
            self.lines.splice(at..at, inserted);
            end
        };

        self.anchors.apply_insert(start, new_end);
        self.cursor = self.shift_for_insert(self.cursor, start, new_end);
        DocumentChange {
            start,
            old_end: start,
            new_end,
        }
    }

    /// Remove the text in `range`.
    pub fn remove(&mut self, range: Range) -> DocumentChange {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end);
        if start == end {
            return DocumentChange {
                start,
                old_end: end,
                new_end: start,
            };
        }

        let head = {
            let line = &self.lines[start.row];
            line[..char_to_byte(line, start.column)].to_string()
        };
        let tail = {
            let line = &self.lines[end.row];
            line[char_to_byte(line, end.column)..].to_string()
        };
        self.lines.drain(start.row + 1..=end.row);
        self.lines[start.row] = format!("{}{}", head, tail);

        self.anchors.apply_remove(start, end);
        self.cursor = if self.cursor < start {
            self.cursor
        } else if self.cursor < end {
            start
        } else if self.cursor.row == end.row {
            Position::new(start.row, start.column + (self.cursor.column - end.column))
        } else {
            Position::new(self.cursor.row - (end.row - start.row), self.cursor.column)
        };
        DocumentChange {
            start,
            old_end: end,
            new_end: start,
        }
    }

    /// Replace the text in `range` with `text`.
    pub fn replace(&mut self, range: Range, text: &str) -> DocumentChange {
        let removed = self.remove(range);
        let inserted = self.insert(removed.start, text);
        DocumentChange {
            start: removed.start,
            old_end: removed.old_end,
            new_end: inserted.new_end,
        }
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    /// Drain the anchor change queue.
    pub fn drain_anchor_events(&mut self) -> Vec<AnchorEvent> {
        self.anchors.drain_events()
    }

    fn shift_for_insert(&self, pos: Position, start: Position, end: Position) -> Position {
        if pos < start {
            pos
        } else if pos.row == start.row {
            Position::new(end.row, end.column + (pos.column - start.column))
        } else {
            Position::new(pos.row + (end.row - start.row), pos.column)
        }
    }
}

impl Document for TextDocument {
    fn line(&self, row: usize) -> Option<&str> {
        self.lines.get(row).map(String::as_str)
    }

    fn row_count(&self) -> usize {
        self.lines.len()
    }

    fn cursor(&self) -> Position {
        self.cursor
    }
}

impl Anchors for TextDocument {
    fn create_anchor(&mut self, pos: Position) -> AnchorId {
        let pos = self.clamp(pos);
        self.anchors.create(pos)
    }

    fn anchor_position(&self, id: AnchorId) -> Option<Position> {
        self.anchors.position(id)
    }

    fn remove_anchor(&mut self, id: AnchorId) -> bool {
        self.anchors.remove(id)
    }
}
