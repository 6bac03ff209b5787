//! Tracked positions ("anchors") that follow edits.
//!
//! The document owns every anchor. Consumers hold only an [`AnchorId`] and
//! learn about movement and removal by draining [`AnchorEvent`]s, which keeps
//! the ownership one-directional: nothing outside the document can keep an
//! anchor alive or mutate it.

use super::position::Position;
use std::collections::BTreeMap;

/// Handle to an anchor owned by an [`AnchorSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnchorId(u64);

/// Change notifications emitted by an [`AnchorSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorEvent {
    /// The anchor moved because text was inserted or removed before it
    Moved {
        id: AnchorId,
        from: Position,
        to: Position,
    },
    /// The text the anchor was pinned to was deleted; the anchor is gone
    Removed(AnchorId),
}

/// Hosts that can pin anchors to their text.
pub trait Anchors {
    fn create_anchor(&mut self, pos: Position) -> AnchorId;
    fn anchor_position(&self, id: AnchorId) -> Option<Position>;
    fn remove_anchor(&mut self, id: AnchorId) -> bool;
}

/// The set of live anchors of one document.
#[derive(Debug, Default)]
pub struct AnchorSet {
    next_id: u64,
    anchors: BTreeMap<AnchorId, Position>,
    events: Vec<AnchorEvent>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, pos: Position) -> AnchorId {
        let id = AnchorId(self.next_id);
        self.next_id += 1;
        self.anchors.insert(id, pos);
        id
    }

    pub fn position(&self, id: AnchorId) -> Option<Position> {
        self.anchors.get(&id).copied()
    }

    /// Drop an anchor on its owner's request. No event is queued.
    pub fn remove(&mut self, id: AnchorId) -> bool {
        self.anchors.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<AnchorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Text was inserted; `start..end` is the extent of the new text.
    pub(crate) fn apply_insert(&mut self, start: Position, end: Position) {
        for (id, pos) in self.anchors.iter_mut() {
            if *pos < start {
                continue;
            }
            let moved = if pos.row == start.row {
                Position::new(end.row, end.column + (pos.column - start.column))
            } else {
                Position::new(pos.row + (end.row - start.row), pos.column)
            };
            if moved != *pos {
                self.events.push(AnchorEvent::Moved {
                    id: *id,
                    from: *pos,
                    to: moved,
                });
                *pos = moved;
            }
        }
    }

    /// Text in `start..end` was removed.
    pub(crate) fn apply_remove(&mut self, start: Position, end: Position) {
        let mut removed = Vec::new();
        for (id, pos) in self.anchors.iter_mut() {
            if *pos < start {
                continue;
            }
            if *pos < end {
                removed.push(*id);
                continue;
            }
            let moved = if pos.row == end.row {
                Position::new(start.row, start.column + (pos.column - end.column))
            } else {
                Position::new(pos.row - (end.row - start.row), pos.column)
            };
            if moved != *pos {
                self.events.push(AnchorEvent::Moved {
                    id: *id,
                    from: *pos,
                    to: moved,
                });
                *pos = moved;
            }
        }
        for id in removed {
            self.anchors.remove(&id);
            self.events.push(AnchorEvent::Removed(id));
        }
    }
}
