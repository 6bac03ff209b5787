//! Chunk toolbar synchronization
//!
//! Keeps one run toolbar per runnable chunk of a literate document. The
//! synchronizer owns only bookkeeping: each toolbar is pinned to the chunk's
//! fence row by an anchor owned by the document, and the UI host learns what
//! to draw from [`ToolbarEvent`]s.
//!
//! A sync pass is either incremental (the cursor stayed inside the same chunk
//! and every other chunk kept its fence row, header and option comments, so
//! only that chunk is refreshed) or full (every chunk is visited under a new
//! render pass tag, and toolbars left with an old tag are removed).

use super::options::{option_comment_block, ChunkOptions};
use super::policy::RunnablePolicy;
use crate::document::{AnchorEvent, AnchorId, Anchors, Document, Position};
use crate::scope::{Scope, ScopeId, ScopeKind, ScopeTree};
use log::debug;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Render pass tags wrap at this value.
const RENDER_PASS_MODULUS: u8 = 255;

/// Fence position, header and option comment block of one chunk: everything
/// its runnable status is read from.
type ChunkKey = (Position, String, String);

/// A toolbar attached to one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkToolbar {
    /// Pins the toolbar to the chunk's fence row
    pub anchor: AnchorId,
    /// The full sync pass that last saw this toolbar's chunk
    pub render_pass: u8,
    pub label: Option<String>,
    pub engine: String,
}

impl ChunkToolbar {
    /// Row of the chunk fence, `None` once the anchor is gone.
    pub fn preamble_row<A: Anchors + ?Sized>(&self, anchors: &A) -> Option<usize> {
        anchors.anchor_position(self.anchor).map(|pos| pos.row)
    }
}

/// Notifications for the UI host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarEvent {
    /// A toolbar was created at `row`
    Attached { anchor: AnchorId, row: usize },
    /// An existing toolbar's chunk was re-read
    Refreshed { anchor: AnchorId, row: usize },
    /// A toolbar was removed
    Detached { anchor: AnchorId },
}

/// Attaches, refreshes and removes chunk toolbars from the scope tree.
pub struct ChunkToolbarSynchronizer {
    policy: RunnablePolicy,
    toolbars: Vec<ChunkToolbar>,
    render_pass: u8,
    show_toolbars: bool,
    literate_mode: bool,
    /// Set by a sync pass, cleared whenever toolbars were dropped wholesale
    synced: bool,
    /// Fence of the chunk under the cursor at the last sync
    last_chunk: Option<Position>,
    /// Keys of every other chunk at the last sync, in document order
    last_others: Vec<ChunkKey>,
    sender: Sender<ToolbarEvent>,
    receiver: Receiver<ToolbarEvent>,
}

impl ChunkToolbarSynchronizer {
    pub fn new(policy: RunnablePolicy, show_toolbars: bool) -> Self {
        let (sender, receiver) = channel();
        Self {
            policy,
            toolbars: Vec::new(),
            render_pass: 0,
            show_toolbars,
            literate_mode: true,
            synced: false,
            last_chunk: None,
            last_others: Vec::new(),
            sender,
            receiver,
        }
    }

    pub fn policy(&self) -> &RunnablePolicy {
        &self.policy
    }

    /// Change the policy; the next sync visits every chunk.
    pub fn set_policy(&mut self, policy: RunnablePolicy) {
        self.policy = policy;
        self.synced = false;
    }

    pub fn toolbars(&self) -> &[ChunkToolbar] {
        &self.toolbars
    }

    pub fn render_pass(&self) -> u8 {
        self.render_pass
    }

    /// The toolbar pinned to `row`, if any.
    pub fn toolbar_at<A: Anchors + ?Sized>(&self, anchors: &A, row: usize) -> Option<&ChunkToolbar> {
        self.toolbars
            .iter()
            .find(|toolbar| toolbar.preamble_row(anchors) == Some(row))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Entry point for the tracker's ready notification.
    pub fn on_scope_tree_ready<D>(&mut self, doc: &mut D, tree: &ScopeTree, current: ScopeId)
    where
        D: Document + Anchors + ?Sized,
    {
        self.sync(doc, tree, current);
    }

    /// Bring the toolbars in line with the chunks of `tree`.
    pub fn sync<D>(&mut self, doc: &mut D, tree: &ScopeTree, current: ScopeId)
    where
        D: Document + Anchors + ?Sized,
    {
        if !self.show_toolbars || !self.literate_mode {
            self.detach_all(doc);
            return;
        }

        let current_chunk = enclosing_chunk(tree, current);
        let current_preamble = current_chunk.map(|id| tree.scope(id).preamble);
        let same_chunk = current_preamble.is_some() && self.last_chunk == current_preamble;
        let others = other_chunk_keys(doc, tree, current_chunk);

        match current_chunk {
            Some(id) if self.synced && same_chunk && others == self.last_others => {
                self.sync_one(doc, tree.scope(id));
            }
            _ => self.sync_all(doc, tree),
        }

        self.synced = true;
        self.last_chunk = current_preamble;
        self.last_others = others;
    }

    fn sync_one<D>(&mut self, doc: &mut D, scope: &Scope)
    where
        D: Document + Anchors + ?Sized,
    {
        let row = scope.preamble.row;
        let options = ChunkOptions::collect(doc, scope);
        let existing = self.position_at(doc, row);
        debug!("Incremental chunk sync at row {}", row);

        match (existing, self.policy.is_runnable(&options)) {
            (Some(index), true) => self.refresh(index, options, row),
            (Some(index), false) => self.detach(doc, index),
            (None, true) => self.attach(doc, options, row),
            (None, false) => {}
        }
    }

    fn sync_all<D>(&mut self, doc: &mut D, tree: &ScopeTree)
    where
        D: Document + Anchors + ?Sized,
    {
        self.render_pass = (self.render_pass + 1) % RENDER_PASS_MODULUS;

        for (_, scope) in tree.chunks() {
            let options = ChunkOptions::collect(doc, scope);
            if !self.policy.is_runnable(&options) {
                continue;
            }
            let row = scope.preamble.row;
            match self.position_at(doc, row) {
                Some(index) => self.refresh(index, options, row),
                None => self.attach(doc, options, row),
            }
        }

        let mut index = 0;
        while index < self.toolbars.len() {
            if self.toolbars[index].render_pass == self.render_pass {
                index += 1;
            } else {
                self.detach(doc, index);
            }
        }
        debug!(
            "Full chunk sync pass {}: {} toolbar(s)",
            self.render_pass,
            self.toolbars.len()
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mode and preference changes
    // ─────────────────────────────────────────────────────────────────────────

    /// The editor switched modes; leaving the literate mode drops every
    /// toolbar.
    pub fn on_editor_mode_changed<A: Anchors + ?Sized>(&mut self, anchors: &mut A, literate: bool) {
        self.literate_mode = literate;
        if !literate {
            self.detach_all(anchors);
        }
    }

    /// Show or hide toolbars. Showing runs a full sync.
    pub fn set_show_toolbars<D>(&mut self, doc: &mut D, tree: &ScopeTree, current: ScopeId, show: bool)
    where
        D: Document + Anchors + ?Sized,
    {
        self.show_toolbars = show;
        if show {
            self.synced = false;
            self.sync(doc, tree, current);
        } else {
            self.detach_all(doc);
        }
    }

    /// Drop toolbars whose anchor was removed with its line.
    pub fn on_anchor_events(&mut self, events: &[AnchorEvent]) {
        for event in events {
            if let AnchorEvent::Removed(id) = event {
                let before = self.toolbars.len();
                self.toolbars.retain(|toolbar| toolbar.anchor != *id);
                if self.toolbars.len() != before {
                    debug!("Chunk toolbar {:?} lost its line", id);
                    self.emit(ToolbarEvent::Detached { anchor: *id });
                }
            }
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&self) -> Vec<ToolbarEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Toolbar bookkeeping
    // ─────────────────────────────────────────────────────────────────────────

    fn position_at<A: Anchors + ?Sized>(&self, anchors: &A, row: usize) -> Option<usize> {
        self.toolbars
            .iter()
            .position(|toolbar| toolbar.preamble_row(anchors) == Some(row))
    }

    fn attach<A: Anchors + ?Sized>(&mut self, anchors: &mut A, options: ChunkOptions, row: usize) {
        let anchor = anchors.create_anchor(Position::row_start(row));
        self.toolbars.push(ChunkToolbar {
            anchor,
            render_pass: self.render_pass,
            engine: options.engine().to_string(),
            label: options.label,
        });
        self.emit(ToolbarEvent::Attached { anchor, row });
    }

    fn refresh(&mut self, index: usize, options: ChunkOptions, row: usize) {
        let render_pass = self.render_pass;
        let toolbar = &mut self.toolbars[index];
        toolbar.render_pass = render_pass;
        toolbar.engine = options.engine().to_string();
        toolbar.label = options.label;
        let anchor = toolbar.anchor;
        self.emit(ToolbarEvent::Refreshed { anchor, row });
    }

    fn detach<A: Anchors + ?Sized>(&mut self, anchors: &mut A, index: usize) {
        let toolbar = self.toolbars.remove(index);
        anchors.remove_anchor(toolbar.anchor);
        self.emit(ToolbarEvent::Detached {
            anchor: toolbar.anchor,
        });
    }

    fn detach_all<A: Anchors + ?Sized>(&mut self, anchors: &mut A) {
        while !self.toolbars.is_empty() {
            self.detach(anchors, self.toolbars.len() - 1);
        }
        self.synced = false;
        self.last_chunk = None;
        self.last_others.clear();
    }

    fn emit(&self, event: ToolbarEvent) {
        // The receiver lives in `self`, so sending cannot fail
        let _ = self.sender.send(event);
    }
}

fn other_chunk_keys<D: Document + ?Sized>(
    doc: &D,
    tree: &ScopeTree,
    skip: Option<ScopeId>,
) -> Vec<ChunkKey> {
    tree.chunks()
        .filter(|&(id, _)| Some(id) != skip)
        .map(|(_, scope)| {
            let header = match &scope.kind {
                ScopeKind::Chunk { header, .. } => header.clone(),
                _ => String::new(),
            };
            (scope.preamble, header, option_comment_block(doc, scope))
        })
        .collect()
}

/// The innermost chunk around `id`, including `id` itself.
fn enclosing_chunk(tree: &ScopeTree, id: ScopeId) -> Option<ScopeId> {
    std::iter::once(id)
        .chain(tree.ancestors(id))
        .find(|&id| tree.scope(id).is_chunk())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
