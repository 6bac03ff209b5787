//! Incremental scope tracking
//!
//! The tracker owns a scope tree over one document and keeps it current as
//! the document changes. Work is done in batches of rows; between batches
//! the tracker yields to the host, which calls [`ScopeTracker::poll`] from
//! its event loop. An edit during a rebuild redirects the rebuild instead of
//! starting a second one.

use super::builder::{RScopeBuilder, ScopeBuilder};
use super::schedule::RebuildTimer;
use super::tree::{ScopeId, ScopeTree};
use crate::config::ScopeSettings;
use crate::document::{Document, Position};
use crate::token::{DocumentTokenizer, Flavor, TokenIterator};
use log::debug;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

/// Notifications for consumers of the scope tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A rebuild reached the end of the document
    ScopeTreeReady {
        parse_position: Position,
        /// The scope under the cursor when the rebuild finished
        current: ScopeId,
    },
    /// The innermost scope under the cursor changed
    ActiveScopeChanged { current: ScopeId },
}

#[derive(Debug, Clone, Copy)]
struct RebuildWindow {
    next_row: usize,
}

/// Maintains the scope tree of one document.
pub struct ScopeTracker<B: ScopeBuilder = RScopeBuilder> {
    builder: B,
    tree: ScopeTree,
    tokenizer: DocumentTokenizer,
    timer: RebuildTimer,
    window: Option<RebuildWindow>,
    parse_position: Position,
    batch_rows: usize,
    delay: Duration,
    initialized: bool,
    detached: bool,
    /// Last scope reported as active, with its preamble so a reused index
    /// after a rebuild still counts as a change
    last_active: Option<(ScopeId, Position)>,
    sender: Sender<TrackerEvent>,
    receiver: Receiver<TrackerEvent>,
}

impl ScopeTracker<RScopeBuilder> {
    /// A tracker using the R / R Markdown scope builder.
    pub fn new(flavor: Flavor, settings: &ScopeSettings) -> Self {
        Self::with_builder(RScopeBuilder::new(), flavor, settings)
    }
}

impl<B: ScopeBuilder> ScopeTracker<B> {
    pub fn with_builder(builder: B, flavor: Flavor, settings: &ScopeSettings) -> Self {
        let (sender, receiver) = channel();
        Self {
            builder,
            tree: ScopeTree::new(),
            tokenizer: DocumentTokenizer::new(flavor),
            timer: RebuildTimer::new(),
            window: None,
            parse_position: Position::default(),
            batch_rows: settings.batch_rows.max(1),
            delay: settings.delay(),
            initialized: false,
            detached: false,
            last_active: None,
            sender,
            receiver,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────────────────

    /// Begin a full build from the first row.
    pub fn start<D: Document + ?Sized>(&mut self, doc: &D) {
        self.detached = false;
        self.tokenizer.invalidate_from(0);
        self.restart(0);
        debug!("Scope tracker started on {} rows", doc.row_count());
        self.timer.schedule(Instant::now(), Duration::ZERO);
    }

    /// React to an edit that started at `edit_start`.
    ///
    /// Everything from the nearest scope boundary at or before the edit is
    /// invalidated and the rebuild window moves back there. A rebuild that
    /// has not reached that point yet simply carries on.
    pub fn on_document_changed<D: Document + ?Sized>(&mut self, doc: &D, edit_start: Position) {
        if self.detached {
            return;
        }
        self.tokenizer.invalidate_from(edit_start.row);

        let rebuild_point = self.tree.rebuild_point(edit_start);
        let start_row = rebuild_point
            .row
            .min(self.parse_position.row)
            .min(edit_start.row);

        match self.window {
            Some(window) if window.next_row == start_row => {
                debug!("Edit at {} ahead of rebuild at row {}", edit_start, start_row);
            }
            _ => {
                let start_row = self.safe_start(start_row);
                debug!(
                    "Edit at {} invalidates scopes from row {} ({} rows)",
                    edit_start,
                    start_row,
                    doc.row_count()
                );
                self.restart(start_row);
            }
        }
        self.timer.schedule(Instant::now(), self.delay);
    }

    /// Run one batch of the rebuild starting at `row`.
    ///
    /// When `row` is not where the current rebuild left off, scopes from
    /// `row` on are invalidated first, after moving `row` back to the start
    /// of any definition split across it. After the batch the tracker either
    /// reschedules itself or, at the end of the document, reports the tree
    /// as ready.
    pub fn rebuild_from<D: Document + ?Sized>(&mut self, doc: &D, row: usize) {
        if self.detached {
            return;
        }
        let row = match self.window {
            Some(window) if window.next_row == row => row,
            _ => {
                let row = self.safe_start(row);
                self.restart(row);
                row
            }
        };

        let rows = doc.row_count();
        let end_row = row.saturating_add(self.batch_rows).min(rows);
        let start = Position::row_start(row);

        let mut it = TokenIterator::new(&mut self.tokenizer, doc);
        if row < rows && (it.seek(start) || it.seek_at_or_after(start)) {
            while let Some(token) = it.current() {
                if token.position().row >= end_row {
                    break;
                }
                self.builder
                    .on_token(token, token.position(), &mut self.tree);
                if !it.move_next() {
                    break;
                }
            }
        }

        if end_row >= rows {
            self.finish(doc);
        } else {
            debug!("Scope rebuild batch {}..{} of {}", row, end_row, rows);
            self.window = Some(RebuildWindow { next_row: end_row });
            self.parse_position = Position::row_start(end_row);
            self.timer.schedule(Instant::now(), self.delay);
        }
    }

    /// Run the pending batch if its deadline has passed. Returns true when a
    /// batch ran.
    pub fn poll<D: Document + ?Sized>(&mut self, doc: &D, now: Instant) -> bool {
        if !self.timer.take_due(now) {
            return false;
        }
        self.run_window(doc)
    }

    /// Run the pending batch now, ignoring its deadline.
    pub fn run_pending<D: Document + ?Sized>(&mut self, doc: &D) -> bool {
        if !self.timer.is_pending() {
            return false;
        }
        self.timer.cancel();
        self.run_window(doc)
    }

    /// Run batches until no work is left.
    pub fn flush<D: Document + ?Sized>(&mut self, doc: &D) {
        while self.run_pending(doc) {}
    }

    /// Stop all work. The tracker ignores further edits until restarted.
    pub fn detach(&mut self) {
        self.timer.cancel();
        self.window = None;
        self.detached = true;
        debug!("Scope tracker detached");
    }

    fn run_window<D: Document + ?Sized>(&mut self, doc: &D) -> bool {
        match self.window {
            Some(window) => {
                self.rebuild_from(doc, window.next_row);
                true
            }
            None => false,
        }
    }

    /// Move `row` back until neither a scope nor the builder's carried state
    /// straddles it.
    fn safe_start(&self, mut row: usize) -> usize {
        loop {
            let resumed = self.builder.resume_row(row);
            if resumed == row {
                return row;
            }
            row = self
                .tree
                .rebuild_point(Position::row_start(resumed))
                .row
                .min(resumed);
        }
    }

    fn restart(&mut self, row: usize) {
        let start = Position::row_start(row);
        self.tree.invalidate_from(start);
        self.builder.begin(start, &self.tree);
        self.window = Some(RebuildWindow { next_row: row });
        self.parse_position = start;
    }

    fn finish<D: Document + ?Sized>(&mut self, doc: &D) {
        let rows = doc.row_count();
        self.parse_position = Position::row_start(rows);
        self.builder.finish(self.parse_position, &mut self.tree);
        self.window = None;
        self.timer.cancel();
        self.initialized = true;

        let current = self.tree.scope_at(doc.cursor());
        debug!(
            "Scope tree ready: {} scopes over {} rows",
            self.tree.len(),
            rows
        );
        self.emit(TrackerEvent::ScopeTreeReady {
            parse_position: self.parse_position,
            current,
        });
        self.report_active(current);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The innermost scope at `pos`, from whatever has been built so far.
    pub fn scope_at(&self, pos: Position) -> ScopeId {
        self.tree.scope_at(pos)
    }

    /// Whether the tracker has parsed past `row`.
    pub fn is_ready(&self, row: usize) -> bool {
        self.parse_position.row > row
    }

    pub fn parse_position(&self) -> Position {
        self.parse_position
    }

    /// Row the pending rebuild continues from, if one is scheduled.
    pub fn pending_rebuild_row(&self) -> Option<usize> {
        self.window.map(|w| w.next_row)
    }

    /// True once a rebuild has reached the end of the document.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    pub fn flavor(&self) -> Flavor {
        self.tokenizer.flavor()
    }

    /// Time until the pending batch is due.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.timer.remaining(now)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Report the scope under the cursor if it changed.
    pub fn on_cursor_moved(&mut self, pos: Position) {
        let current = self.tree.scope_at(pos);
        self.report_active(current);
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&self) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn report_active(&mut self, current: ScopeId) {
        let key = (current, self.tree.scope(current).preamble);
        if self.last_active != Some(key) {
            self.last_active = Some(key);
            self.emit(TrackerEvent::ActiveScopeChanged { current });
        }
    }

    fn emit(&self, event: TrackerEvent) {
        // The receiver lives as long as the tracker, so sending cannot fail.
        let _ = self.sender.send(event);
    }
}
