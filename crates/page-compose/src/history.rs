//! Bounded undo/redo over page-sequence snapshots
//!
//! Snapshots hold page metadata only. Sources are referenced by id and
//! re-resolved against the live registry when a snapshot is restored.

use crate::constants::DEFAULT_HISTORY_DEPTH;
use crate::model::PageSequence;
use crate::types::Page;
use std::collections::VecDeque;

/// A detached copy of the page sequence at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pages: Vec<Page>,
}

impl HistorySnapshot {
    pub(crate) fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}

#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<HistorySnapshot>,
    redo_stack: VecDeque<HistorySnapshot>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `current` as the state to return to, invalidating any redo
    pub fn capture(&mut self, current: &PageSequence) {
        push_bounded(&mut self.undo_stack, current.snapshot(), self.capacity);
        self.redo_stack.clear();
    }

    /// Step back one state. `current` becomes redoable.
    pub fn undo(&mut self, current: &PageSequence) -> Option<HistorySnapshot> {
        let previous = self.undo_stack.pop_back()?;
        push_bounded(&mut self.redo_stack, current.snapshot(), self.capacity);
        Some(previous)
    }

    /// Step forward one state. `current` becomes undoable.
    pub fn redo(&mut self, current: &PageSequence) -> Option<HistorySnapshot> {
        let next = self.redo_stack.pop_back()?;
        push_bounded(&mut self.undo_stack, current.snapshot(), self.capacity);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded(stack: &mut VecDeque<HistorySnapshot>, snapshot: HistorySnapshot, capacity: usize) {
    stack.push_back(snapshot);
    while stack.len() > capacity {
        stack.pop_front();
    }
}
