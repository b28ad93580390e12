//! Bounded linear undo/redo over before/after snapshot pairs.
//!
//! DESIGN
//! ======
//! Each committed mutation records the editable content before and after it.
//! Undo hands back `before`, redo hands back `after`, so replaying either
//! direction is a plain restore with no inverse-operation bookkeeping.
//! Recording a new entry discards the redo stack (linear history). When the
//! undo stack exceeds its depth the oldest entry is dropped; the newest entries
//! stay contiguous so undo from the current point is never broken.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::consts::HISTORY_DEPTH;

/// One committed transition.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry<T> {
    pub before: T,
    pub after: T,
}

/// Dual-stack history with a fixed maximum undo depth.
#[derive(Debug, Clone)]
pub struct History<T> {
    undo: VecDeque<HistoryEntry<T>>,
    redo: Vec<HistoryEntry<T>>,
    max_depth: usize,
}

impl<T: Clone + PartialEq> History<T> {
    /// Create an empty history keeping at most `max_depth` undo entries.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), max_depth: max_depth.max(1) }
    }

    /// Record a committed mutation. Identical snapshots are not a mutation
    /// and are ignored; returns whether an entry was pushed.
    pub fn record(&mut self, before: T, after: T) -> bool {
        if before == after {
            return false;
        }
        self.redo.clear();
        self.undo.push_back(HistoryEntry { before, after });
        while self.undo.len() > self.max_depth {
            self.undo.pop_front();
        }
        true
    }

    /// Step back one entry, returning the state to restore.
    pub fn undo(&mut self) -> Option<T> {
        let entry = self.undo.pop_back()?;
        let state = entry.before.clone();
        self.redo.push(entry);
        Some(state)
    }

    /// Re-apply the most recently undone entry, returning the state to restore.
    pub fn redo(&mut self) -> Option<T> {
        let entry = self.redo.pop()?;
        let state = entry.after.clone();
        self.undo.push_back(entry);
        Some(state)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Drop all entries in both directions.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl<T: Clone + PartialEq> Default for History<T> {
    fn default() -> Self {
        Self::new(HISTORY_DEPTH)
    }
}
