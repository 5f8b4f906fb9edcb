//! Flattens comment reply trees into depth-first threads of display rows.

use crate::collapse::CollapseSet;
use crate::records::{RecordId, SyncObject};
use crate::store::RecordStore;
use serde::Serialize;
use std::collections::HashSet;

pub const MIN_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Comment,
    /// Topmost folded comment; its subtree is not emitted.
    Collapsed,
    /// A "more comments" placeholder, always a leaf until it is loaded.
    LoadMore,
    /// Stands in for a branch that continues past the display depth.
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadRow {
    pub id: RecordId,
    pub identifier: String,
    pub level: usize,
    pub kind: RowKind,
}

/// One root comment and everything visible beneath it, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub root: RecordId,
    pub rows: Vec<ThreadRow>,
}

impl Thread {
    pub fn position_of(&self, id: RecordId) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct TreeBuilder<'a> {
    store: &'a RecordStore,
    collapsed: &'a CollapseSet,
    max_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(store: &'a RecordStore, collapsed: &'a CollapseSet, max_depth: usize) -> Self {
        Self {
            store,
            collapsed,
            max_depth: max_depth.max(MIN_DEPTH),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// One thread per root, in the given order. Roots no longer in the store are dropped.
    pub fn build(&self, roots: &[RecordId]) -> Vec<Thread> {
        roots
            .iter()
            .filter(|root| self.store.contains(**root))
            .map(|root| Thread {
                root: *root,
                rows: self.flatten(*root),
            })
            .collect()
    }

    /// Depth-first rows of `root`'s subtree, root included at level 0.
    ///
    /// Replies are real rows while their level stays below `max_depth - 1`. A reply whose
    /// children would land on `max_depth - 1` gets only its first child, marked as a
    /// continuation, and nothing deeper.
    pub fn flatten(&self, root: RecordId) -> Vec<ThreadRow> {
        let mut rows = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(root, 0usize)];
        let continuation_level = self.max_depth - 1;

        while let Some((id, level)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(record) = self.store.get(id) else {
                continue;
            };
            let kind = if level == continuation_level {
                RowKind::Continuation
            } else if record.is_placeholder() {
                RowKind::LoadMore
            } else if self.collapsed.contains(record.identifier()) {
                RowKind::Collapsed
            } else {
                RowKind::Comment
            };
            rows.push(ThreadRow {
                id,
                identifier: record.identifier().to_string(),
                level,
                kind,
            });
            if kind != RowKind::Comment {
                continue;
            }

            let child_level = level + 1;
            let replies = record.replies();
            let visible: &[RecordId] = if child_level < continuation_level {
                replies
            } else {
                &replies[..replies.len().min(1)]
            };
            stack.extend(visible.iter().rev().map(|child| (*child, child_level)));
        }
        rows
    }
}
