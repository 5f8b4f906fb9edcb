//! Collapse state: which comments the user folded, and what that means for everything
//! beneath them.

use crate::records::{RecordId, SyncObject};
use crate::store::RecordStore;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Shown in full.
    Expanded,
    /// The topmost folded comment of its chain; shown as a compact row.
    Collapsed,
    /// Not shown at all.
    Hidden,
}

impl Visibility {
    /// Derived from the comment's own membership and whether any ancestor is folded.
    /// A folded comment below another folded comment is hidden, not compact.
    pub fn derive(toggled: bool, ancestor_collapsed: bool) -> Self {
        match (toggled, ancestor_collapsed) {
            (_, true) => Self::Hidden,
            (true, false) => Self::Collapsed,
            (false, false) => Self::Expanded,
        }
    }

    pub fn is_visible(self) -> bool {
        self != Self::Hidden
    }
}

/// Identifiers the user toggled directly. Inherited state is never stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseSet {
    toggled: HashSet<String>,
}

impl CollapseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.toggled.contains(identifier)
    }

    /// Flips membership and returns whether the comment is now folded.
    pub fn toggle(&mut self, identifier: &str) -> bool {
        if self.toggled.remove(identifier) {
            false
        } else {
            self.toggled.insert(identifier.to_string());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.toggled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toggled.is_empty()
    }

    /// Sorted, for stable output.
    pub fn identifiers(&self) -> BTreeSet<&str> {
        self.toggled.iter().map(String::as_str).collect()
    }

    fn is_toggled(&self, store: &RecordStore, id: RecordId) -> bool {
        store
            .get(id)
            .map(|record| self.contains(record.identifier()))
            .unwrap_or(false)
    }

    /// Whether any ancestor of `id` is folded. The walk stops after `boundary` returns true
    /// for a record, so a sub-view rooted below a folded comment is unaffected by it.
    pub fn ancestor_collapsed(
        &self,
        store: &RecordStore,
        id: RecordId,
        boundary: impl Fn(RecordId) -> bool,
    ) -> bool {
        let mut seen = HashSet::from([id]);
        let mut cursor = id;
        while !boundary(cursor) {
            let Some(parent) = store.get(cursor).and_then(|record| record.parent()) else {
                return false;
            };
            if !seen.insert(parent) {
                return false;
            }
            if self.is_toggled(store, parent) {
                return true;
            }
            cursor = parent;
        }
        false
    }

    pub fn visibility(
        &self,
        store: &RecordStore,
        id: RecordId,
        boundary: impl Fn(RecordId) -> bool,
    ) -> Visibility {
        Visibility::derive(
            self.is_toggled(store, id),
            self.ancestor_collapsed(store, id, boundary),
        )
    }

    /// Folded directly or through an ancestor.
    pub fn is_collapsed(
        &self,
        store: &RecordStore,
        id: RecordId,
        boundary: impl Fn(RecordId) -> bool,
    ) -> bool {
        self.is_toggled(store, id) || self.ancestor_collapsed(store, id, boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Record, RecordKind};

    fn chain(store: &mut RecordStore, identifiers: &[&str]) -> Vec<RecordId> {
        let ids: Vec<RecordId> = identifiers
            .iter()
            .map(|identifier| store.insert(Record::bare(RecordKind::Comment, *identifier)))
            .collect();
        for pair in ids.windows(2) {
            if let Some(Record::Comment(child)) = store.get_mut(pair[1]) {
                child.parent = Some(pair[0]);
            }
            if let Some(Record::Comment(parent)) = store.get_mut(pair[0]) {
                parent.replies.push(pair[1]);
            }
        }
        ids
    }

    #[test]
    fn derive_table() {
        assert_eq!(Visibility::derive(false, false), Visibility::Expanded);
        assert_eq!(Visibility::derive(true, false), Visibility::Collapsed);
        assert_eq!(Visibility::derive(true, true), Visibility::Hidden);
        assert_eq!(Visibility::derive(false, true), Visibility::Hidden);
    }

    #[test]
    fn toggle_flips_membership() {
        let mut set = CollapseSet::new();
        assert!(set.toggle("a"));
        assert!(set.contains("a"));
        assert!(!set.toggle("a"));
        assert!(set.is_empty());
    }

    #[test]
    fn descendants_of_folded_comment_are_hidden() {
        let mut store = RecordStore::new();
        let ids = chain(&mut store, &["r", "c", "g"]);
        let mut set = CollapseSet::new();
        set.toggle("r");
        set.toggle("c");

        let no_boundary = |_: RecordId| false;
        assert_eq!(set.visibility(&store, ids[0], no_boundary), Visibility::Collapsed);
        assert_eq!(set.visibility(&store, ids[1], no_boundary), Visibility::Hidden);
        assert_eq!(set.visibility(&store, ids[2], no_boundary), Visibility::Hidden);
        assert!(set.is_collapsed(&store, ids[2], no_boundary));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn boundary_stops_the_walk() {
        let mut store = RecordStore::new();
        let ids = chain(&mut store, &["r", "c", "g"]);
        let mut set = CollapseSet::new();
        set.toggle("r");
        let focus = ids[1];
        assert_eq!(
            set.visibility(&store, ids[2], |id| id == focus),
            Visibility::Expanded
        );
    }
}
