//! Per-field state machine for optimistic mutations.
//!
//! A field starts `Committed`. Beginning a mutation moves it to `Pending`, remembering the
//! value to restore; the remote outcome then either commits the optimistic value or rolls
//! back to the previous one. A second mutation while one is pending is refused, so two
//! in-flight operations can never interleave their snapshots.

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optimistic<T> {
    Committed(T),
    Pending { optimistic: T, previous: T },
    RolledBack(T),
}

impl<T: Clone> Optimistic<T> {
    pub fn new(value: T) -> Self {
        Self::Committed(value)
    }

    /// The value the presentation layer should show.
    pub fn value(&self) -> &T {
        match self {
            Self::Committed(value) | Self::RolledBack(value) => value,
            Self::Pending { optimistic, .. } => optimistic,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Applies `optimistic` locally and returns the value it replaced.
    pub fn begin(&mut self, optimistic: T) -> SyncResult<T> {
        if self.is_pending() {
            return Err(SyncError::MutationPending);
        }
        let previous = self.value().clone();
        *self = Self::Pending {
            optimistic,
            previous: previous.clone(),
        };
        Ok(previous)
    }

    /// Makes the pending value authoritative. Returns false if nothing was pending.
    pub fn commit(&mut self) -> bool {
        let next = match self {
            Self::Pending { optimistic, .. } => Self::Committed(optimistic.clone()),
            _ => return false,
        };
        *self = next;
        true
    }

    /// Restores the value captured by [`Optimistic::begin`]. Returns false if nothing was pending.
    pub fn rollback(&mut self) -> bool {
        let next = match self {
            Self::Pending { previous, .. } => Self::RolledBack(previous.clone()),
            _ => return false,
        };
        *self = next;
        true
    }

    /// Folds server-confirmed data in. While a mutation is pending only the rollback target
    /// moves, so the optimistic value stays on screen until the remote call settles.
    pub fn merge_confirmed(&mut self, update: impl FnOnce(&mut T)) {
        match self {
            Self::Pending { previous, .. } => update(previous),
            Self::Committed(value) | Self::RolledBack(value) => {
                let mut next = value.clone();
                update(&mut next);
                *self = Self::Committed(next);
            }
        }
    }
}

impl<T: Clone + Default> Default for Optimistic<T> {
    fn default() -> Self {
        Self::Committed(T::default())
    }
}
