//! The serialized unit of work around the record graph.
//!
//! Every read and write of the store happens inside `perform` or `parse`, one at a time.
//! Callers must not await while inside either closure; the closures are synchronous, so the
//! lock can never be held across a suspension point.

use crate::error::{SyncError, SyncResult};
use crate::expiration::{self, ExpirationPolicy, SweepReport};
use crate::parser::Parser;
use crate::records::RecordId;
use crate::store::RecordStore;
use crate::utils::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

struct ContextInner {
    store: RecordStore,
    policy: ExpirationPolicy,
}

#[derive(Clone)]
pub struct SyncContext {
    inner: Arc<Mutex<ContextInner>>,
    clock: Arc<dyn Clock>,
}

impl SyncContext {
    pub fn new(policy: ExpirationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextInner {
                store: RecordStore::new(),
                policy,
            })),
            clock,
        }
    }

    /// Default policy on the system clock.
    pub fn with_defaults() -> Self {
        Self::new(ExpirationPolicy::default(), Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn policy(&self) -> SyncResult<ExpirationPolicy> {
        self.with_inner(|inner| Ok(inner.policy))
    }

    fn with_inner<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&mut ContextInner) -> SyncResult<T>,
    {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| SyncError::ContextPoisoned)?;
        f(&mut guard)
    }

    pub fn perform<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&mut RecordStore) -> SyncResult<T>,
    {
        self.with_inner(|inner| f(&mut inner.store))
    }

    /// Runs one parse pass. The batch cache lives exactly as long as the closure.
    pub fn parse<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&mut Parser<'_>) -> SyncResult<T>,
    {
        let now = self.now();
        self.with_inner(|inner| {
            let mut parser = Parser::new(&mut inner.store, inner.policy, now);
            let result = f(&mut parser);
            if parser.skipped() > 0 {
                tracing::debug!(skipped = parser.skipped(), "parse pass skipped records");
            }
            result
        })
    }

    pub fn sweep(&self) -> SyncResult<SweepReport> {
        let now = self.now();
        self.perform(|store| Ok(expiration::sweep(store, now)))
    }

    pub fn mark_reported(&self, id: RecordId) -> SyncResult<()> {
        self.perform(|store| expiration::mark_reported(store, id))
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordKind;
    use crate::utils::ManualClock;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn parse_then_sweep_on_manual_clock() {
        let clock = Arc::new(ManualClock::at_epoch());
        let context = SyncContext::new(ExpirationPolicy::default(), clock.clone());
        context
            .parse(|parser| parser.parse_thing(&json!({"kind": "t1", "data": {"id": "c"}})))
            .expect("parse");

        clock.advance(Duration::minutes(30));
        assert_eq!(context.sweep().expect("sweep").records_removed, 0);

        clock.advance(Duration::hours(1));
        let report = context.sweep().expect("sweep");
        assert_eq!(report.records_removed, 1);
        let remaining = context
            .perform(|store| Ok(store.find(RecordKind::Comment, "c")))
            .expect("perform");
        assert_eq!(remaining, None);
    }

    #[test]
    fn clones_share_one_store() {
        let context = SyncContext::with_defaults();
        let other = context.clone();
        context
            .parse(|parser| parser.parse_thing(&json!({"kind": "t3", "data": {"id": "p"}})))
            .expect("parse");
        let len = other.perform(|store| Ok(store.len())).expect("perform");
        assert_eq!(len, 1);
    }
}
