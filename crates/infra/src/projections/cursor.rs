use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use templeerp_core::{AggregateId, TenantId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// Last applied sequence number per `(tenant, aggregate)` stream.
///
/// Replays at or below the cursor are skipped, so projections tolerate
/// at-least-once delivery. Sequences must advance by exactly one, starting at
/// 1; an early envelope is rejected and applies on a later delivery.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: Mutex<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` if `seq` is the next event of the stream.
    ///
    /// Returns `Ok(false)` for duplicates. The cursor only moves when `apply`
    /// succeeds; the lock is held meanwhile so one stream never applies twice
    /// concurrently.
    pub fn advance(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<bool, ProjectionError> {
        let mut cursors = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        cursors.insert(key, seq);
        Ok(true)
    }

    pub fn last(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        let cursors = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cursors
            .get(&CursorKey {
                tenant_id,
                aggregate_id,
            })
            .copied()
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> Result<(), ProjectionError> {
        Ok(())
    }

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let t = TenantId::new();
        let a = AggregateId::new();

        assert_eq!(cursors.advance(t, a, 1, ok), Ok(true));
        assert_eq!(cursors.advance(t, a, 1, ok), Ok(false));
        assert_eq!(cursors.advance(t, a, 2, ok), Ok(true));
        assert_eq!(
            cursors.advance(t, a, 4, ok),
            Err(ProjectionError::NonMonotonicSequence { last: 2, found: 4 })
        );
        assert_eq!(cursors.last(t, a), 2);
    }

    #[test]
    fn failed_apply_does_not_move_the_cursor() {
        let cursors = StreamCursors::new();
        let t = TenantId::new();
        let a = AggregateId::new();

        let err = cursors
            .advance(t, a, 1, || Err(ProjectionError::Deserialize("bad".into())))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::Deserialize(_)));
        assert_eq!(cursors.last(t, a), 0);
        assert_eq!(cursors.advance(t, a, 1, ok), Ok(true));
    }

    #[test]
    fn streams_start_at_the_first_event() {
        let cursors = StreamCursors::new();
        let t = TenantId::new();
        let a = AggregateId::new();

        assert_eq!(
            cursors.advance(t, a, 2, ok),
            Err(ProjectionError::NonMonotonicSequence { last: 0, found: 2 })
        );
        assert_eq!(cursors.last(t, a), 0);
        assert_eq!(cursors.advance(t, a, 1, ok), Ok(true));
        assert_eq!(cursors.advance(t, a, 2, ok), Ok(true));
    }

    #[test]
    fn sequence_zero_is_rejected() {
        let cursors = StreamCursors::new();
        assert!(cursors.advance(TenantId::new(), AggregateId::new(), 0, ok).is_err());
    }

    #[test]
    fn streams_are_tracked_per_tenant() {
        let cursors = StreamCursors::new();
        let a = AggregateId::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());

        assert_eq!(cursors.advance(t1, a, 1, ok), Ok(true));
        assert_eq!(cursors.advance(t2, a, 1, ok), Ok(true));
        assert_eq!(cursors.last(t1, a), 1);
    }
}
