use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use templeerp_core::{AggregateId, TenantId};

/// A committed event plus its stream metadata, as published on the bus and
/// replayed into read models at boot.
///
/// `sequence_number` is the 1-based position in the `(tenant, aggregate)` stream;
/// read models keep a cursor on it so redelivery is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    event_type: String,
    sequence_number: u64,
    occurred_at: DateTime<Utc>,
    payload: E,
}

/// Stream coordinates of an envelope, in the order they are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPosition {
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub sequence_number: u64,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        position: StreamPosition,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id: position.tenant_id,
            aggregate_id: position.aggregate_id,
            aggregate_type: position.aggregate_type,
            event_type: event_type.into(),
            sequence_number: position.sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Business time of the fact (not the append time).
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
