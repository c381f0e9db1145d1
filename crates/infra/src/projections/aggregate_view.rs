use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use templeerp_core::{AggregateId, TenantId};
use templeerp_events::EventEnvelope;

use crate::projections::{Projection, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryTenantStore, TenantStore};
use crate::streams::{StreamAggregate, StreamEvent};

/// Read model that folds each stream into its aggregate state.
///
/// Queries read the folded state directly, so date-dependent views (pagoda
/// light status, balances due) are computed at query time rather than frozen
/// into the projection.
#[derive(Debug)]
pub struct AggregateProjection<A, S = InMemoryTenantStore<AggregateId, A>> {
    name: &'static str,
    store: S,
    cursors: StreamCursors,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> AggregateProjection<A>
where
    A: StreamAggregate,
{
    pub fn new(name: &'static str) -> Self {
        Self::with_store(name, InMemoryTenantStore::new())
    }
}

impl<A, S> AggregateProjection<A, S>
where
    A: StreamAggregate,
    S: TenantStore<AggregateId, A>,
{
    pub fn with_store(name: &'static str, store: S) -> Self {
        Self {
            name,
            store,
            cursors: StreamCursors::new(),
            _aggregate: PhantomData,
        }
    }

    pub fn get(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Option<A> {
        self.store
            .get(tenant_id, &aggregate_id)
            .filter(StreamAggregate::is_live)
    }

    /// Every live aggregate of the tenant, ordered by id.
    pub fn list(&self, tenant_id: TenantId) -> Vec<A>
    where
        A::Id: Ord,
    {
        let mut items = self.store.list(tenant_id);
        items.retain(StreamAggregate::is_live);
        items.sort_by(|a, b| a.id().cmp(b.id()));
        items
    }
}

impl<A, S> Projection for AggregateProjection<A, S>
where
    A: StreamAggregate,
    A::Event: DeserializeOwned + StreamEvent,
    S: TenantStore<AggregateId, A>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        aggregate_type == A::AGGREGATE_TYPE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event: A::Event = decode_checked(envelope)?;
                let mut state = self
                    .store
                    .get(tenant_id, &aggregate_id)
                    .unwrap_or_else(|| A::empty_stream(aggregate_id));
                state.apply(&event);
                self.store.upsert(tenant_id, aggregate_id, state);
                Ok(())
            })
            .map(|_| ())
    }

    fn reset(&self) {
        self.store.clear_all();
        self.cursors.clear();
    }
}

/// Decode an envelope payload and check it belongs to the envelope's stream.
pub(crate) fn decode_checked<E>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError>
where
    E: DeserializeOwned + StreamEvent,
{
    let event: E = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    if event.event_tenant() != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if event.stream_id() != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event aggregate id does not match envelope aggregate_id".to_string(),
        ));
    }

    Ok(event)
}
