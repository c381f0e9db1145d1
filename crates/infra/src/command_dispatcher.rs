//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (tenant-scoped)
//!   ↓
//! 2. Validate the loaded stream (tenant, aggregate, monotonic sequence)
//!   ↓
//! 3. Rehydrate aggregate
//!   ↓
//! 4. Handle command (pure decision, produces events)
//!   ↓
//! 5. Append with an exact expected version
//!   ↓
//! 6. Publish committed events to the bus
//! ```
//!
//! Publication happens only after a successful append. A publish failure is
//! reported to the caller, but the events are already durable
//! (at-least-once delivery).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use templeerp_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use templeerp_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Domain-level conflict (duplicate create, duplicate reference).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("not found")]
    NotFound,

    /// Historical payload does not match the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and the bus so tests run against the in-memory
/// pair and production swaps in Postgres without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` builds the empty aggregate for the stream
    /// (e.g. `|_, id| Warehouse::empty(WarehouseId::new(id))`). Returns the
    /// committed events; a command that decides nothing returns an empty vec
    /// and touches neither store nor bus.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: templeerp_events::Event + Serialize + DeserializeOwned,
    {
        let (aggregate, version) = self.rehydrate(tenant_id, aggregate_id, make_aggregate)?;
        let expected = ExpectedVersion::Exact(version);

        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate without handling anything.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.rehydrate(tenant_id, aggregate_id, make_aggregate)
            .map(|(aggregate, _)| aggregate)
    }

    /// Decide a command against current state without persisting or publishing.
    ///
    /// Workflows use this to check a transition before touching another stream.
    pub fn dry_run<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        command: &A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        let (aggregate, _) = self.rehydrate(tenant_id, aggregate_id, make_aggregate)?;
        aggregate.handle(command).map_err(DispatchError::from)
    }

    fn rehydrate<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<(A, u64), DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        for stored in &history {
            let ev: A::Event = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            aggregate.apply(&ev);
        }

        Ok((aggregate, stream_version(&history)))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// Reject cross-tenant data and out-of-order sequences even if a backend returns them.
fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use templeerp_events::InMemoryEventBus;
    use templeerp_products::ProductId;
    use templeerp_inventory::{
        CreateWarehouse, MovementType, ReceiveStock, Warehouse, WarehouseCommand, WarehouseId,
    };

    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> CommandDispatcher<InMemoryEventStore, Bus> {
        CommandDispatcher::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new()))
    }

    fn make(_: TenantId, id: AggregateId) -> Warehouse {
        Warehouse::empty(WarehouseId::new(id))
    }

    fn create(tenant_id: TenantId, warehouse_id: WarehouseId) -> WarehouseCommand {
        WarehouseCommand::CreateWarehouse(CreateWarehouse {
            tenant_id,
            warehouse_id,
            code: "MAIN".to_string(),
            name: "Main store".to_string(),
            occurred_at: Utc::now(),
        })
    }

    fn receive(tenant_id: TenantId, warehouse_id: WarehouseId) -> WarehouseCommand {
        WarehouseCommand::ReceiveStock(ReceiveStock {
            tenant_id,
            warehouse_id,
            product_id: ProductId::generate(),
            quantity: Decimal::new(10, 0),
            unit_cost: 500,
            batch: None,
            serials: vec![],
            reference: "OPENING".to_string(),
            movement_type: MovementType::Receipt,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_appends_then_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let tenant_id = TenantId::new();
        let wid = WarehouseId::generate();

        let committed = d
            .dispatch(tenant_id, wid.0, "inventory.warehouse", create(tenant_id, wid), make)
            .unwrap();

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].event_type, "inventory.warehouse.created");
        let env = sub.try_recv().unwrap();
        assert_eq!(env.sequence_number(), 1);
        assert_eq!(env.event_type(), "inventory.warehouse.created");
    }

    #[test]
    fn domain_conflict_maps_to_conflict() {
        let d = dispatcher();
        let tenant_id = TenantId::new();
        let wid = WarehouseId::generate();
        d.dispatch(tenant_id, wid.0, "inventory.warehouse", create(tenant_id, wid), make)
            .unwrap();

        let err = d
            .dispatch(tenant_id, wid.0, "inventory.warehouse", create(tenant_id, wid), make)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));
    }

    #[test]
    fn dry_run_does_not_persist() {
        let d = dispatcher();
        let tenant_id = TenantId::new();
        let wid = WarehouseId::generate();
        d.dispatch(tenant_id, wid.0, "inventory.warehouse", create(tenant_id, wid), make)
            .unwrap();

        let decided = d
            .dry_run(tenant_id, wid.0, &receive(tenant_id, wid), make)
            .unwrap();
        assert_eq!(decided.len(), 1);
        assert_eq!(d.store().load_stream(tenant_id, wid.0).unwrap().len(), 1);

        let loaded = d.load(tenant_id, wid.0, make).unwrap();
        assert_eq!(loaded.code(), "MAIN");
    }

    #[test]
    fn commands_on_missing_streams_are_not_found() {
        let d = dispatcher();
        let tenant_id = TenantId::new();
        let wid = WarehouseId::generate();
        let err = d
            .dispatch(tenant_id, wid.0, "inventory.warehouse", receive(tenant_id, wid), make)
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }
}
