//! Stream bindings for every aggregate the system persists.
//!
//! Each aggregate gets a stable `aggregate_type` name, an empty constructor for
//! rehydration, and a liveness check. Each event enum exposes the tenant and
//! stream it belongs to, so projections can cross-check envelopes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use templeerp_accounting::{
    AcYear, AcYearEvent, AcYearId, BudgetEvent, BudgetId, EntryEvent, EntryId, FundBudget,
    JournalEntry, Ledger, LedgerEvent, LedgerId,
};
use templeerp_core::{Aggregate, AggregateId, DomainError, TenantId};
use templeerp_events::{Event, EventBus, EventEnvelope};
use templeerp_inventory::{Warehouse, WarehouseEvent, WarehouseId};
use templeerp_manufacturing::{
    BomEvent, BomId, BomMaster, ManufacturingOrder, ManufacturingOrderId, OrderEvent,
};
use templeerp_products::{Product, ProductEvent, ProductId};
use templeerp_purchasing::{PurchaseOrder, PurchaseOrderEvent, PurchaseOrderId};
use templeerp_sales::{SalesOrder, SalesOrderEvent, SalesOrderId};
use templeerp_temple::{Booking, BookingEvent, BookingId, PagodaEvent, PagodaTower, PagodaTowerId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};

pub const LEDGER: &str = "accounting.ledger";
pub const AC_YEAR: &str = "accounting.ac_year";
pub const ENTRY: &str = "accounting.entry";
pub const FUND_BUDGET: &str = "accounting.fund_budget";
pub const PRODUCT: &str = "products.product";
pub const WAREHOUSE: &str = "inventory.warehouse";
pub const BOM: &str = "manufacturing.bom";
pub const MANUFACTURING_ORDER: &str = "manufacturing.order";
pub const SALES_ORDER: &str = "sales.order";
pub const PURCHASE_ORDER: &str = "purchasing.order";
pub const PAGODA_TOWER: &str = "temple.pagoda_tower";
pub const BOOKING: &str = "temple.booking";

/// An aggregate with a persisted stream.
pub trait StreamAggregate: Aggregate<Error = DomainError> + Clone + Send + Sync + 'static {
    const AGGREGATE_TYPE: &'static str;

    fn empty_stream(id: AggregateId) -> Self;

    /// Has the creating event been applied?
    fn is_live(&self) -> bool;
}

/// A domain event that knows which tenant and stream it belongs to.
pub trait StreamEvent {
    fn event_tenant(&self) -> TenantId;
    fn stream_id(&self) -> AggregateId;
}

macro_rules! bind_stream {
    ($agg:ty, $id:ty, $kind:expr, $event:ty, $id_fn:ident) => {
        impl StreamAggregate for $agg {
            const AGGREGATE_TYPE: &'static str = $kind;

            fn empty_stream(id: AggregateId) -> Self {
                <$agg>::empty(<$id>::new(id))
            }

            fn is_live(&self) -> bool {
                self.is_created()
            }
        }

        impl StreamEvent for $event {
            fn event_tenant(&self) -> TenantId {
                self.tenant_id()
            }

            fn stream_id(&self) -> AggregateId {
                self.$id_fn().aggregate_id()
            }
        }
    };
}

bind_stream!(Ledger, LedgerId, LEDGER, LedgerEvent, ledger_id);
bind_stream!(AcYear, AcYearId, AC_YEAR, AcYearEvent, year_id);
bind_stream!(JournalEntry, EntryId, ENTRY, EntryEvent, entry_id);
bind_stream!(FundBudget, BudgetId, FUND_BUDGET, BudgetEvent, budget_id);
bind_stream!(Product, ProductId, PRODUCT, ProductEvent, product_id);
bind_stream!(Warehouse, WarehouseId, WAREHOUSE, WarehouseEvent, warehouse_id);
bind_stream!(BomMaster, BomId, BOM, BomEvent, bom_id);
bind_stream!(ManufacturingOrder, ManufacturingOrderId, MANUFACTURING_ORDER, OrderEvent, order_id);
bind_stream!(SalesOrder, SalesOrderId, SALES_ORDER, SalesOrderEvent, order_id);
bind_stream!(PurchaseOrder, PurchaseOrderId, PURCHASE_ORDER, PurchaseOrderEvent, order_id);
bind_stream!(PagodaTower, PagodaTowerId, PAGODA_TOWER, PagodaEvent, tower_id);
bind_stream!(Booking, BookingId, BOOKING, BookingEvent, booking_id);

/// Typed shortcuts over [`CommandDispatcher`] for bound aggregates.
impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn execute<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        command: A::Command,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: StreamAggregate,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        self.dispatch(tenant_id, aggregate_id, A::AGGREGATE_TYPE, command, |_, id| {
            A::empty_stream(id)
        })
    }

    /// Load a live aggregate; a stream with no creating event is `NotFound`.
    pub fn fetch<A>(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Result<A, DispatchError>
    where
        A: StreamAggregate,
        A::Event: DeserializeOwned,
    {
        let aggregate = self.load(tenant_id, aggregate_id, |_, id| A::empty_stream(id))?;
        if aggregate.is_live() {
            Ok(aggregate)
        } else {
            Err(DispatchError::NotFound)
        }
    }

    pub fn check<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        command: &A::Command,
    ) -> Result<Vec<A::Event>, DispatchError>
    where
        A: StreamAggregate,
        A::Event: DeserializeOwned,
    {
        self.dry_run(tenant_id, aggregate_id, command, |_, id| A::empty_stream(id))
    }
}
