use serde_json::Value as JsonValue;
use tracing::{info, warn};

use templeerp_accounting::{AcYear, FundBudget, JournalEntry, Ledger};
use templeerp_core::TenantId;
use templeerp_events::EventEnvelope;
use templeerp_inventory::{Warehouse, WarehouseId};
use templeerp_manufacturing::{BomMaster, ManufacturingOrder};
use templeerp_products::{Product, ProductId};
use templeerp_purchasing::PurchaseOrder;
use templeerp_sales::SalesOrder;
use templeerp_temple::{Booking, PagodaTower};

use crate::projections::{
    AccountingQueries, AggregateProjection, LedgerPostingsProjection, Projection,
    ProjectionError, StockLevel, StockMovementsProjection, stock_levels,
};

/// Every read model of the system, routed by aggregate type.
#[derive(Debug)]
pub struct ProjectionSet {
    pub ledgers: AggregateProjection<Ledger>,
    pub years: AggregateProjection<AcYear>,
    pub entries: AggregateProjection<JournalEntry>,
    pub postings: LedgerPostingsProjection,
    pub budgets: AggregateProjection<FundBudget>,
    pub products: AggregateProjection<Product>,
    pub warehouses: AggregateProjection<Warehouse>,
    pub movements: StockMovementsProjection,
    pub boms: AggregateProjection<BomMaster>,
    pub manufacturing_orders: AggregateProjection<ManufacturingOrder>,
    pub sales_orders: AggregateProjection<SalesOrder>,
    pub purchase_orders: AggregateProjection<PurchaseOrder>,
    pub pagoda_towers: AggregateProjection<PagodaTower>,
    pub bookings: AggregateProjection<Booking>,
}

impl Default for ProjectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionSet {
    pub fn new() -> Self {
        Self {
            ledgers: AggregateProjection::new("ledgers"),
            years: AggregateProjection::new("ac_years"),
            entries: AggregateProjection::new("journal_entries"),
            postings: LedgerPostingsProjection::new(),
            budgets: AggregateProjection::new("fund_budgets"),
            products: AggregateProjection::new("products"),
            warehouses: AggregateProjection::new("warehouses"),
            movements: StockMovementsProjection::new(),
            boms: AggregateProjection::new("boms"),
            manufacturing_orders: AggregateProjection::new("manufacturing_orders"),
            sales_orders: AggregateProjection::new("sales_orders"),
            purchase_orders: AggregateProjection::new("purchase_orders"),
            pagoda_towers: AggregateProjection::new("pagoda_towers"),
            bookings: AggregateProjection::new("bookings"),
        }
    }

    fn all(&self) -> [&dyn Projection; 14] {
        [
            &self.ledgers,
            &self.years,
            &self.entries,
            &self.postings,
            &self.budgets,
            &self.products,
            &self.warehouses,
            &self.movements,
            &self.boms,
            &self.manufacturing_orders,
            &self.sales_orders,
            &self.purchase_orders,
            &self.pagoda_towers,
            &self.bookings,
        ]
    }

    /// Feed one envelope to every projection that consumes its aggregate type.
    ///
    /// All handlers run even if one fails; the first failure is returned.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let mut first_error = None;
        let mut handled = false;

        for projection in self.all() {
            if !projection.handles(envelope.aggregate_type()) {
                continue;
            }
            handled = true;
            if let Err(err) = projection.apply_envelope(envelope) {
                warn!(
                    projection = projection.name(),
                    event_type = envelope.event_type(),
                    sequence = envelope.sequence_number(),
                    error = %err,
                    "projection rejected envelope"
                );
                first_error.get_or_insert(err);
            }
        }

        if !handled {
            warn!(aggregate_type = envelope.aggregate_type(), "no projection for aggregate type");
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Reset every read model and replay `envelopes` in stream order.
    pub fn rebuild(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<usize, ProjectionError> {
        for projection in self.all() {
            projection.reset();
        }

        let mut envelopes: Vec<_> = envelopes.into_iter().collect();
        // Deterministic replay order: tenant, aggregate, sequence.
        envelopes.sort_by_key(|e| (e.tenant_id(), e.aggregate_id(), e.sequence_number()));

        for envelope in &envelopes {
            self.apply_envelope(envelope)?;
        }

        info!(events = envelopes.len(), "projections rebuilt");
        Ok(envelopes.len())
    }

    pub fn accounting(&self) -> AccountingQueries<'_> {
        AccountingQueries {
            ledgers: &self.ledgers,
            years: &self.years,
            budgets: &self.budgets,
            postings: &self.postings,
        }
    }

    pub fn stock_levels(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
        product_id: Option<ProductId>,
    ) -> Vec<StockLevel> {
        stock_levels(&self.warehouses, &self.products, tenant_id, warehouse_id, product_id)
    }
}
