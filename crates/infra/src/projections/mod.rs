//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: reconstructed from the event stream on boot or demand
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe for at-least-once delivery

use serde_json::Value as JsonValue;

use templeerp_events::EventEnvelope;

pub mod accounting;
pub mod aggregate_view;
pub mod cursor;
pub mod inventory_stock;
pub mod ledger_postings;
pub mod set;
pub mod stock_movements;

pub use accounting::{AccountingQueries, LedgerBalance, TrialBalance, TrialBalanceRow};
pub use aggregate_view::AggregateProjection;
pub use cursor::{ProjectionError, StreamCursors};
pub use inventory_stock::{StockLevel, stock_levels};
pub use ledger_postings::{LedgerPosting, LedgerPostingsProjection};
pub use set::ProjectionSet;
pub use stock_movements::{MovementFilter, StockMovement, StockMovementsProjection};

/// A read model fed by published envelopes.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Does this projection consume streams of `aggregate_type`?
    fn handles(&self, aggregate_type: &str) -> bool;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all state and cursors ahead of a rebuild.
    fn reset(&self);
}
