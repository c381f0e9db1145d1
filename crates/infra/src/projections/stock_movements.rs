//! Stock movement journal.
//!
//! Each stock-changing warehouse event expands into signed movement rows, one
//! per batch drawn plus one for any untracked remainder. Reservation rows track
//! reserved quantity rather than stock on hand.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

use templeerp_core::TenantId;
use templeerp_events::EventEnvelope;
use templeerp_inventory::{MovementType, StockDraw, WarehouseEvent, WarehouseId};
use templeerp_products::ProductId;

use crate::projections::aggregate_view::decode_checked;
use crate::projections::{Projection, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryTenantStore, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub reference: String,
    pub batch_no: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub product_id: Option<ProductId>,
    pub reference: Option<String>,
}

#[derive(Debug, Default)]
pub struct StockMovementsProjection {
    store: InMemoryTenantStore<WarehouseId, Vec<StockMovement>>,
    cursors: StreamCursors,
}

impl StockMovementsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matching movements in occurrence order.
    pub fn list(&self, tenant_id: TenantId, filter: &MovementFilter) -> Vec<StockMovement> {
        let mut rows: Vec<StockMovement> = match filter.warehouse_id {
            Some(warehouse_id) => self.store.get(tenant_id, &warehouse_id).unwrap_or_default(),
            None => self.store.list(tenant_id).into_iter().flatten().collect(),
        };

        rows.retain(|m| {
            filter.product_id.is_none_or(|p| m.product_id == p)
                && filter.reference.as_deref().is_none_or(|r| m.reference == r)
        });
        rows.sort_by_key(|m| m.occurred_at);
        rows
    }

    /// Net signed quantity of one movement type for a product.
    pub fn net(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        movement_type: MovementType,
    ) -> Decimal {
        self.store
            .get(tenant_id, &warehouse_id)
            .unwrap_or_default()
            .iter()
            .filter(|m| m.product_id == product_id && m.movement_type == movement_type)
            .map(|m| m.quantity)
            .sum()
    }

    fn apply(&self, tenant_id: TenantId, event: WarehouseEvent) {
        let warehouse_id = event.warehouse_id();
        let rows = movements_for(event);
        if rows.is_empty() {
            return;
        }

        let mut rows = Some(rows);
        self.store.update(tenant_id, warehouse_id, &mut |journal| {
            journal.extend(rows.take().unwrap_or_default())
        });
    }
}

fn movements_for(event: WarehouseEvent) -> Vec<StockMovement> {
    match event {
        WarehouseEvent::WarehouseCreated(_) => vec![],
        WarehouseEvent::StockReceived(e) => vec![StockMovement {
            warehouse_id: e.warehouse_id,
            product_id: e.product_id,
            movement_type: e.movement_type,
            quantity: e.quantity,
            reference: e.reference,
            batch_no: e.batch.map(|b| b.batch_no),
            occurred_at: e.occurred_at,
        }],
        WarehouseEvent::StockIssued(e) => draw_rows(
            e.warehouse_id,
            &e.draw,
            e.movement_type,
            &e.reference,
            e.occurred_at,
        ),
        WarehouseEvent::StockAdjusted(e) => match &e.draw {
            Some(draw) => draw_rows(
                e.warehouse_id,
                draw,
                MovementType::Adjustment,
                &e.reason,
                e.occurred_at,
            ),
            None => vec![StockMovement {
                warehouse_id: e.warehouse_id,
                product_id: e.product_id,
                movement_type: MovementType::Adjustment,
                quantity: e.delta,
                reference: e.reason,
                batch_no: None,
                occurred_at: e.occurred_at,
            }],
        },
        WarehouseEvent::StockReserved(e) => e
            .lines
            .into_iter()
            .map(|line| StockMovement {
                warehouse_id: e.warehouse_id,
                product_id: line.product_id,
                movement_type: MovementType::Reservation,
                quantity: line.quantity,
                reference: e.reference.clone(),
                batch_no: None,
                occurred_at: e.occurred_at,
            })
            .collect(),
        WarehouseEvent::ReservationReleased(e) => e
            .lines
            .into_iter()
            .map(|line| StockMovement {
                warehouse_id: e.warehouse_id,
                product_id: line.product_id,
                movement_type: MovementType::Release,
                quantity: -line.quantity,
                reference: e.reference.clone(),
                batch_no: None,
                occurred_at: e.occurred_at,
            })
            .collect(),
        WarehouseEvent::ReservationConsumed(e) => {
            let mut rows: Vec<StockMovement> = e
                .draws
                .iter()
                .flat_map(|draw| {
                    draw_rows(
                        e.warehouse_id,
                        draw,
                        MovementType::Consumption,
                        &e.reference,
                        e.occurred_at,
                    )
                })
                .collect();
            rows.push(StockMovement {
                warehouse_id: e.warehouse_id,
                product_id: e.output.product_id,
                movement_type: MovementType::Production,
                quantity: e.output.quantity,
                reference: e.reference,
                batch_no: e.output.batch.map(|b| b.batch_no),
                occurred_at: e.occurred_at,
            });
            rows
        }
    }
}

/// Negative rows for a withdrawal: one per batch, then the untracked rest.
fn draw_rows(
    warehouse_id: WarehouseId,
    draw: &StockDraw,
    movement_type: MovementType,
    reference: &str,
    occurred_at: DateTime<Utc>,
) -> Vec<StockMovement> {
    let row = |quantity: Decimal, batch_no: Option<String>| StockMovement {
        warehouse_id,
        product_id: draw.product_id,
        movement_type,
        quantity: -quantity,
        reference: reference.to_string(),
        batch_no,
        occurred_at,
    };

    let mut rows: Vec<StockMovement> = draw
        .batches
        .iter()
        .map(|b| row(b.quantity, Some(b.batch_no.clone())))
        .collect();

    let batched: Decimal = draw.batches.iter().map(|b| b.quantity).sum();
    let untracked = draw.quantity - batched;
    if untracked > Decimal::ZERO {
        rows.push(row(untracked, None));
    }
    rows
}

impl Projection for StockMovementsProjection {
    fn name(&self) -> &'static str {
        "stock_movements"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        aggregate_type == streams::WAREHOUSE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        self.cursors
            .advance(tenant_id, envelope.aggregate_id(), envelope.sequence_number(), || {
                let event: WarehouseEvent = decode_checked(envelope)?;
                self.apply(tenant_id, event);
                Ok(())
            })
            .map(|_| ())
    }

    fn reset(&self) {
        self.store.clear_all();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use templeerp_inventory::{BatchDraw, StockIssued};

    #[test]
    fn batch_draws_split_into_rows_with_untracked_remainder() {
        let warehouse_id = WarehouseId::generate();
        let product_id = ProductId::generate();
        let rows = movements_for(WarehouseEvent::StockIssued(StockIssued {
            tenant_id: TenantId::new(),
            warehouse_id,
            draw: StockDraw {
                product_id,
                quantity: Decimal::from(10),
                batches: vec![
                    BatchDraw { batch_no: "B1".into(), quantity: Decimal::from(4) },
                    BatchDraw { batch_no: "B2".into(), quantity: Decimal::from(5) },
                ],
                serials: vec![],
            },
            reference: "SO-1".into(),
            movement_type: MovementType::SalesIssue,
            occurred_at: Utc::now(),
        }));

        let quantities: Vec<Decimal> = rows.iter().map(|r| r.quantity).collect();
        assert_eq!(quantities, vec![Decimal::from(-4), Decimal::from(-5), Decimal::from(-1)]);
        assert_eq!(rows[2].batch_no, None);
        assert!(rows.iter().all(|r| r.movement_type == MovementType::SalesIssue));
    }
}
