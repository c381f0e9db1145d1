//! Manufacturing order lifecycle across the order and warehouse streams.
//!
//! Validation reserves the BOM requirements under the order's reservation
//! reference; completion consumes that reservation and credits the finished
//! goods in one warehouse event; cancellation releases it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use templeerp_core::TenantId;
use templeerp_events::{EventBus, EventEnvelope};
use templeerp_inventory::{
    BatchReceipt, ConsumeReservation, ProductionOutput, ReleaseReservation, ReservationLine,
    ReserveStock, Warehouse, WarehouseCommand, WarehouseId,
};
use templeerp_manufacturing::{
    BomId, BomMaster, BomStatus, CancelOrder, CompleteOrder, CreateOrder, ManufacturingOrder,
    ManufacturingOrderId, OrderCommand, StartOrder, ValidateOrder, production_unit_cost,
};
use templeerp_products::Product;

use crate::event_store::EventStore;
use crate::workflows::{WorkflowError, Workflows};

#[derive(Debug, Clone)]
pub struct NewManufacturingOrder {
    pub order_id: ManufacturingOrderId,
    pub order_no: String,
    pub bom_id: BomId,
    pub quantity: Decimal,
    pub warehouse_id: WarehouseId,
    pub planned_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create a DRAFT order with requirements snapshotted from an active BOM.
    ///
    /// The finished product and every component must be stockable.
    pub fn create_manufacturing_order(
        &self,
        tenant_id: TenantId,
        req: NewManufacturingOrder,
    ) -> Result<ManufacturingOrderId, WorkflowError> {
        let bom: BomMaster = self.fetch(tenant_id, req.bom_id.aggregate_id(), "bom")?;
        if bom.status() != BomStatus::Active {
            return Err(WorkflowError::InvariantViolation(format!(
                "bom {} is not active",
                bom.code()
            )));
        }
        let product_id = bom
            .product_id()
            .ok_or_else(|| WorkflowError::InvariantViolation("bom has no finished product".into()))?;
        self.stockable_product(tenant_id, product_id)?;
        for component in bom.components() {
            self.stockable_product(tenant_id, component.product_id)?;
        }
        self.fetch::<Warehouse>(tenant_id, req.warehouse_id.aggregate_id(), "warehouse")?;

        let cmd = CreateOrder {
            tenant_id,
            order_id: req.order_id,
            order_no: req.order_no,
            bom_id: req.bom_id,
            product_id,
            requirements: bom.requirements(req.quantity),
            quantity: req.quantity,
            warehouse_id: req.warehouse_id,
            planned_date: req.planned_date,
            occurred_at: req.occurred_at,
        };
        self.execute::<ManufacturingOrder>(
            tenant_id,
            req.order_id.aggregate_id(),
            OrderCommand::CreateOrder(cmd),
        )?;
        Ok(req.order_id)
    }

    /// DRAFT → VALIDATED, reserving the requirements in the order's warehouse.
    ///
    /// The warehouse re-checks availability when the reservation is appended.
    /// If the order transition then fails, the reservation is released again.
    pub fn validate_manufacturing_order(
        &self,
        tenant_id: TenantId,
        order_id: ManufacturingOrderId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let order: ManufacturingOrder =
            self.fetch(tenant_id, order_id.aggregate_id(), "manufacturing order")?;
        let warehouse_id = order_warehouse(&order)?;
        self.fetch::<Warehouse>(tenant_id, warehouse_id.aggregate_id(), "warehouse")?;

        let validate = OrderCommand::ValidateOrder(ValidateOrder {
            tenant_id,
            order_id,
            occurred_at,
        });
        self.dispatcher
            .check::<ManufacturingOrder>(tenant_id, order_id.aggregate_id(), &validate)?;

        let reference = order.reservation_reference();
        let lines: Vec<ReservationLine> = order
            .requirements()
            .iter()
            .map(|r| ReservationLine {
                product_id: r.product_id,
                quantity: r.quantity,
            })
            .collect();

        self.execute::<Warehouse>(
            tenant_id,
            warehouse_id.aggregate_id(),
            WarehouseCommand::ReserveStock(ReserveStock {
                tenant_id,
                warehouse_id,
                reference: reference.clone(),
                lines,
                occurred_at,
            }),
        )?;
        info!(%tenant_id, order = %order_id, %reference, "stock reserved for manufacturing order");

        if let Err(err) = self.execute::<ManufacturingOrder>(tenant_id, order_id.aggregate_id(), validate) {
            warn!(%tenant_id, order = %order_id, error = %err, "order validation failed; releasing reservation");
            self.release_reservation(tenant_id, warehouse_id, &reference, occurred_at);
            return Err(err);
        }

        info!(%tenant_id, order = %order_id, "manufacturing order validated");
        Ok(())
    }

    pub fn start_manufacturing_order(
        &self,
        tenant_id: TenantId,
        order_id: ManufacturingOrderId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        self.execute::<ManufacturingOrder>(
            tenant_id,
            order_id.aggregate_id(),
            OrderCommand::StartOrder(StartOrder {
                tenant_id,
                order_id,
                occurred_at,
            }),
        )?;
        Ok(())
    }

    /// IN_PROGRESS → COMPLETED.
    ///
    /// Consumes the reservation and credits the produced quantity at the
    /// standard cost of the consumed components, then completes the order.
    /// Every component cost is looked up before anything is written.
    pub fn complete_manufacturing_order(
        &self,
        tenant_id: TenantId,
        order_id: ManufacturingOrderId,
        produced_quantity: Decimal,
        batch_no: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let order: ManufacturingOrder =
            self.fetch(tenant_id, order_id.aggregate_id(), "manufacturing order")?;
        let warehouse_id = order_warehouse(&order)?;
        let product_id = order
            .product_id()
            .ok_or_else(|| WorkflowError::InvariantViolation("order has no product".into()))?;

        let unit_cost = production_unit_cost(
            order.requirements(),
            |component| {
                self.fetch::<Product>(tenant_id, component.aggregate_id(), "product")
                    .map(|p| p.standard_cost())
            },
            produced_quantity,
        )?;

        let complete = OrderCommand::CompleteOrder(CompleteOrder {
            tenant_id,
            order_id,
            produced_quantity,
            batch_no: batch_no.clone(),
            unit_cost,
            occurred_at,
        });
        self.dispatcher
            .check::<ManufacturingOrder>(tenant_id, order_id.aggregate_id(), &complete)?;

        self.execute::<Warehouse>(
            tenant_id,
            warehouse_id.aggregate_id(),
            WarehouseCommand::ConsumeReservation(ConsumeReservation {
                tenant_id,
                warehouse_id,
                reference: order.reservation_reference(),
                output: ProductionOutput {
                    product_id,
                    quantity: produced_quantity,
                    unit_cost,
                    batch: batch_no.map(|batch_no| BatchReceipt {
                        batch_no,
                        expiry: None,
                    }),
                },
                occurred_at,
            }),
        )?;
        info!(%tenant_id, order = %order_id, %produced_quantity, unit_cost, "reservation consumed");

        self.execute::<ManufacturingOrder>(tenant_id, order_id.aggregate_id(), complete)
            .map_err(|err| {
                error!(%tenant_id, order = %order_id, error = %err, "stock consumed but order not completed");
                WorkflowError::after_commit("complete order", err)
            })?;

        info!(%tenant_id, order = %order_id, "manufacturing order completed");
        Ok(())
    }

    /// Cancel an order and release its reservation when it holds one.
    pub fn cancel_manufacturing_order(
        &self,
        tenant_id: TenantId,
        order_id: ManufacturingOrderId,
        reason: String,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let order: ManufacturingOrder =
            self.fetch(tenant_id, order_id.aggregate_id(), "manufacturing order")?;
        let holds_reservation = order.status().holds_reservation();

        self.execute::<ManufacturingOrder>(
            tenant_id,
            order_id.aggregate_id(),
            OrderCommand::CancelOrder(CancelOrder {
                tenant_id,
                order_id,
                reason,
                occurred_at,
            }),
        )?;
        info!(%tenant_id, order = %order_id, "manufacturing order cancelled");

        if holds_reservation {
            let warehouse_id = order_warehouse(&order)?;
            self.execute::<Warehouse>(
                tenant_id,
                warehouse_id.aggregate_id(),
                WarehouseCommand::ReleaseReservation(ReleaseReservation {
                    tenant_id,
                    warehouse_id,
                    reference: order.reservation_reference(),
                    occurred_at,
                }),
            )
            .map_err(|err| WorkflowError::after_commit("release reservation", err))?;
            info!(%tenant_id, order = %order_id, "reservation released");
        }

        Ok(())
    }

    /// Compensation: best effort, logged when it fails.
    fn release_reservation(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        reference: &str,
        occurred_at: DateTime<Utc>,
    ) {
        let released = self.execute::<Warehouse>(
            tenant_id,
            warehouse_id.aggregate_id(),
            WarehouseCommand::ReleaseReservation(ReleaseReservation {
                tenant_id,
                warehouse_id,
                reference: reference.to_string(),
                occurred_at,
            }),
        );
        match released {
            Ok(_) => info!(%tenant_id, %reference, "compensating release committed"),
            Err(err) => error!(%tenant_id, %reference, error = %err, "compensating release failed"),
        }
    }
}

fn order_warehouse(order: &ManufacturingOrder) -> Result<WarehouseId, WorkflowError> {
    order
        .warehouse_id()
        .ok_or_else(|| WorkflowError::InvariantViolation("order has no warehouse".into()))
}
