use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use templeerp_core::TenantId;
use templeerp_events::{EventBus, EventEnvelope};
use templeerp_inventory::{IssueStock, MovementType, Warehouse, WarehouseCommand};
use templeerp_products::{Product, ProductId, ProductKind};
use templeerp_sales::{MarkDelivered, OrderLine, SalesOrder, SalesOrderCommand, SalesOrderId};

use crate::event_store::EventStore;
use crate::workflows::{WorkflowError, Workflows};

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Issue every stocked line from the order's warehouse, then mark it
    /// delivered. Service lines move no stock.
    ///
    /// Availability for the whole order is checked up front so a short line
    /// does not leave a partial delivery behind.
    pub fn deliver_sales_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let order: SalesOrder = self.fetch(tenant_id, order_id.aggregate_id(), "sales order")?;
        let deliver = SalesOrderCommand::MarkDelivered(MarkDelivered {
            tenant_id,
            order_id,
            occurred_at,
        });
        self.dispatcher
            .check::<SalesOrder>(tenant_id, order_id.aggregate_id(), &deliver)?;

        let warehouse_id = order
            .warehouse_id()
            .ok_or_else(|| WorkflowError::InvariantViolation("sales order has no warehouse".into()))?;
        let warehouse: Warehouse = self.fetch(tenant_id, warehouse_id.aggregate_id(), "warehouse")?;

        let mut stocked: Vec<&OrderLine> = Vec::with_capacity(order.lines().len());
        for line in order.lines() {
            let product: Product = self.fetch(tenant_id, line.product_id.aggregate_id(), "product")?;
            if product.kind() != ProductKind::Service {
                stocked.push(line);
            }
        }

        let mut needed: BTreeMap<ProductId, Decimal> = BTreeMap::new();
        for line in &stocked {
            *needed.entry(line.product_id).or_default() += line.quantity;
        }
        if let Some((product_id, quantity)) = needed
            .iter()
            .find(|(product_id, quantity)| warehouse.available(**product_id) < **quantity)
        {
            return Err(WorkflowError::InvariantViolation(format!(
                "insufficient stock for product {product_id}: available {}, required {quantity}",
                warehouse.available(*product_id)
            )));
        }

        for (idx, line) in stocked.iter().enumerate() {
            self.execute::<Warehouse>(
                tenant_id,
                warehouse_id.aggregate_id(),
                WarehouseCommand::IssueStock(IssueStock {
                    tenant_id,
                    warehouse_id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    serials: Vec::new(),
                    reference: order.order_no().to_string(),
                    movement_type: MovementType::SalesIssue,
                    occurred_at,
                }),
            )
            .map_err(|err| {
                if idx == 0 {
                    return err;
                }
                error!(%tenant_id, order = %order_id, line = line.line_no, error = %err, "sales delivery stopped part way");
                WorkflowError::after_commit("issue stock", err)
            })?;
        }

        self.execute::<SalesOrder>(tenant_id, order_id.aggregate_id(), deliver)
            .map_err(|err| WorkflowError::after_commit("mark delivered", err))?;
        info!(%tenant_id, order = %order_id, issued = stocked.len(), "sales order delivered");
        Ok(())
    }
}
