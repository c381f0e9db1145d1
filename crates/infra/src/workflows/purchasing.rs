use serde_json::Value as JsonValue;
use tracing::{error, info};

use templeerp_core::TenantId;
use templeerp_events::{EventBus, EventEnvelope};
use templeerp_inventory::{MovementType, ReceiveStock, Warehouse, WarehouseCommand};
use templeerp_purchasing::{PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent, ReceiveGoods};

use crate::event_store::{EventStore, StoredEvent};
use crate::workflows::{WorkflowError, Workflows};

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Record a GRN on the order, then receive each line into its warehouse.
    ///
    /// Stock moves as `PurchaseReceipt` with the GRN number as reference.
    /// Every line's product must be stockable, and every stock receipt is
    /// dry-run, before the GRN is committed.
    pub fn receive_goods(&self, tenant_id: TenantId, cmd: ReceiveGoods) -> Result<Vec<StoredEvent>, WorkflowError> {
        let order_id = cmd.order_id;
        let grn_no = cmd.grn_no.clone();
        let occurred_at = cmd.occurred_at;
        let receive = PurchaseOrderCommand::ReceiveGoods(cmd);

        let decided = self
            .dispatcher
            .check::<PurchaseOrder>(tenant_id, order_id.aggregate_id(), &receive)?;
        let Some(PurchaseOrderEvent::GoodsReceived(receipt)) = decided.into_iter().next() else {
            return Err(WorkflowError::InvariantViolation("goods receipt recorded nothing".into()));
        };

        let warehouse_id = receipt.warehouse_id;
        self.fetch::<Warehouse>(tenant_id, warehouse_id.aggregate_id(), "warehouse")?;
        for line in &receipt.lines {
            self.stockable_product(tenant_id, line.product_id)?;
        }

        let stock_commands: Vec<WarehouseCommand> = receipt
            .lines
            .iter()
            .map(|line| {
                WarehouseCommand::ReceiveStock(ReceiveStock {
                    tenant_id,
                    warehouse_id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_cost: line.unit_cost,
                    batch: line.batch.clone(),
                    serials: line.serials.clone(),
                    reference: grn_no.clone(),
                    movement_type: MovementType::PurchaseReceipt,
                    occurred_at,
                })
            })
            .collect();
        for stock in &stock_commands {
            self.dispatcher
                .check::<Warehouse>(tenant_id, warehouse_id.aggregate_id(), stock)?;
        }

        let mut committed = self.execute::<PurchaseOrder>(tenant_id, order_id.aggregate_id(), receive)?;
        info!(%tenant_id, order = %order_id, grn = %grn_no, lines = stock_commands.len(), "goods received");

        for stock in stock_commands {
            let stored = self
                .execute::<Warehouse>(tenant_id, warehouse_id.aggregate_id(), stock)
                .map_err(|err| {
                    error!(%tenant_id, grn = %grn_no, error = %err, "GRN recorded but stock receipt failed");
                    WorkflowError::after_commit("receive stock", err)
                })?;
            committed.extend(stored);
        }

        Ok(committed)
    }
}
