//! Catalogue checks for anything that puts a product on a shelf or an order.

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::info;

use templeerp_core::TenantId;
use templeerp_events::{EventBus, EventEnvelope};
use templeerp_inventory::{AdjustStock, ReceiveStock, Warehouse, WarehouseCommand};
use templeerp_products::{Product, ProductId, ProductStatus};

use crate::event_store::{EventStore, StoredEvent};
use crate::workflows::{WorkflowError, Workflows};

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// The product, if it exists, is Active and is not a service.
    pub fn stockable_product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Product, WorkflowError> {
        let product: Product = self.fetch(tenant_id, product_id.aggregate_id(), "product")?;
        if !product.can_be_stocked() {
            return Err(WorkflowError::InvariantViolation(format!(
                "product {} ({:?}, {:?}) cannot be stocked",
                product.sku(),
                product.kind(),
                product.status()
            )));
        }
        Ok(product)
    }

    /// The product, if it exists and is Active. Services are sellable.
    pub fn sellable_product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Product, WorkflowError> {
        let product: Product = self.fetch(tenant_id, product_id.aggregate_id(), "product")?;
        if product.status() != ProductStatus::Active {
            return Err(WorkflowError::InvariantViolation(format!(
                "product {} is not active",
                product.sku()
            )));
        }
        Ok(product)
    }

    /// Direct receipt into a warehouse, outside any purchase order.
    pub fn receive_stock(&self, tenant_id: TenantId, cmd: ReceiveStock) -> Result<Vec<StoredEvent>, WorkflowError> {
        self.stockable_product(tenant_id, cmd.product_id)?;
        let warehouse_id = cmd.warehouse_id;
        let reference = cmd.reference.clone();
        let committed = self.execute::<Warehouse>(
            tenant_id,
            warehouse_id.aggregate_id(),
            WarehouseCommand::ReceiveStock(cmd),
        )?;
        info!(%tenant_id, warehouse = %warehouse_id, %reference, "stock received");
        Ok(committed)
    }

    /// Stock count correction. Only a positive delta needs a stockable product;
    /// existing stock of an archived product can still be written down.
    pub fn adjust_stock(&self, tenant_id: TenantId, cmd: AdjustStock) -> Result<Vec<StoredEvent>, WorkflowError> {
        if cmd.delta > Decimal::ZERO {
            self.stockable_product(tenant_id, cmd.product_id)?;
        }
        let warehouse_id = cmd.warehouse_id;
        self.execute::<Warehouse>(
            tenant_id,
            warehouse_id.aggregate_id(),
            WarehouseCommand::AdjustStock(cmd),
        )
    }
}
