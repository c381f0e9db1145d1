use rust_decimal::Decimal;
use serde::Serialize;

use templeerp_core::TenantId;
use templeerp_inventory::{BatchLot, Warehouse, WarehouseId};
use templeerp_products::{Product, ProductId};

use crate::projections::AggregateProjection;

/// Queryable stock position of one product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub warehouse_id: WarehouseId,
    pub warehouse_code: String,
    pub product_id: ProductId,
    pub sku: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
    pub average_cost: i64,
    pub batches: Vec<BatchLot>,
    pub serials: Vec<String>,
}

/// Stock levels of a tenant, optionally narrowed to one warehouse or product.
///
/// Ordered by warehouse code, then SKU.
pub fn stock_levels(
    warehouses: &AggregateProjection<Warehouse>,
    products: &AggregateProjection<Product>,
    tenant_id: TenantId,
    warehouse_id: Option<WarehouseId>,
    product_id: Option<ProductId>,
) -> Vec<StockLevel> {
    let mut scope = warehouses.list(tenant_id);
    if let Some(id) = warehouse_id {
        scope.retain(|w| w.id_typed() == id);
    }

    let mut levels: Vec<StockLevel> = scope
        .iter()
        .flat_map(|warehouse| {
            warehouse
                .stock_rows()
                .filter(|row| product_id.is_none_or(|p| row.product_id == p))
                .map(|row| {
                    let product = products.get(tenant_id, row.product_id.aggregate_id());
                    StockLevel {
                        warehouse_id: warehouse.id_typed(),
                        warehouse_code: warehouse.code().to_string(),
                        product_id: row.product_id,
                        sku: product.as_ref().map(|p| p.sku().to_string()),
                        product_name: product.as_ref().map(|p| p.name().to_string()),
                        quantity: row.quantity,
                        reserved: row.reserved,
                        available: row.available(),
                        average_cost: row.average_cost,
                        batches: row.batches.clone(),
                        serials: row.serials.iter().cloned().collect(),
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    levels.sort_by(|a, b| (&a.warehouse_code, &a.sku).cmp(&(&b.warehouse_code, &b.sku)));
    levels
}
