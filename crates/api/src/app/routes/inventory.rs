use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use chrono::Utc;

use templeerp_inventory::{
    AdjustStock, CreateWarehouse, IssueStock, MovementType, ReceiveStock, Warehouse,
    WarehouseCommand, WarehouseId,
};
use templeerp_infra::projections::MovementFilter;

use crate::app::dto;
use crate::app::routes::common::{ApiResult, Body, committed, created, guard, items, one, parse_id};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/warehouses", post(create_warehouse).get(list_warehouses))
        .route("/warehouses/:id", get(get_warehouse))
        .route("/warehouses/:id/receipts", post(receive_stock))
        .route("/warehouses/:id/issues", post(issue_stock))
        .route("/warehouses/:id/adjustments", post(adjust_stock))
        .route("/stock", get(stock_levels))
        .route("/movements", get(stock_movements))
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateWarehouseRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "inventory.warehouses.create")?;
    let tenant_id = tenant.tenant_id();
    let warehouse_id = WarehouseId::generate();
    services.workflows().execute::<Warehouse>(
        tenant_id,
        warehouse_id.aggregate_id(),
        WarehouseCommand::CreateWarehouse(CreateWarehouse {
            tenant_id,
            warehouse_id,
            code: body.code,
            name: body.name,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(created(warehouse_id))
}

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let warehouses = services.projections().warehouses.list(tenant.tenant_id());
    Ok(items(warehouses.iter().map(dto::warehouse_to_json).collect()))
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let warehouse_id: WarehouseId = parse_id(&id, "warehouse")?;
    let warehouse: Warehouse = services
        .workflows()
        .fetch(tenant.tenant_id(), warehouse_id.aggregate_id(), "warehouse")?;
    Ok(one(dto::warehouse_to_json(&warehouse)))
}

pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::ReceiveStockRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "inventory.stock.receive")?;
    let tenant_id = tenant.tenant_id();
    let warehouse_id: WarehouseId = parse_id(&id, "warehouse")?;
    let events = services.workflows().receive_stock(
        tenant_id,
        ReceiveStock {
            tenant_id,
            warehouse_id,
            product_id: body.product_id,
            quantity: body.quantity,
            unit_cost: body.unit_cost,
            batch: body.batch,
            serials: body.serials,
            reference: body.reference,
            movement_type: MovementType::Receipt,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(committed(warehouse_id, &events))
}

pub async fn issue_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::IssueStockRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "inventory.stock.issue")?;
    let tenant_id = tenant.tenant_id();
    let warehouse_id: WarehouseId = parse_id(&id, "warehouse")?;
    let events = services.workflows().execute::<Warehouse>(
        tenant_id,
        warehouse_id.aggregate_id(),
        WarehouseCommand::IssueStock(IssueStock {
            tenant_id,
            warehouse_id,
            product_id: body.product_id,
            quantity: body.quantity,
            serials: body.serials,
            reference: body.reference,
            movement_type: MovementType::Issue,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(warehouse_id, &events))
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::AdjustStockRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "inventory.stock.adjust")?;
    let tenant_id = tenant.tenant_id();
    let warehouse_id: WarehouseId = parse_id(&id, "warehouse")?;
    let events = services.workflows().adjust_stock(
        tenant_id,
        AdjustStock {
            tenant_id,
            warehouse_id,
            product_id: body.product_id,
            delta: body.delta,
            reason: body.reason,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(committed(warehouse_id, &events))
}

pub async fn stock_levels(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(q): Query<dto::StockQuery>,
) -> ApiResult {
    let levels = services
        .projections()
        .stock_levels(tenant.tenant_id(), q.warehouse_id, q.product_id);
    Ok(one(serde_json::json!({ "items": levels })))
}

pub async fn stock_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(q): Query<dto::StockQuery>,
) -> ApiResult {
    let filter = MovementFilter {
        warehouse_id: q.warehouse_id,
        product_id: q.product_id,
        reference: q.reference,
    };
    let movements = services.projections().movements.list(tenant.tenant_id(), &filter);
    Ok(one(serde_json::json!({ "items": movements })))
}
