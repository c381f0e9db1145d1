use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::{get, post},
};
use chrono::Utc;

use templeerp_core::TenantId;
use templeerp_purchasing::{
    AddLine, Approve, CancelPurchaseOrder, CreatePurchaseOrder, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderId, ReceiveGoods,
};

use crate::app::dto;
use crate::app::routes::common::{ApiResult, Body, committed, created, guard, items, one, parse_id};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/lines", post(add_line))
        .route("/orders/:id/approve", post(approve_order))
        .route("/orders/:id/receipts", post(receive_goods))
        .route("/orders/:id/cancel", post(cancel_order))
}

fn line_command(
    tenant_id: TenantId,
    order_id: PurchaseOrderId,
    line: dto::PurchaseLineRequest,
) -> PurchaseOrderCommand {
    PurchaseOrderCommand::AddLine(AddLine {
        tenant_id,
        order_id,
        product_id: line.product_id,
        quantity: line.quantity,
        unit_cost: line.unit_cost,
        occurred_at: Utc::now(),
    })
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreatePurchaseOrderRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "purchasing.orders.create")?;
    let tenant_id = tenant.tenant_id();
    let order_id = PurchaseOrderId::generate();
    let workflows = services.workflows();

    workflows.execute::<PurchaseOrder>(
        tenant_id,
        order_id.aggregate_id(),
        PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
            tenant_id,
            order_id,
            order_no: body.order_no,
            supplier_name: body.supplier_name,
            warehouse_id: body.warehouse_id,
            occurred_at: Utc::now(),
        }),
    )?;
    for line in &body.lines {
        workflows.stockable_product(tenant_id, line.product_id)?;
    }
    for line in body.lines {
        workflows.execute::<PurchaseOrder>(
            tenant_id,
            order_id.aggregate_id(),
            line_command(tenant_id, order_id, line),
        )?;
    }
    Ok(created(order_id))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let orders = services.projections().purchase_orders.list(tenant.tenant_id());
    Ok(items(orders.iter().map(dto::purchase_order_to_json).collect()))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;
    let order: PurchaseOrder = services
        .workflows()
        .fetch(tenant.tenant_id(), order_id.aggregate_id(), "purchase order")?;
    Ok(one(dto::purchase_order_to_json(&order)))
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::PurchaseLineRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "purchasing.orders.update")?;
    let tenant_id = tenant.tenant_id();
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;
    services.workflows().stockable_product(tenant_id, body.product_id)?;
    let events = services.workflows().execute::<PurchaseOrder>(
        tenant_id,
        order_id.aggregate_id(),
        line_command(tenant_id, order_id, body),
    )?;
    Ok(committed(order_id, &events))
}

pub async fn approve_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "purchasing.orders.approve")?;
    let tenant_id = tenant.tenant_id();
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;
    let events = services.workflows().execute::<PurchaseOrder>(
        tenant_id,
        order_id.aggregate_id(),
        PurchaseOrderCommand::Approve(Approve {
            tenant_id,
            order_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(order_id, &events))
}

/// Records a GRN against the order and receives the goods into its warehouse.
pub async fn receive_goods(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::ReceiveGoodsRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "purchasing.orders.receive")?;
    let tenant_id = tenant.tenant_id();
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;
    let events = services.workflows().receive_goods(
        tenant_id,
        ReceiveGoods {
            tenant_id,
            order_id,
            grn_no: body.grn_no,
            lines: body.lines,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(committed(order_id, &events))
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::ReasonRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "purchasing.orders.cancel")?;
    let tenant_id = tenant.tenant_id();
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;
    let events = services.workflows().execute::<PurchaseOrder>(
        tenant_id,
        order_id.aggregate_id(),
        PurchaseOrderCommand::CancelOrder(CancelPurchaseOrder {
            tenant_id,
            order_id,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(order_id, &events))
}
