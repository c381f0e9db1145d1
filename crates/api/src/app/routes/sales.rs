use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::{get, post},
};
use chrono::Utc;

use templeerp_core::TenantId;
use templeerp_sales::{
    AddLine, CancelSalesOrder, ConfirmOrder, CreateSalesOrder, SalesOrder, SalesOrderCommand,
    SalesOrderId,
};

use crate::app::dto;
use crate::app::routes::common::{
    ApiResult, Body, committed, created, done, guard, items, one, parse_id,
};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/lines", post(add_line))
        .route("/orders/:id/confirm", post(confirm_order))
        .route("/orders/:id/deliver", post(deliver_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

fn line_command(tenant_id: TenantId, order_id: SalesOrderId, line: dto::SalesLineRequest) -> SalesOrderCommand {
    SalesOrderCommand::AddLine(AddLine {
        tenant_id,
        order_id,
        product_id: line.product_id,
        quantity: line.quantity,
        unit_price: line.unit_price,
        discount_percent: line.discount_percent,
        tax_percent: line.tax_percent,
        occurred_at: Utc::now(),
    })
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateSalesOrderRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "sales.orders.create")?;
    let tenant_id = tenant.tenant_id();
    let order_id = SalesOrderId::generate();
    let workflows = services.workflows();

    workflows.execute::<SalesOrder>(
        tenant_id,
        order_id.aggregate_id(),
        SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
            tenant_id,
            order_id,
            order_no: body.order_no,
            customer_name: body.customer_name,
            warehouse_id: body.warehouse_id,
            occurred_at: Utc::now(),
        }),
    )?;
    for line in &body.lines {
        workflows.sellable_product(tenant_id, line.product_id)?;
    }
    for line in body.lines {
        workflows.execute::<SalesOrder>(
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
    let orders = services.projections().sales_orders.list(tenant.tenant_id());
    Ok(items(orders.iter().map(dto::sales_order_to_json).collect()))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let order_id: SalesOrderId = parse_id(&id, "sales order")?;
    let order: SalesOrder = services
        .workflows()
        .fetch(tenant.tenant_id(), order_id.aggregate_id(), "sales order")?;
    Ok(one(dto::sales_order_to_json(&order)))
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::SalesLineRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "sales.orders.update")?;
    let tenant_id = tenant.tenant_id();
    let order_id: SalesOrderId = parse_id(&id, "sales order")?;
    services.workflows().sellable_product(tenant_id, body.product_id)?;
    let events = services.workflows().execute::<SalesOrder>(
        tenant_id,
        order_id.aggregate_id(),
        line_command(tenant_id, order_id, body),
    )?;
    Ok(committed(order_id, &events))
}

pub async fn confirm_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "sales.orders.confirm")?;
    let tenant_id = tenant.tenant_id();
    let order_id: SalesOrderId = parse_id(&id, "sales order")?;
    let events = services.workflows().execute::<SalesOrder>(
        tenant_id,
        order_id.aggregate_id(),
        SalesOrderCommand::ConfirmOrder(ConfirmOrder {
            tenant_id,
            order_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(order_id, &events))
}

/// Issues stock for every line, then marks the order delivered.
pub async fn deliver_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "sales.orders.deliver")?;
    let order_id: SalesOrderId = parse_id(&id, "sales order")?;
    services
        .workflows()
        .deliver_sales_order(tenant.tenant_id(), order_id, Utc::now())?;
    Ok(done(order_id))
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::ReasonRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "sales.orders.cancel")?;
    let tenant_id = tenant.tenant_id();
    let order_id: SalesOrderId = parse_id(&id, "sales order")?;
    let events = services.workflows().execute::<SalesOrder>(
        tenant_id,
        order_id.aggregate_id(),
        SalesOrderCommand::CancelOrder(CancelSalesOrder {
            tenant_id,
            order_id,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(order_id, &events))
}
