use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::{delete, get, post},
};
use chrono::Utc;

use templeerp_infra::workflows::NewManufacturingOrder;
use templeerp_manufacturing::{
    AddComponent, BomCommand, BomComponent, BomId, BomMaster, ChangeBomStatus, CreateBom,
    ManufacturingOrder, ManufacturingOrderId, RemoveComponent,
};
use templeerp_products::ProductId;

use crate::app::dto;
use crate::app::routes::common::{
    ApiResult, Body, committed, created, done, guard, items, one, parse_id,
};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/boms", post(create_bom).get(list_boms))
        .route("/boms/:id", get(get_bom))
        .route("/boms/:id/components", post(add_component))
        .route("/boms/:id/components/:product_id", delete(remove_component))
        .route("/boms/:id/activate", post(activate_bom))
        .route("/boms/:id/deactivate", post(deactivate_bom))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/validate", post(validate_order))
        .route("/orders/:id/start", post(start_order))
        .route("/orders/:id/complete", post(complete_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

// -------------------------
// Bills of materials
// -------------------------

/// Creates the BOM and adds each submitted component to it.
pub async fn create_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateBomRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.boms.create")?;
    let tenant_id = tenant.tenant_id();
    let bom_id = BomId::generate();
    let workflows = services.workflows();

    for component in &body.components {
        if component.product_id == body.product_id {
            return Err(crate::app::errors::ApiError::bad_request(
                "a BOM cannot consume its own product",
            ));
        }
        workflows.stockable_product(tenant_id, component.product_id)?;
    }
    workflows.stockable_product(tenant_id, body.product_id)?;

    workflows.execute::<BomMaster>(
        tenant_id,
        bom_id.aggregate_id(),
        BomCommand::CreateBom(CreateBom {
            tenant_id,
            bom_id,
            code: body.code,
            name: body.name,
            product_id: body.product_id,
            output_quantity: body.output_quantity,
            occurred_at: Utc::now(),
        }),
    )?;
    for component in body.components {
        workflows.execute::<BomMaster>(
            tenant_id,
            bom_id.aggregate_id(),
            add_component_command(tenant_id, bom_id, component),
        )?;
    }
    Ok(created(bom_id))
}

fn add_component_command(
    tenant_id: templeerp_core::TenantId,
    bom_id: BomId,
    component: BomComponent,
) -> BomCommand {
    BomCommand::AddComponent(AddComponent {
        tenant_id,
        bom_id,
        component,
        occurred_at: Utc::now(),
    })
}

pub async fn list_boms(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let boms = services.projections().boms.list(tenant.tenant_id());
    Ok(items(boms.iter().map(dto::bom_to_json).collect()))
}

pub async fn get_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let bom_id: BomId = parse_id(&id, "BOM")?;
    let bom: BomMaster = services
        .workflows()
        .fetch(tenant.tenant_id(), bom_id.aggregate_id(), "BOM")?;
    Ok(one(dto::bom_to_json(&bom)))
}

pub async fn add_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(component): Body<BomComponent>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.boms.update")?;
    let tenant_id = tenant.tenant_id();
    let bom_id: BomId = parse_id(&id, "BOM")?;
    services.workflows().stockable_product(tenant_id, component.product_id)?;
    let events = services.workflows().execute::<BomMaster>(
        tenant_id,
        bom_id.aggregate_id(),
        add_component_command(tenant_id, bom_id, component),
    )?;
    Ok(committed(bom_id, &events))
}

pub async fn remove_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, product_id)): Path<(String, String)>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.boms.update")?;
    let tenant_id = tenant.tenant_id();
    let bom_id: BomId = parse_id(&id, "BOM")?;
    let product_id: ProductId = parse_id(&product_id, "product")?;
    let events = services.workflows().execute::<BomMaster>(
        tenant_id,
        bom_id.aggregate_id(),
        BomCommand::RemoveComponent(RemoveComponent {
            tenant_id,
            bom_id,
            product_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(bom_id, &events))
}

async fn change_bom_status(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    make: fn(ChangeBomStatus) -> BomCommand,
) -> ApiResult {
    guard(tenant, principal, "manufacturing.boms.update")?;
    let tenant_id = tenant.tenant_id();
    let bom_id: BomId = parse_id(id, "BOM")?;
    let events = services.workflows().execute::<BomMaster>(
        tenant_id,
        bom_id.aggregate_id(),
        make(ChangeBomStatus {
            tenant_id,
            bom_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(bom_id, &events))
}

pub async fn activate_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_bom_status(&services, &tenant, &principal, &id, BomCommand::ActivateBom).await
}

pub async fn deactivate_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_bom_status(&services, &tenant, &principal, &id, BomCommand::DeactivateBom).await
}

// -------------------------
// Manufacturing orders
// -------------------------

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateManufacturingOrderRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.orders.create")?;
    let id = services.workflows().create_manufacturing_order(
        tenant.tenant_id(),
        NewManufacturingOrder {
            order_id: ManufacturingOrderId::generate(),
            order_no: body.order_no,
            bom_id: body.bom_id,
            quantity: body.quantity,
            warehouse_id: body.warehouse_id,
            planned_date: body.planned_date,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(created(id))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let orders = services.projections().manufacturing_orders.list(tenant.tenant_id());
    Ok(items(orders.iter().map(dto::manufacturing_order_to_json).collect()))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let order_id: ManufacturingOrderId = parse_id(&id, "manufacturing order")?;
    let order: ManufacturingOrder = services.workflows().fetch(
        tenant.tenant_id(),
        order_id.aggregate_id(),
        "manufacturing order",
    )?;
    Ok(one(dto::manufacturing_order_to_json(&order)))
}

pub async fn validate_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.orders.validate")?;
    let order_id: ManufacturingOrderId = parse_id(&id, "manufacturing order")?;
    services
        .workflows()
        .validate_manufacturing_order(tenant.tenant_id(), order_id, Utc::now())?;
    Ok(done(order_id))
}

pub async fn start_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.orders.start")?;
    let order_id: ManufacturingOrderId = parse_id(&id, "manufacturing order")?;
    services
        .workflows()
        .start_manufacturing_order(tenant.tenant_id(), order_id, Utc::now())?;
    Ok(done(order_id))
}

pub async fn complete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::CompleteManufacturingOrderRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.orders.complete")?;
    let order_id: ManufacturingOrderId = parse_id(&id, "manufacturing order")?;
    services.workflows().complete_manufacturing_order(
        tenant.tenant_id(),
        order_id,
        body.produced_quantity,
        body.batch_no,
        Utc::now(),
    )?;
    Ok(done(order_id))
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::ReasonRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "manufacturing.orders.cancel")?;
    let order_id: ManufacturingOrderId = parse_id(&id, "manufacturing order")?;
    services.workflows().cancel_manufacturing_order(
        tenant.tenant_id(),
        order_id,
        body.reason,
        Utc::now(),
    )?;
    Ok(done(order_id))
}
