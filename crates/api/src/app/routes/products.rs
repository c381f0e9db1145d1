use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::{get, post},
};
use chrono::Utc;

use templeerp_products::{
    ActivateProduct, ArchiveProduct, CreateProduct, Product, ProductCommand, ProductId,
};

use crate::app::dto;
use crate::app::routes::common::{ApiResult, Body, committed, created, guard, items, one, parse_id};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/activate", post(activate_product))
        .route("/:id/archive", post(archive_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateProductRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "products.create")?;
    let tenant_id = tenant.tenant_id();

    let sku_taken = services
        .projections()
        .products
        .list(tenant_id)
        .iter()
        .any(|p| p.sku().eq_ignore_ascii_case(&body.sku));
    if sku_taken {
        return Err(crate::app::errors::ApiError::new(
            axum::http::StatusCode::CONFLICT,
            "conflict",
            format!("sku {} already exists", body.sku),
        ));
    }

    let product_id = ProductId::generate();
    services.workflows().execute::<Product>(
        tenant_id,
        product_id.aggregate_id(),
        ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id,
            sku: body.sku,
            name: body.name,
            kind: body.kind,
            uom: body.uom,
            tracking: body.tracking,
            standard_cost: body.standard_cost,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(created(product_id))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let mut products = services.projections().products.list(tenant.tenant_id());
    products.sort_by(|a, b| a.sku().cmp(b.sku()));
    Ok(items(products.iter().map(dto::product_to_json).collect()))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product: Product = services
        .workflows()
        .fetch(tenant.tenant_id(), product_id.aggregate_id(), "product")?;
    Ok(one(dto::product_to_json(&product)))
}

pub async fn activate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "products.update")?;
    let tenant_id = tenant.tenant_id();
    let product_id: ProductId = parse_id(&id, "product")?;
    let events = services.workflows().execute::<Product>(
        tenant_id,
        product_id.aggregate_id(),
        ProductCommand::ActivateProduct(ActivateProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(product_id, &events))
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "products.update")?;
    let tenant_id = tenant.tenant_id();
    let product_id: ProductId = parse_id(&id, "product")?;
    let events = services.workflows().execute::<Product>(
        tenant_id,
        product_id.aggregate_id(),
        ProductCommand::ArchiveProduct(ArchiveProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(product_id, &events))
}
