use axum::{Router, routing::get};

pub mod accounting;
pub mod common;
pub mod inventory;
pub mod manufacturing;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod system;
pub mod temple;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/accounting", accounting::router())
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/manufacturing", manufacturing::router())
        .nest("/sales", sales::router())
        .nest("/purchases", purchases::router())
        .nest("/temple", temple::router())
}
