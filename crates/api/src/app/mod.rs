//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store, bus, projections and workflows
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: the JSON error envelope

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the router over in-memory stores (tests and local runs).
pub fn build_app(jwt_secret: String) -> anyhow::Result<Router> {
    let services = AppServices::in_memory()?;
    Ok(assemble(jwt_secret, services))
}

/// Build the router described by `config`, using Postgres when a database URL is set.
pub async fn build_app_from_config(config: &AppConfig) -> anyhow::Result<Router> {
    let services = match config.database_url.as_deref() {
        Some(url) => AppServices::persistent(url).await?,
        None => AppServices::in_memory()?,
    };
    Ok(assemble(config.jwt_secret.clone(), services))
}

fn assemble(jwt_secret: String, services: AppServices) -> Router {
    let jwt = Arc::new(templeerp_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require auth + tenant context.
    let protected = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
