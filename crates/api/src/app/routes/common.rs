use std::fmt::Display;
use std::str::FromStr;

use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::json;

use templeerp_infra::StoredEvent;

use crate::app::errors::ApiError;
use crate::context::{PrincipalContext, TenantContext};

pub type ApiResult = Result<Response, ApiError>;

/// JSON body whose rejections use the API error envelope.
pub struct Body<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(Body(value))
    }
}

pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {what} id")))
}

pub fn guard(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), ApiError> {
    crate::authz::authorize_command(tenant, principal, permission).map_err(ApiError::from)
}

pub fn created(id: impl Display) -> Response {
    (StatusCode::CREATED, Json(json!({ "id": id.to_string() }))).into_response()
}

/// Result of a single-stream command.
pub fn committed(id: impl Display, events: &[StoredEvent]) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "id": id.to_string(),
            "events_committed": events.len(),
            "stream_version": events.last().map(|e| e.sequence_number).unwrap_or(0),
        })),
    )
        .into_response()
}

pub fn done(id: impl Display) -> Response {
    (StatusCode::OK, Json(json!({ "id": id.to_string() }))).into_response()
}

pub fn items(values: Vec<serde_json::Value>) -> Response {
    (StatusCode::OK, Json(json!({ "items": values }))).into_response()
}

pub fn one(value: impl serde::Serialize) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}
