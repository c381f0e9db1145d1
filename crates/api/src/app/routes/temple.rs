use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use templeerp_temple::{
    Booking, BookingCommand, BookingId, CancelBooking, CancelRegistration, ChangeBookingStatus,
    CreateBooking, CreateTower, PagodaCommand, PagodaTower, PagodaTowerId, RecordPayment,
    RegisterLight, RegistrationId, RenewRegistration,
};

use crate::app::dto;
use crate::app::routes::common::{ApiResult, Body, committed, created, guard, items, one, parse_id};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/pagoda/towers", post(create_tower).get(list_towers))
        .route("/pagoda/towers/:id", get(get_tower))
        .route("/pagoda/towers/:id/availability", get(tower_availability))
        .route("/pagoda/towers/:id/registrations", post(register_light))
        .route(
            "/pagoda/towers/:id/registrations/:registration_id/renew",
            post(renew_registration),
        )
        .route(
            "/pagoda/towers/:id/registrations/:registration_id/cancel",
            post(cancel_registration),
        )
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/confirm", post(confirm_booking))
        .route("/bookings/:id/complete", post(complete_booking))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/bookings/:id/payments", post(record_payment))
}

// --- Pagoda towers ---

pub async fn create_tower(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateTowerRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "temple.towers.create")?;
    let tenant_id = tenant.tenant_id();
    let tower_id = PagodaTowerId::generate();
    services.workflows().execute::<PagodaTower>(
        tenant_id,
        tower_id.aggregate_id(),
        PagodaCommand::CreateTower(CreateTower {
            tenant_id,
            tower_id,
            code: body.code,
            name: body.name,
            total_lights: body.total_lights,
            annual_fee: body.annual_fee,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(created(tower_id))
}

pub async fn list_towers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::AvailabilityQuery>,
) -> ApiResult {
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let mut towers = services.projections().pagoda_towers.list(tenant.tenant_id());
    towers.sort_by(|a, b| a.code().cmp(b.code()));
    Ok(items(towers.iter().map(|t| dto::tower_to_json(t, on)).collect()))
}

pub async fn get_tower(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::AvailabilityQuery>,
) -> ApiResult {
    let tower_id: PagodaTowerId = parse_id(&id, "pagoda tower")?;
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let tower: PagodaTower = services
        .workflows()
        .fetch(tenant.tenant_id(), tower_id.aggregate_id(), "pagoda tower")?;
    Ok(one(dto::tower_to_json(&tower, on)))
}

pub async fn tower_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::AvailabilityQuery>,
) -> ApiResult {
    let tower_id: PagodaTowerId = parse_id(&id, "pagoda tower")?;
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let tower: PagodaTower = services
        .workflows()
        .fetch(tenant.tenant_id(), tower_id.aggregate_id(), "pagoda tower")?;
    Ok(one(json!({
        "tower_id": tower_id.to_string(),
        "on": on,
        "total_lights": tower.total_lights(),
        "occupied_lights": tower.occupied_lights(on),
        "available_lights": tower.available_lights(on),
    })))
}

pub async fn register_light(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::RegisterLightRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "temple.registrations.create")?;
    let tenant_id = tenant.tenant_id();
    let tower_id: PagodaTowerId = parse_id(&id, "pagoda tower")?;
    let registration_id = RegistrationId::generate();
    services.workflows().execute::<PagodaTower>(
        tenant_id,
        tower_id.aggregate_id(),
        PagodaCommand::RegisterLight(RegisterLight {
            tenant_id,
            tower_id,
            registration_id,
            light_number: body.light_number,
            devotee_name: body.devotee_name,
            devotee_contact: body.devotee_contact,
            dedicated_to: body.dedicated_to,
            start_date: body.start_date,
            end_date: body.end_date,
            amount_paid: body.amount_paid,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(created(registration_id))
}

pub async fn renew_registration(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, registration_id)): Path<(String, String)>,
    Body(body): Body<dto::RenewRegistrationRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "temple.registrations.renew")?;
    let tenant_id = tenant.tenant_id();
    let tower_id: PagodaTowerId = parse_id(&id, "pagoda tower")?;
    let registration_id: RegistrationId = parse_id(&registration_id, "registration")?;
    let events = services.workflows().execute::<PagodaTower>(
        tenant_id,
        tower_id.aggregate_id(),
        PagodaCommand::RenewRegistration(RenewRegistration {
            tenant_id,
            tower_id,
            registration_id,
            months: body.months,
            amount: body.amount,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(registration_id, &events))
}

pub async fn cancel_registration(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, registration_id)): Path<(String, String)>,
    Body(body): Body<dto::ReasonRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "temple.registrations.cancel")?;
    let tenant_id = tenant.tenant_id();
    let tower_id: PagodaTowerId = parse_id(&id, "pagoda tower")?;
    let registration_id: RegistrationId = parse_id(&registration_id, "registration")?;
    let events = services.workflows().execute::<PagodaTower>(
        tenant_id,
        tower_id.aggregate_id(),
        PagodaCommand::CancelRegistration(CancelRegistration {
            tenant_id,
            tower_id,
            registration_id,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(registration_id, &events))
}

// --- Bookings ---

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateBookingRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "temple.bookings.create")?;
    let tenant_id = tenant.tenant_id();
    let booking_id = BookingId::generate();
    services.workflows().execute::<Booking>(
        tenant_id,
        booking_id.aggregate_id(),
        BookingCommand::CreateBooking(CreateBooking {
            tenant_id,
            booking_id,
            booking_no: body.booking_no,
            service_name: body.service_name,
            devotee_name: body.devotee_name,
            devotee_contact: body.devotee_contact,
            booking_date: body.booking_date,
            slot: body.slot,
            amount: body.amount,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(created(booking_id))
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let mut bookings = services.projections().bookings.list(tenant.tenant_id());
    bookings.sort_by(|a, b| a.booking_date().cmp(&b.booking_date()));
    Ok(items(bookings.iter().map(dto::booking_to_json).collect()))
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let booking: Booking = services
        .workflows()
        .fetch(tenant.tenant_id(), booking_id.aggregate_id(), "booking")?;
    Ok(one(dto::booking_to_json(&booking)))
}

async fn change_status(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    complete: bool,
) -> ApiResult {
    guard(tenant, principal, "temple.bookings.update")?;
    let tenant_id = tenant.tenant_id();
    let booking_id: BookingId = parse_id(id, "booking")?;
    let payload = ChangeBookingStatus {
        tenant_id,
        booking_id,
        occurred_at: Utc::now(),
    };
    let command = if complete {
        BookingCommand::CompleteBooking(payload)
    } else {
        BookingCommand::ConfirmBooking(payload)
    };
    let events = services
        .workflows()
        .execute::<Booking>(tenant_id, booking_id.aggregate_id(), command)?;
    Ok(committed(booking_id, &events))
}

pub async fn confirm_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_status(&services, &tenant, &principal, &id, false).await
}

pub async fn complete_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_status(&services, &tenant, &principal, &id, true).await
}

pub async fn cancel_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::ReasonRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "temple.bookings.cancel")?;
    let tenant_id = tenant.tenant_id();
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let events = services.workflows().execute::<Booking>(
        tenant_id,
        booking_id.aggregate_id(),
        BookingCommand::CancelBooking(CancelBooking {
            tenant_id,
            booking_id,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(booking_id, &events))
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::RecordPaymentRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "temple.bookings.payments")?;
    let tenant_id = tenant.tenant_id();
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let events = services.workflows().execute::<Booking>(
        tenant_id,
        booking_id.aggregate_id(),
        BookingCommand::RecordPayment(RecordPayment {
            tenant_id,
            booking_id,
            amount: body.amount,
            payment_mode: body.payment_mode,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(booking_id, &events))
}
