use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::ride;
use crate::error::AppResult;
use crate::services::booking::{self as booking_service, CancelActor, RoutePreset};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub ride_id: Uuid,
    pub seats: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub source: String,
    pub destination: String,
    pub travel_date: Option<NaiveDate>,
    pub travel_time: Option<NaiveTime>,
    pub seats: i32,
    pub status: BookingStatus,
    /// Present only for the booking's passenger, once the driver accepts.
    pub onboarding_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingResponse {
    fn build(b: booking::Model, rides: &[ride::Model]) -> Self {
        let ride = rides.iter().find(|r| r.id == b.ride_id);
        Self {
            id: b.id,
            ride_id: b.ride_id,
            source: ride.map(|r| r.source.clone()).unwrap_or_default(),
            destination: ride.map(|r| r.destination.clone()).unwrap_or_default(),
            travel_date: ride.map(|r| r.travel_date),
            travel_time: ride.map(|r| r.travel_time),
            seats: b.seats,
            status: b.status,
            onboarding_code: b.onboarding_code,
            created_at: b.created_at.with_timezone(&Utc),
        }
    }
}

/// Request seats on a ride
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    let created =
        booking_service::request_booking(&state, claims.sub, payload.ride_id, payload.seats)
            .await?;

    let rides = ride::Entity::find()
        .filter(ride::Column::Id.eq(created.ride_id))
        .all(&state.db)
        .await?;

    Ok(Json(BookingResponse::build(created, &rides)))
}

/// List the passenger's bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let bookings = booking_service::my_bookings(&state, claims.sub).await?;

    let ride_ids: Vec<Uuid> = bookings.iter().map(|b| b.ride_id).collect();
    let rides = if ride_ids.is_empty() {
        Vec::new()
    } else {
        ride::Entity::find()
            .filter(ride::Column::Id.is_in(ride_ids))
            .all(&state.db)
            .await?
    };

    Ok(Json(
        bookings
            .into_iter()
            .map(|b| BookingResponse::build(b, &rides))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

/// Cancel the passenger's own booking
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> AppResult<Json<serde_json::Value>> {
    booking_service::cancel_booking(
        &state,
        CancelActor::Passenger(claims.sub),
        booking_id,
        payload.reason,
    )
    .await?;

    Ok(Json(serde_json::json!({ "message": "Booking cancelled" })))
}

/// The passenger's most frequent routes, for quick rebooking
pub async fn recent_routes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<RoutePreset>>> {
    Ok(Json(booking_service::recent_routes(&state, claims.sub).await?))
}

/// The passenger's live booking for today, if any
pub async fn active_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Option<BookingResponse>>> {
    let active = booking_service::active_booking_today(&state, claims.sub).await?;
    Ok(Json(active.map(|(b, ride)| BookingResponse::build(b, &[ride]))))
}

// ============ Driver-side booking decisions ============

pub async fn accept_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    booking_service::accept_booking(&state, claims.sub, booking_id).await?;
    Ok(Json(serde_json::json!({ "message": "Booking accepted" })))
}

pub async fn reject_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    booking_service::reject_booking(&state, claims.sub, booking_id).await?;
    Ok(Json(serde_json::json!({ "message": "Booking rejected" })))
}

#[derive(Debug, Deserialize)]
pub struct OnboardRequest {
    pub code: String,
}

/// Driver verifies the passenger's one-time code at pickup
pub async fn verify_onboarding(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<OnboardRequest>,
) -> AppResult<Json<serde_json::Value>> {
    booking_service::verify_onboarding(&state, claims.sub, booking_id, &payload.code).await?;
    Ok(Json(serde_json::json!({ "message": "Passenger onboarded" })))
}
