use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::entities::{booking, payment, ride};
use crate::error::AppResult;
use crate::services::ride::{self as ride_service, RideCancelActor};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// List all users (admin)
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = user::Entity::find().all(&state.db).await?;

    let responses: Vec<UserResponse> = users
        .into_iter()
        .map(|u| UserResponse {
            id: u.id,
            email: u.email,
            name: u.name,
            phone: u.phone,
            role: u.role,
            email_verified: u.email_verified,
            created_at: u.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(Json(responses))
}

/// List all rides (admin)
pub async fn list_rides(State(state): State<AppState>) -> AppResult<Json<Vec<ride::Model>>> {
    Ok(Json(ride::Entity::find().all(&state.db).await?))
}

/// List all bookings (admin)
pub async fn list_bookings(State(state): State<AppState>) -> AppResult<Json<Vec<booking::Model>>> {
    Ok(Json(booking::Entity::find().all(&state.db).await?))
}

/// List all payments (admin)
pub async fn list_payments(State(state): State<AppState>) -> AppResult<Json<Vec<payment::Model>>> {
    Ok(Json(payment::Entity::find().all(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct ForceCancelRequest {
    pub reason: String,
}

/// Force-cancel a ride (admin): every active booking cascades to
/// cancelled-by-admin with refunds for paid ones.
pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<ForceCancelRequest>,
) -> AppResult<Json<ride::Model>> {
    Ok(Json(
        ride_service::cancel_ride(&state, RideCancelActor::Admin, ride_id, payload.reason).await?,
    ))
}
