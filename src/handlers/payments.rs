use axum::{
    extract::{Path, State},
    Extension, Json,
};
use sea_orm::EntityTrait;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::payment;
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::services::payment::{self as payment_service, OrderHandle};
use crate::utils::jwt::Claims;
use crate::AppState;

/// Create a provider order for an accepted booking
pub async fn initiate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<OrderHandle>> {
    let handle = payment_service::initiate_payment(&state, claims.sub, booking_id).await?;
    Ok(Json(handle))
}

#[derive(Debug, Deserialize)]
pub struct CompletePaymentRequest {
    pub order_ref: String,
    pub payment_ref: String,
    pub signature: String,
    pub provider: String,
}

/// Verify the provider callback and confirm the booking
pub async fn complete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CompletePaymentRequest>,
) -> AppResult<Json<payment::Model>> {
    let paid = payment_service::complete_payment(
        &state,
        claims.sub,
        booking_id,
        &payload.order_ref,
        &payload.payment_ref,
        &payload.signature,
        &payload.provider,
    )
    .await?;

    Ok(Json(paid))
}

/// Payment history: made (passenger) or received (driver)
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<payment::Model>>> {
    let requester = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(
        payment_service::payment_history(&state, &requester).await?,
    ))
}
