use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::ride::{self, RideStatus};
use crate::entities::user;
use crate::error::AppResult;
use crate::services::fare::Quote;
use crate::services::matching::{self, SearchQuery};
use crate::services::ride::{self as ride_service, NewRide, PassengerManifestEntry, RideCancelActor};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub id: Uuid,
    pub driver_name: String,
    pub source: String,
    pub destination: String,
    pub stopovers: Option<String>,
    pub travel_date: NaiveDate,
    pub travel_time: NaiveTime,
    pub price_per_seat: f64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub status: RideStatus,
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl RideResponse {
    fn build(ride: ride::Model, drivers: &[user::Model]) -> Self {
        let driver_name = drivers
            .iter()
            .find(|d| d.id == ride.driver_id)
            .map(|d| d.name.clone())
            .unwrap_or_default();

        Self {
            id: ride.id,
            driver_name,
            source: ride.source,
            destination: ride.destination,
            stopovers: ride.stopovers,
            travel_date: ride.travel_date,
            travel_time: ride.travel_time,
            price_per_seat: ride.price_per_seat,
            total_seats: ride.total_seats,
            available_seats: ride.available_seats,
            status: ride.status,
            distance_km: ride.distance_km,
            created_at: ride.created_at.with_timezone(&Utc),
        }
    }
}

async fn with_driver_names(
    state: &AppState,
    rides: Vec<ride::Model>,
) -> AppResult<Vec<RideResponse>> {
    let driver_ids: Vec<Uuid> = rides.iter().map(|r| r.driver_id).collect();
    let drivers = if driver_ids.is_empty() {
        Vec::new()
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(driver_ids))
            .all(&state.db)
            .await?
    };

    Ok(rides
        .into_iter()
        .map(|r| RideResponse::build(r, &drivers))
        .collect())
}

/// Browse all rides currently open for booking
pub async fn list_rides(State(state): State<AppState>) -> AppResult<Json<Vec<RideResponse>>> {
    let rides = ride::Entity::find()
        .filter(ride::Column::Status.eq(RideStatus::Available))
        .all(&state.db)
        .await?;

    Ok(Json(with_driver_names(&state, rides).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_seats: Option<i32>,
}

pub async fn search_rides(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<RideResponse>>> {
    let query = SearchQuery {
        source: params.source,
        destination: params.destination,
        date: params.date,
        min_price: params.min_price,
        max_price: params.max_price,
        min_seats: params.min_seats,
    };

    let rides = matching::search_rides(&state.db, state.routing.as_ref(), &query).await?;
    Ok(Json(with_driver_names(&state, rides).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub source: String,
    pub destination: String,
}

/// Fare estimate for a place pair, shown to drivers before posting
pub async fn quote_fare(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> AppResult<Json<Quote>> {
    let quote = state
        .fare
        .quote(&state.db, &params.source, &params.destination)
        .await?;
    Ok(Json(quote))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let found = ride_service::get_ride(&state, ride_id).await?;
    let drivers = user::Entity::find()
        .filter(user::Column::Id.eq(found.driver_id))
        .all(&state.db)
        .await?;
    Ok(Json(RideResponse::build(found, &drivers)))
}

// ============ Driver Ride Management ============

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub source: String,
    pub destination: String,
    pub stopovers: Option<String>,
    pub travel_date: NaiveDate,
    pub travel_time: NaiveTime,
    pub price_per_seat: Option<f64>,
    pub total_seats: i32,
}

pub async fn post_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRideRequest>,
) -> AppResult<Json<ride::Model>> {
    let created = ride_service::post_ride(
        &state,
        claims.sub,
        NewRide {
            source: payload.source,
            destination: payload.destination,
            stopovers: payload.stopovers,
            travel_date: payload.travel_date,
            travel_time: payload.travel_time,
            price_per_seat: payload.price_per_seat,
            total_seats: payload.total_seats,
        },
    )
    .await?;

    Ok(Json(created))
}

pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<ride::Model>>> {
    Ok(Json(ride_service::my_rides(&state, claims.sub).await?))
}

pub async fn start_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<ride::Model>> {
    Ok(Json(
        ride_service::start_ride(&state, claims.sub, ride_id).await?,
    ))
}

pub async fn complete_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<ride::Model>> {
    Ok(Json(
        ride_service::complete_ride(&state, claims.sub, ride_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CancelRideRequest {
    pub reason: String,
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<CancelRideRequest>,
) -> AppResult<Json<ride::Model>> {
    Ok(Json(
        ride_service::cancel_ride(
            &state,
            RideCancelActor::Driver(claims.sub),
            ride_id,
            payload.reason,
        )
        .await?,
    ))
}

pub async fn ride_passengers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<Vec<PassengerManifestEntry>>> {
    Ok(Json(
        ride_service::passengers_for_ride(&state, Some(claims.sub), ride_id).await?,
    ))
}
