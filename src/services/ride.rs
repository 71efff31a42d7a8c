use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::notification::Severity;
use crate::entities::ride::{self, RideStatus};
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::services::{fare, inventory, notify, payment};
use crate::AppState;

pub struct NewRide {
    pub source: String,
    pub destination: String,
    pub stopovers: Option<String>,
    pub travel_date: NaiveDate,
    pub travel_time: NaiveTime,
    pub price_per_seat: Option<f64>,
    pub total_seats: i32,
}

/// Who is cancelling a ride; admin force-cancels cascade with their own
/// terminal statuses.
pub enum RideCancelActor {
    Driver(Uuid),
    Admin,
}

/// Publish a ride. The fare engine resolves distance and geometry and
/// enforces the fare cap on a driver-supplied price.
pub async fn post_ride(state: &AppState, driver_id: Uuid, input: NewRide) -> AppResult<ride::Model> {
    if input.total_seats < 1 {
        return Err(AppError::BadRequest(
            "A ride needs at least 1 seat".to_string(),
        ));
    }

    if input.travel_date < Utc::now().date_naive() {
        return Err(AppError::PastDate(
            "Travel date cannot be in the past".to_string(),
        ));
    }

    let route = state
        .fare
        .resolve_route(&state.db, &input.source, &input.destination)
        .await?;
    let max_fare = state.fare.max_fare(route.distance_km);
    let price = fare::validate_price(input.price_per_seat, max_fare)?;

    let created = ride::ActiveModel {
        id: Set(Uuid::new_v4()),
        driver_id: Set(driver_id),
        source: Set(input.source),
        destination: Set(input.destination),
        stopovers: Set(input.stopovers),
        travel_date: Set(input.travel_date),
        travel_time: Set(input.travel_time),
        price_per_seat: Set(price),
        total_seats: Set(input.total_seats),
        available_seats: Set(input.total_seats),
        status: Set(RideStatus::Available),
        distance_km: Set(Some(route.distance_km)),
        encoded_polyline: Set(route.encoded_polyline),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(created)
}

pub async fn my_rides(state: &AppState, driver_id: Uuid) -> AppResult<Vec<ride::Model>> {
    Ok(ride::Entity::find()
        .filter(ride::Column::DriverId.eq(driver_id))
        .all(&state.db)
        .await?)
}

pub async fn get_ride(state: &AppState, ride_id: Uuid) -> AppResult<ride::Model> {
    ride::Entity::find_by_id(ride_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))
}

pub async fn start_ride(state: &AppState, driver_id: Uuid, ride_id: Uuid) -> AppResult<ride::Model> {
    let found = get_ride(state, ride_id).await?;

    if found.driver_id != driver_id {
        return Err(AppError::Forbidden(
            "Not authorized to start this ride".to_string(),
        ));
    }

    if !found.status.is_open() {
        return Err(AppError::InvalidState(
            "Ride cannot be started".to_string(),
        ));
    }

    let mut active: ride::ActiveModel = found.into();
    active.status = Set(RideStatus::InProgress);
    Ok(active.update(&state.db).await?)
}

/// Complete a ride. Seat-holding paid bookings move to completed; nothing
/// monetary changes and no seats are returned — the trip consumed them.
pub async fn complete_ride(
    state: &AppState,
    driver_id: Uuid,
    ride_id: Uuid,
) -> AppResult<ride::Model> {
    let found = get_ride(state, ride_id).await?;

    if found.driver_id != driver_id {
        return Err(AppError::Forbidden(
            "Not authorized to complete this ride".to_string(),
        ));
    }

    if found.status != RideStatus::InProgress {
        return Err(AppError::InvalidState(
            "Only a ride in progress can be completed".to_string(),
        ));
    }

    let bookings = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .all(&state.db)
        .await?;

    let txn = state.db.begin().await?;

    let mut active: ride::ActiveModel = found.into();
    active.status = Set(RideStatus::Completed);
    let updated = active.update(&txn).await?;

    for b in bookings {
        if matches!(
            b.status,
            BookingStatus::Confirmed | BookingStatus::Onboarded
        ) {
            let mut active: booking::ActiveModel = b.into();
            active.status = Set(BookingStatus::Completed);
            active.update(&txn).await?;
        }
    }

    txn.commit().await?;
    Ok(updated)
}

/// Cancel a ride and cascade to its bookings: every non-terminal booking
/// force-moves to the matching cancelled status with its seat reservation
/// released, all in one transaction. Refunds and passenger notifications
/// run best-effort after commit.
pub async fn cancel_ride(
    state: &AppState,
    actor: RideCancelActor,
    ride_id: Uuid,
    reason: String,
) -> AppResult<ride::Model> {
    let found = get_ride(state, ride_id).await?;

    if let RideCancelActor::Driver(driver_id) = &actor {
        if found.driver_id != *driver_id {
            return Err(AppError::Forbidden(
                "Not authorized to cancel this ride".to_string(),
            ));
        }
    }

    if !found.status.is_open() {
        return Err(AppError::InvalidState(
            "Ride cannot be cancelled".to_string(),
        ));
    }

    let (ride_status, booking_status) = match actor {
        RideCancelActor::Driver(_) => (RideStatus::Cancelled, BookingStatus::CancelledByDriver),
        RideCancelActor::Admin => (
            RideStatus::CancelledByAdmin,
            BookingStatus::CancelledByAdmin,
        ),
    };

    let bookings = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .all(&state.db)
        .await?;

    let txn = state.db.begin().await?;

    let mut active: ride::ActiveModel = found.clone().into();
    active.status = Set(ride_status);
    active.cancellation_reason = Set(Some(reason));
    let updated = active.update(&txn).await?;

    let mut cascaded: Vec<booking::Model> = Vec::new();
    for b in bookings {
        if b.status.is_terminal() {
            continue;
        }
        inventory::release_seats(&txn, ride_id, b.seats).await?;

        let mut active: booking::ActiveModel = b.clone().into();
        active.status = Set(booking_status.clone());
        active.update(&txn).await?;
        cascaded.push(b);
    }

    txn.commit().await?;

    for b in &cascaded {
        if let Err(e) = payment::refund_booking(state, b.id).await {
            tracing::warn!("refund failed for booking {} on cancelled ride: {}", b.id, e);
        }

        if let Ok(Some(passenger)) = user::Entity::find_by_id(b.passenger_id).one(&state.db).await
        {
            notify::notify_user(
                &state.db,
                &passenger.email,
                "Ride Cancelled",
                "Your ride was cancelled. Any payment will be refunded.",
                Severity::Warning,
            )
            .await;
            state.mailer.send_ride_cancellation(
                &passenger.email,
                &passenger.name,
                &found.source,
                &found.destination,
            );
        }
    }

    Ok(updated)
}

#[derive(Debug, Serialize)]
pub struct PassengerManifestEntry {
    pub booking_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub seats: i32,
    pub status: BookingStatus,
}

/// Non-cancelled bookings with passenger contact details, for the driver
/// running the ride (or an admin).
pub async fn passengers_for_ride(
    state: &AppState,
    requester: Option<Uuid>,
    ride_id: Uuid,
) -> AppResult<Vec<PassengerManifestEntry>> {
    let found = get_ride(state, ride_id).await?;

    if let Some(driver_id) = requester {
        if found.driver_id != driver_id {
            return Err(AppError::Forbidden(
                "Not authorized to view this ride's passengers".to_string(),
            ));
        }
    }

    let bookings = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .all(&state.db)
        .await?;

    let passenger_ids: Vec<Uuid> = bookings.iter().map(|b| b.passenger_id).collect();
    let passengers = if passenger_ids.is_empty() {
        Vec::new()
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(passenger_ids))
            .all(&state.db)
            .await?
    };

    let manifest = bookings
        .into_iter()
        .filter(|b| !b.status.is_cancelled())
        .filter_map(|b| {
            let p = passengers.iter().find(|p| p.id == b.passenger_id)?;
            Some(PassengerManifestEntry {
                booking_id: b.id,
                name: p.name.clone(),
                email: p.email.clone(),
                phone: p.phone.clone(),
                seats: b.seats,
                status: b.status,
            })
        })
        .collect();

    Ok(manifest)
}
