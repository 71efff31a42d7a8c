use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::notification::Severity;
use crate::entities::ride;
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::services::{inventory, notify, payment};
use crate::AppState;

/// Who is cancelling a booking. Admin cancellations are recorded with
/// their own terminal status.
pub enum CancelActor {
    Passenger(Uuid),
    Admin,
}

/// Request seats on a ride. Seats are reserved at request time, before
/// driver approval, so a slow driver cannot cause an oversell during the
/// approval window. The reservation and the booking insert commit in one
/// transaction; on any validation failure no seat is touched.
pub async fn request_booking(
    state: &AppState,
    passenger_id: Uuid,
    ride_id: Uuid,
    seats: i32,
) -> AppResult<booking::Model> {
    if seats < 1 {
        return Err(AppError::BadRequest(
            "Must book at least 1 seat".to_string(),
        ));
    }

    let passenger = user::Entity::find_by_id(passenger_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !passenger.email_verified {
        return Err(AppError::Forbidden(
            "Please verify your email before booking a ride".to_string(),
        ));
    }

    let ride = ride::Entity::find_by_id(ride_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    if !ride.status.is_open() {
        return Err(AppError::InvalidState(
            "Ride is not open for booking".to_string(),
        ));
    }

    if ride.travel_date < Utc::now().date_naive() {
        return Err(AppError::PastDate("Cannot book past rides".to_string()));
    }

    if ride.driver_id == passenger.id {
        return Err(AppError::SelfBooking(
            "Cannot book your own ride".to_string(),
        ));
    }

    let previous = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride.id))
        .filter(booking::Column::PassengerId.eq(passenger.id))
        .all(&state.db)
        .await?;

    if previous.iter().any(|b| !b.status.is_cancelled()) {
        return Err(AppError::DuplicateBooking(
            "You have already requested or booked this ride".to_string(),
        ));
    }

    let txn = state.db.begin().await?;

    inventory::reserve_seats(&txn, ride.id, seats).await?;

    let created = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        ride_id: Set(ride.id),
        passenger_id: Set(passenger.id),
        seats: Set(seats),
        status: Set(BookingStatus::PendingApproval),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    if let Some(driver) = user::Entity::find_by_id(ride.driver_id)
        .one(&state.db)
        .await?
    {
        notify::notify_user(
            &state.db,
            &driver.email,
            "New Ride Request",
            &format!(
                "{} requested {} seat(s). Please accept or reject.",
                passenger.name, seats
            ),
            Severity::Info,
        )
        .await;
        state.mailer.send_booking_request_alert(
            &driver.email,
            &driver.name,
            &passenger.name,
            &ride.source,
            &ride.destination,
        );
    }

    Ok(created)
}

/// Driver accepts a pending request, opening the payment window and
/// binding a fresh one-time onboarding code to the booking.
pub async fn accept_booking(
    state: &AppState,
    driver_id: Uuid,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let (found, ride) = load_with_ride(state, booking_id).await?;

    if ride.driver_id != driver_id {
        return Err(AppError::Forbidden(
            "Not authorized to accept this booking".to_string(),
        ));
    }

    if found.status != BookingStatus::PendingApproval {
        return Err(AppError::InvalidState(
            "Booking is not pending approval".to_string(),
        ));
    }

    let code = generate_onboarding_code();
    let mut active: booking::ActiveModel = found.clone().into();
    active.status = Set(BookingStatus::PendingPayment);
    active.onboarding_code = Set(Some(code));
    let updated = active.update(&state.db).await?;

    if let Some(passenger) = user::Entity::find_by_id(found.passenger_id)
        .one(&state.db)
        .await?
    {
        notify::notify_user(
            &state.db,
            &passenger.email,
            "Request Accepted!",
            "The driver accepted your request. Please complete payment to confirm.",
            Severity::Success,
        )
        .await;
    }

    Ok(updated)
}

/// Driver rejects a pending request; the reserved seats go back to the
/// ride in the same transaction as the status flip.
pub async fn reject_booking(
    state: &AppState,
    driver_id: Uuid,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let (found, ride) = load_with_ride(state, booking_id).await?;

    if ride.driver_id != driver_id {
        return Err(AppError::Forbidden(
            "Not authorized to reject this booking".to_string(),
        ));
    }

    if found.status != BookingStatus::PendingApproval {
        return Err(AppError::InvalidState(
            "Cannot reject this booking".to_string(),
        ));
    }

    let txn = state.db.begin().await?;
    inventory::release_seats(&txn, ride.id, found.seats).await?;

    let mut active: booking::ActiveModel = found.clone().into();
    active.status = Set(BookingStatus::Rejected);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    if let Some(passenger) = user::Entity::find_by_id(found.passenger_id)
        .one(&state.db)
        .await?
    {
        notify::notify_user(
            &state.db,
            &passenger.email,
            "Request Rejected",
            "The driver declined your request.",
            Severity::Error,
        )
        .await;
    }

    Ok(updated)
}

/// Cancel a booking. Seats are restored and the status flips in one
/// transaction; the refund (when a successful payment exists) runs after
/// commit and is best-effort — a refund failure never unwinds the
/// cancellation itself.
pub async fn cancel_booking(
    state: &AppState,
    actor: CancelActor,
    booking_id: Uuid,
    reason: Option<String>,
) -> AppResult<booking::Model> {
    let (found, ride) = load_with_ride(state, booking_id).await?;

    if let CancelActor::Passenger(passenger_id) = &actor {
        if found.passenger_id != *passenger_id {
            return Err(AppError::Forbidden(
                "You can only cancel your own bookings".to_string(),
            ));
        }
    }

    if found.status.is_terminal() {
        return Err(AppError::InvalidState(
            "Booking is already cancelled or rejected".to_string(),
        ));
    }

    if !found.status.is_cancellable() {
        return Err(AppError::InvalidState(
            "Booking can no longer be cancelled".to_string(),
        ));
    }

    let new_status = match actor {
        CancelActor::Passenger(_) => BookingStatus::Cancelled,
        CancelActor::Admin => BookingStatus::CancelledByAdmin,
    };

    let txn = state.db.begin().await?;
    inventory::release_seats(&txn, ride.id, found.seats).await?;

    let mut active: booking::ActiveModel = found.clone().into();
    active.status = Set(new_status);
    active.cancellation_reason = Set(reason);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(e) = payment::refund_booking(state, booking_id).await {
        tracing::warn!("refund failed for cancelled booking {}: {}", booking_id, e);
    }

    let passenger = user::Entity::find_by_id(found.passenger_id)
        .one(&state.db)
        .await?;
    if let Some(driver) = user::Entity::find_by_id(ride.driver_id)
        .one(&state.db)
        .await?
    {
        let passenger_name = passenger.map(|p| p.name).unwrap_or_default();
        notify::notify_user(
            &state.db,
            &driver.email,
            "Booking Cancelled",
            &format!("{} cancelled their request.", passenger_name),
            Severity::Warning,
        )
        .await;
    }

    Ok(updated)
}

/// Driver checks the passenger's one-time code at pickup. The code is
/// cleared on success so it cannot be replayed.
pub async fn verify_onboarding(
    state: &AppState,
    driver_id: Uuid,
    booking_id: Uuid,
    code: &str,
) -> AppResult<booking::Model> {
    let (found, ride) = load_with_ride(state, booking_id).await?;

    if ride.driver_id != driver_id {
        return Err(AppError::Forbidden(
            "Not authorized to onboard this passenger".to_string(),
        ));
    }

    if found.status != BookingStatus::Confirmed {
        return Err(AppError::InvalidState(
            "Booking is not confirmed".to_string(),
        ));
    }

    if found.onboarding_code.as_deref() != Some(code) {
        return Err(AppError::BadRequest(
            "Invalid onboarding code".to_string(),
        ));
    }

    let mut active: booking::ActiveModel = found.clone().into();
    active.status = Set(BookingStatus::Onboarded);
    active.onboarding_code = Set(None);
    let updated = active.update(&state.db).await?;

    if let Some(passenger) = user::Entity::find_by_id(found.passenger_id)
        .one(&state.db)
        .await?
    {
        notify::notify_user(
            &state.db,
            &passenger.email,
            "Onboarded",
            "Welcome aboard! Have a safe journey.",
            Severity::Success,
        )
        .await;
    }

    Ok(updated)
}

pub async fn my_bookings(state: &AppState, passenger_id: Uuid) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::PassengerId.eq(passenger_id))
        .all(&state.db)
        .await?)
}

#[derive(Debug, Serialize)]
pub struct RoutePreset {
    pub source: String,
    pub destination: String,
    pub count: usize,
}

/// Most frequent source/destination pairs in the passenger's history,
/// for one-tap rebooking.
pub async fn recent_routes(state: &AppState, passenger_id: Uuid) -> AppResult<Vec<RoutePreset>> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::PassengerId.eq(passenger_id))
        .all(&state.db)
        .await?;

    if bookings.is_empty() {
        return Ok(Vec::new());
    }

    let ride_ids: Vec<Uuid> = bookings.iter().map(|b| b.ride_id).collect();
    let rides = ride::Entity::find()
        .filter(ride::Column::Id.is_in(ride_ids))
        .all(&state.db)
        .await?;

    let mut counts: Vec<RoutePreset> = Vec::new();
    for b in &bookings {
        let Some(ride) = rides.iter().find(|r| r.id == b.ride_id) else {
            continue;
        };
        match counts
            .iter_mut()
            .find(|p| p.source == ride.source && p.destination == ride.destination)
        {
            Some(preset) => preset.count += 1,
            None => counts.push(RoutePreset {
                source: ride.source.clone(),
                destination: ride.destination.clone(),
                count: 1,
            }),
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(3);
    Ok(counts)
}

/// The passenger's live booking for today, if any: a seat-holding booking
/// on a ride travelling today.
pub async fn active_booking_today(
    state: &AppState,
    passenger_id: Uuid,
) -> AppResult<Option<(booking::Model, ride::Model)>> {
    let today = Utc::now().date_naive();
    let bookings = booking::Entity::find()
        .filter(booking::Column::PassengerId.eq(passenger_id))
        .all(&state.db)
        .await?;

    for b in bookings {
        if !b.status.holds_seats() {
            continue;
        }
        let ride = ride::Entity::find_by_id(b.ride_id).one(&state.db).await?;
        if let Some(ride) = ride {
            if ride.travel_date == today && !ride.status.is_cancelled() {
                return Ok(Some((b, ride)));
            }
        }
    }

    Ok(None)
}

async fn load_with_ride(
    state: &AppState,
    booking_id: Uuid,
) -> AppResult<(booking::Model, ride::Model)> {
    let found = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let ride = ride::Entity::find_by_id(found.ride_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    Ok((found, ride))
}

fn generate_onboarding_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onboarding_code_shape() {
        for _ in 0..32 {
            let code = generate_onboarding_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_seat_holding_statuses() {
        use BookingStatus::*;
        for s in [PendingApproval, PendingPayment, Confirmed, Onboarded] {
            assert!(s.holds_seats());
            assert!(!s.is_terminal());
        }
        for s in [Completed, Rejected, Cancelled, CancelledByDriver, CancelledByAdmin] {
            assert!(!s.holds_seats());
            assert!(s.is_terminal());
        }
    }

    #[test]
    fn test_cancellable_statuses() {
        use BookingStatus::*;
        for s in [PendingApproval, PendingPayment, Confirmed] {
            assert!(s.is_cancellable());
        }
        for s in [Onboarded, Completed, Rejected, Cancelled, CancelledByDriver, CancelledByAdmin] {
            assert!(!s.is_cancellable());
        }
    }
}
