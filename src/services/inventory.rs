//! Seat inventory primitives. Both operations mutate the counter with a
//! single conditional UPDATE and must run inside the caller's transaction,
//! together with the booking status write they compensate for.

use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::ride::{self, RideStatus};
use crate::error::{AppError, AppResult};

/// Reserve `seats` on a ride. Fails with `CapacityExceeded` when the ride
/// has fewer seats left; concurrent reservations serialize on the
/// conditional UPDATE, so the counter can never go negative.
pub async fn reserve_seats<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    seats: i32,
) -> AppResult<()> {
    let result = ride::Entity::update_many()
        .col_expr(
            ride::Column::AvailableSeats,
            Expr::col(ride::Column::AvailableSeats).sub(seats),
        )
        .filter(ride::Column::Id.eq(ride_id))
        .filter(ride::Column::AvailableSeats.gte(seats))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::CapacityExceeded(
            "Not enough seats available".to_string(),
        ));
    }

    sync_capacity_status(conn, ride_id).await
}

/// Return `seats` to a ride. The caller guarantees exactly one release per
/// reservation; the total-seats guard catches a violated invariant rather
/// than silently overfilling the ride.
pub async fn release_seats<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    seats: i32,
) -> AppResult<()> {
    let result = ride::Entity::update_many()
        .col_expr(
            ride::Column::AvailableSeats,
            Expr::col(ride::Column::AvailableSeats).add(seats),
        )
        .filter(ride::Column::Id.eq(ride_id))
        .filter(
            Expr::expr(Expr::col(ride::Column::AvailableSeats).add(seats))
                .lte(Expr::col(ride::Column::TotalSeats)),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Internal(format!(
            "Seat release of {} would exceed capacity on ride {}",
            seats, ride_id
        )));
    }

    sync_capacity_status(conn, ride_id).await
}

/// Toggle `available <-> full` to track the counter. Other statuses are
/// left alone; a cancelled or started ride keeps its status even when
/// seats are released back to it.
async fn sync_capacity_status<C: ConnectionTrait>(conn: &C, ride_id: Uuid) -> AppResult<()> {
    let ride = ride::Entity::find_by_id(ride_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    let desired = match ride.status {
        RideStatus::Available if ride.available_seats == 0 => RideStatus::Full,
        RideStatus::Full if ride.available_seats > 0 => RideStatus::Available,
        _ => return Ok(()),
    };

    let mut active: ride::ActiveModel = ride.into();
    active.status = Set(desired);
    active.update(conn).await?;

    Ok(())
}
