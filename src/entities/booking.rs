use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum BookingStatus {
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "pending_payment")]
    PendingPayment,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "onboarded")]
    Onboarded,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "cancelled_by_driver")]
    CancelledByDriver,
    #[sea_orm(string_value = "cancelled_by_admin")]
    CancelledByAdmin,
}

impl BookingStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled
                | BookingStatus::CancelledByDriver
                | BookingStatus::CancelledByAdmin
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Rejected
        ) || self.is_cancelled()
    }

    /// Statuses that still hold a seat reservation on the ride. Exactly
    /// these bookings get their seats released on reject/cancel; a
    /// completed booking consumed its seats and never returns them.
    pub fn holds_seats(&self) -> bool {
        matches!(
            self,
            BookingStatus::PendingApproval
                | BookingStatus::PendingPayment
                | BookingStatus::Confirmed
                | BookingStatus::Onboarded
        )
    }

    /// A passenger (or admin) may cancel only before onboarding.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            BookingStatus::PendingApproval
                | BookingStatus::PendingPayment
                | BookingStatus::Confirmed
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub seats: i32,
    pub status: BookingStatus,
    #[serde(skip_serializing)]
    pub onboarding_code: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ride::Entity",
        from = "Column::RideId",
        to = "super::ride::Column::Id"
    )]
    Ride,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::PassengerId",
        to = "super::user::Column::Id"
    )]
    Passenger,
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
}

impl Related<super::ride::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ride.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Passenger.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
