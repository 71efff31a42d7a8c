use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RideStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "full")]
    Full,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "cancelled_by_admin")]
    CancelledByAdmin,
}

impl RideStatus {
    /// A ride that can still accept bookings or be started.
    pub fn is_open(&self) -> bool {
        matches!(self, RideStatus::Available | RideStatus::Full)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RideStatus::Cancelled | RideStatus::CancelledByAdmin)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ride")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub driver_id: Uuid,
    pub source: String,
    pub destination: String,
    /// Comma-separated ordered list of intermediate stops.
    pub stopovers: Option<String>,
    pub travel_date: Date,
    pub travel_time: Time,
    pub price_per_seat: f64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub status: RideStatus,
    pub distance_km: Option<f64>,
    #[serde(skip_serializing)]
    pub encoded_polyline: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id"
    )]
    Driver,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Driver.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
