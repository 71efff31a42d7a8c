use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ride::Table)
                    .if_not_exists()
                    .col(uuid(Ride::Id).primary_key())
                    .col(uuid(Ride::DriverId).not_null())
                    .col(string_len(Ride::Source, 255).not_null())
                    .col(string_len(Ride::Destination, 255).not_null())
                    .col(text_null(Ride::Stopovers))
                    .col(date(Ride::TravelDate).not_null())
                    .col(time(Ride::TravelTime).not_null())
                    .col(double(Ride::PricePerSeat).not_null())
                    .col(integer(Ride::TotalSeats).not_null())
                    .col(integer(Ride::AvailableSeats).not_null())
                    .col(string_len(Ride::Status, 32).not_null())
                    .col(double_null(Ride::DistanceKm))
                    .col(text_null(Ride::EncodedPolyline))
                    .col(string_len_null(Ride::CancellationReason, 255))
                    .col(
                        timestamp_with_time_zone(Ride::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_driver")
                            .from(Ride::Table, Ride::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rides_status")
                    .table(Ride::Table)
                    .col(Ride::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Ride::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Ride {
    Table,
    Id,
    DriverId,
    Source,
    Destination,
    Stopovers,
    TravelDate,
    TravelTime,
    PricePerSeat,
    TotalSeats,
    AvailableSeats,
    Status,
    DistanceKm,
    EncodedPolyline,
    CancellationReason,
    CreatedAt,
}
