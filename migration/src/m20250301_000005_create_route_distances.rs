use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RouteDistance::Table)
                    .if_not_exists()
                    .col(uuid(RouteDistance::Id).primary_key())
                    .col(string_len(RouteDistance::Source, 255).not_null())
                    .col(string_len(RouteDistance::Destination, 255).not_null())
                    .col(double(RouteDistance::DistanceKm).not_null())
                    .col(text_null(RouteDistance::EncodedPolyline))
                    .col(
                        timestamp_with_time_zone(RouteDistance::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_route_distances_pair")
                    .table(RouteDistance::Table)
                    .col(RouteDistance::Source)
                    .col(RouteDistance::Destination)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RouteDistance::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum RouteDistance {
    Table,
    Id,
    Source,
    Destination,
    DistanceKm,
    EncodedPolyline,
    CreatedAt,
}
