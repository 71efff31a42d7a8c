use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Read-through cache of resolved routes, keyed by the normalized
/// (source, destination) pair. Never expired: routes between named places
/// are effectively static.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "route_distance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub source: String,
    pub destination: String,
    pub distance_km: f64,
    pub encoded_polyline: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
