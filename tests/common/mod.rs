#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use rideshare_backend::config::{Config, FareConfig, MailConfig, PaymentConfig, RoutingConfig};
use rideshare_backend::entities::ride::{self, RideStatus};
use rideshare_backend::entities::user::{self, UserRole};
use rideshare_backend::services::routing::{Coordinate, RouteDetails, Routing};
use rideshare_backend::AppState;

/// Canned routing collaborator: geocodes from a fixed table and serves a
/// single optional route. An empty stub behaves like an absent provider.
#[derive(Default)]
pub struct StubRouting {
    pub places: Vec<(String, Coordinate)>,
    pub route: Option<RouteDetails>,
}

#[async_trait]
impl Routing for StubRouting {
    async fn geocode(&self, place: &str) -> Option<Coordinate> {
        self.places
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(place))
            .map(|(_, coord)| *coord)
    }

    async fn route_details(&self, _source: &str, _destination: &str) -> Option<RouteDetails> {
        self.route.clone()
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_expiration_hours: 24,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        fare: FareConfig::default(),
        payment: PaymentConfig::default(),
        routing: RoutingConfig {
            nominatim_url: "http://localhost:1".to_string(),
            osrm_url: "http://localhost:1".to_string(),
        },
        mail: MailConfig {
            relay_url: None,
            relay_api_key: None,
            from_address: "test@rideshare.local".to_string(),
        },
    }
}

pub async fn setup() -> AppState {
    setup_with_routing(StubRouting::default()).await
}

/// Fresh in-memory database with the real migrations applied. A single
/// pooled connection keeps every test connection on the same database.
pub async fn setup_with_routing(routing: StubRouting) -> AppState {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1);

    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory sqlite");
    migration::Migrator::up(&db, None)
        .await
        .expect("migrations failed");

    AppState::with_routing(db, test_config(), Arc::new(routing))
}

pub async fn create_user(
    state: &AppState,
    name: &str,
    role: UserRole,
    email_verified: bool,
) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(format!("{}@example.com", name)),
        password_hash: Set("not-a-real-hash".to_string()),
        name: Set(name.to_string()),
        phone: Set(None),
        role: Set(role),
        email_verified: Set(email_verified),
        verification_code: Set(None),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .expect("failed to insert user")
}

pub fn next_week() -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(7))
        .expect("date overflow")
}

pub fn nine_am() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).expect("valid time")
}

/// Insert a ride directly, bypassing the fare engine, for tests that need
/// full control over price, geometry or dates.
pub struct RideFixture {
    pub driver_id: Uuid,
    pub source: String,
    pub destination: String,
    pub stopovers: Option<String>,
    pub travel_date: NaiveDate,
    pub price_per_seat: f64,
    pub total_seats: i32,
    pub status: RideStatus,
    pub distance_km: Option<f64>,
    pub encoded_polyline: Option<String>,
}

impl RideFixture {
    pub fn new(driver_id: Uuid, source: &str, destination: &str, total_seats: i32) -> Self {
        Self {
            driver_id,
            source: source.to_string(),
            destination: destination.to_string(),
            stopovers: None,
            travel_date: next_week(),
            price_per_seat: 200.0,
            total_seats,
            status: RideStatus::Available,
            distance_km: None,
            encoded_polyline: None,
        }
    }

    pub async fn insert(self, state: &AppState) -> ride::Model {
        ride::ActiveModel {
            id: Set(Uuid::new_v4()),
            driver_id: Set(self.driver_id),
            source: Set(self.source),
            destination: Set(self.destination),
            stopovers: Set(self.stopovers),
            travel_date: Set(self.travel_date),
            travel_time: Set(nine_am()),
            price_per_seat: Set(self.price_per_seat),
            total_seats: Set(self.total_seats),
            available_seats: Set(self.total_seats),
            status: Set(self.status),
            distance_km: Set(self.distance_km),
            encoded_polyline: Set(self.encoded_polyline),
            cancellation_reason: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(&state.db)
        .await
        .expect("failed to insert ride")
    }
}
