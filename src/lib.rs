pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::fare::FareEngine;
use services::notify::Mailer;
use services::payment::PaymentGateway;
use services::routing::{OsrmRouting, Routing};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub routing: Arc<dyn Routing>,
    pub fare: FareEngine,
    pub payments: PaymentGateway,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let routing: Arc<dyn Routing> = Arc::new(OsrmRouting::new(config.routing.clone()));
        Self::with_routing(db, config, routing)
    }

    /// Build state with an injected routing collaborator; tests use this
    /// to avoid live geocoding calls.
    pub fn with_routing(
        db: DatabaseConnection,
        config: Config,
        routing: Arc<dyn Routing>,
    ) -> Self {
        Self {
            fare: FareEngine::new(routing.clone(), config.fare),
            payments: PaymentGateway::new(config.payment.clone()),
            mailer: Mailer::new(config.mail.clone()),
            routing,
            db,
            config,
        }
    }
}
