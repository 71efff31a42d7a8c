use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{admin, auth, bookings, notifications, payments, rides};
use crate::middleware::auth::{auth_middleware, require_admin, require_driver, require_passenger};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Role-specific governor layers, keyed by user id
    let driver_governor = create_role_governor(RateLimitedRole::Driver);
    let passenger_governor = create_role_governor(RateLimitedRole::Passenger);
    // IP-based governor for public routes
    let public_governor = create_public_governor();

    // Public routes (IP rate limited)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-email", post(auth::verify_email))
        .layer(public_governor.clone());

    // Public ride discovery: browse, search, fare quote
    let public_routes = Router::new()
        .route("/rides", get(rides::list_rides))
        .route("/rides/search", get(rides::search_rides))
        .route("/rides/quote", get(rides::quote_fare))
        .route("/rides/{id}", get(rides::get_ride))
        .layer(public_governor);

    // Driver routes (requires auth + driver role)
    let driver_routes = Router::new()
        .route("/rides", post(rides::post_ride))
        .route("/rides", get(rides::my_rides))
        .route("/rides/{id}/start", put(rides::start_ride))
        .route("/rides/{id}/complete", put(rides::complete_ride))
        .route("/rides/{id}/cancel", put(rides::cancel_ride))
        .route("/rides/{id}/passengers", get(rides::ride_passengers))
        .route("/bookings/{id}/accept", put(bookings::accept_booking))
        .route("/bookings/{id}/reject", put(bookings::reject_booking))
        .route("/bookings/{id}/onboard", post(bookings::verify_onboarding))
        .layer(driver_governor)
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Passenger routes (requires auth + passenger role)
    let booking_routes = Router::new()
        .route("/", post(bookings::create_booking))
        .route("/", get(bookings::my_bookings))
        .route("/recent-routes", get(bookings::recent_routes))
        .route("/active", get(bookings::active_booking))
        .route("/{id}/cancel", put(bookings::cancel_booking))
        .layer(passenger_governor.clone())
        .layer(middleware::from_fn(require_passenger))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let payment_routes = Router::new()
        .route("/{booking_id}/initiate", post(payments::initiate))
        .route("/{booking_id}/complete", post(payments::complete))
        .layer(passenger_governor)
        .layer(middleware::from_fn(require_passenger))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Any authenticated role: payment history, notifications
    let account_routes = Router::new()
        .route("/payments/history", get(payments::history))
        .route("/notifications", get(notifications::list))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/rides", get(admin::list_rides))
        .route("/rides/{id}/cancel", put(admin::cancel_ride))
        .route("/bookings", get(admin::list_bookings))
        .route("/payments", get(admin::list_payments))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", public_routes)
        .nest("/api", account_routes)
        .nest("/api/driver", driver_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
}
