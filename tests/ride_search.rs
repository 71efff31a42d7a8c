mod common;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use rideshare_backend::entities::ride::RideStatus;
use rideshare_backend::entities::route_distance;
use rideshare_backend::entities::user::UserRole;
use rideshare_backend::error::AppError;
use rideshare_backend::services::matching::{self, SearchQuery};
use rideshare_backend::services::ride::{self as ride_service, NewRide};
use rideshare_backend::services::routing::{Coordinate, RouteDetails};
use rideshare_backend::utils::geo;

use common::{create_user, next_week, nine_am, RideFixture, StubRouting};

fn query(source: &str, destination: &str) -> SearchQuery {
    SearchQuery {
        source: Some(source.to_string()),
        destination: Some(destination.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn browse_mode_lists_only_open_rides() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;

    RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let mut closed = RideFixture::new(driver.id, "Chennai", "Vellore", 4);
    closed.status = RideStatus::Cancelled;
    closed.insert(&state).await;

    let all = matching::search_rides(&state.db, state.routing.as_ref(), &SearchQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].destination, "Bangalore");
}

#[tokio::test]
async fn text_search_matches_exact_and_stopovers() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;

    let mut with_stops = RideFixture::new(driver.id, "Chennai", "Bangalore", 4);
    with_stops.stopovers = Some("Vellore, Krishnagiri".to_string());
    with_stops.insert(&state).await;

    // Exact, case-insensitive
    let hits = matching::search_rides(
        &state.db,
        state.routing.as_ref(),
        &query("chennai", "bangalore"),
    )
    .await
    .unwrap();
    assert_eq!(hits.len(), 1);

    // Destination found in the stopover list
    let hits = matching::search_rides(
        &state.db,
        state.routing.as_ref(),
        &query("Chennai", "vellore"),
    )
    .await
    .unwrap();
    assert_eq!(hits.len(), 1);

    // Unknown places, nothing geocodes, no geometry: empty
    let hits = matching::search_rides(
        &state.db,
        state.routing.as_ref(),
        &query("Mumbai", "Pune"),
    )
    .await
    .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn filters_narrow_the_result_set() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;

    let mut cheap = RideFixture::new(driver.id, "Chennai", "Bangalore", 1);
    cheap.price_per_seat = 150.0;
    cheap.insert(&state).await;

    let mut roomy = RideFixture::new(driver.id, "Chennai", "Bangalore", 4);
    roomy.price_per_seat = 260.0;
    roomy.insert(&state).await;

    let mut q = query("Chennai", "Bangalore");
    q.min_seats = Some(2);
    let hits = matching::search_rides(&state.db, state.routing.as_ref(), &q)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].price_per_seat, 260.0);

    let mut q = query("Chennai", "Bangalore");
    q.max_price = Some(200.0);
    let hits = matching::search_rides(&state.db, state.routing.as_ref(), &q)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].price_per_seat, 150.0);

    let mut q = query("Chennai", "Bangalore");
    q.date = Some(next_week());
    assert_eq!(
        matching::search_rides(&state.db, state.routing.as_ref(), &q)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn corridor_fallback_matches_directionally() {
    // Route running east along the equator; two query towns sit just off
    // the line, no textual relation to the ride at all.
    let path = vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)];
    let stub = StubRouting {
        places: vec![
            (
                "Easton".to_string(),
                Coordinate { lat: 0.05, lng: 0.4 },
            ),
            (
                "Westville".to_string(),
                Coordinate { lat: 0.05, lng: 1.6 },
            ),
        ],
        route: None,
    };
    let state = common::setup_with_routing(stub).await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;

    let mut fixture = RideFixture::new(driver.id, "Alpha City", "Omega City", 4);
    fixture.encoded_polyline = Some(geo::encode_polyline(&path));
    fixture.distance_km = Some(geo::path_length_m(&path) / 1000.0);
    fixture.insert(&state).await;

    // Forward itinerary is picked up by the corridor fallback
    let hits = matching::search_rides(
        &state.db,
        state.routing.as_ref(),
        &query("Easton", "Westville"),
    )
    .await
    .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, "Alpha City");

    // The reverse itinerary runs against the driver's direction
    let hits = matching::search_rides(
        &state.db,
        state.routing.as_ref(),
        &query("Westville", "Easton"),
    )
    .await
    .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn corridor_fallback_needs_both_endpoints_geocoded() {
    let path = vec![(0.0, 0.0), (0.0, 2.0)];
    let stub = StubRouting {
        places: vec![(
            "Easton".to_string(),
            Coordinate { lat: 0.05, lng: 0.4 },
        )],
        route: None,
    };
    let state = common::setup_with_routing(stub).await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;

    let mut fixture = RideFixture::new(driver.id, "Alpha City", "Omega City", 4);
    fixture.encoded_polyline = Some(geo::encode_polyline(&path));
    fixture.insert(&state).await;

    let hits = matching::search_rides(
        &state.db,
        state.routing.as_ref(),
        &query("Easton", "Nowhere"),
    )
    .await
    .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn quotes_are_stable_without_a_provider() {
    let state = common::setup().await;

    let first = state
        .fare
        .quote(&state.db, "Chennai", "Bangalore")
        .await
        .unwrap();
    let second = state
        .fare
        .quote(&state.db, "Chennai", "Bangalore")
        .await
        .unwrap();

    assert_eq!(first.distance_km, second.distance_km);
    assert_eq!(first.max_fare, second.max_fare);
    // Cap formula: round((50 + d*5) / 10) * 10
    assert!(first.max_fare >= 300.0);
    assert_eq!(first.max_fare % 10.0, 0.0);

    // Fallback estimates are never cached
    assert!(route_distance::Entity::find()
        .all(&state.db)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn provider_distances_are_cached_for_reuse() {
    let path = vec![(12.97, 77.59), (13.00, 78.50), (13.08, 80.27)];
    let stub = StubRouting {
        places: Vec::new(),
        route: Some(RouteDetails {
            distance_km: 350.0,
            encoded_polyline: geo::encode_polyline(&path),
        }),
    };
    let state = common::setup_with_routing(stub).await;

    let quote = state
        .fare
        .quote(&state.db, " Bangalore ", "CHENNAI")
        .await
        .unwrap();
    assert_eq!(quote.distance_km, 350.0);
    // 50 + 350*5 = 1800, already on the step
    assert_eq!(quote.max_fare, 1800.0);

    let cached = route_distance::Entity::find()
        .filter(route_distance::Column::Source.eq("bangalore"))
        .filter(route_distance::Column::Destination.eq("chennai"))
        .one(&state.db)
        .await
        .unwrap()
        .expect("cache entry written back");
    assert_eq!(cached.distance_km, 350.0);
    assert!(cached.encoded_polyline.is_some());
}

#[tokio::test]
async fn posting_a_ride_enforces_the_fare_cap() {
    let path = vec![(12.97, 77.59), (13.08, 80.27)];
    let stub = StubRouting {
        places: Vec::new(),
        route: Some(RouteDetails {
            distance_km: 100.0,
            encoded_polyline: geo::encode_polyline(&path),
        }),
    };
    let state = common::setup_with_routing(stub).await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;

    // Cap is round((50 + 100*5)/10)*10 = 550
    let over = ride_service::post_ride(
        &state,
        driver.id,
        NewRide {
            source: "Bangalore".to_string(),
            destination: "Chennai".to_string(),
            stopovers: None,
            travel_date: next_week(),
            travel_time: nine_am(),
            price_per_seat: Some(551.0),
            total_seats: 3,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(over, AppError::PriceExceedsFareCap(_)));

    let posted = ride_service::post_ride(
        &state,
        driver.id,
        NewRide {
            source: "Bangalore".to_string(),
            destination: "Chennai".to_string(),
            stopovers: None,
            travel_date: next_week(),
            travel_time: nine_am(),
            price_per_seat: None,
            total_seats: 3,
        },
    )
    .await
    .unwrap();

    // Omitted price defaults to the cap; geometry is attached
    assert_eq!(posted.price_per_seat, 550.0);
    assert_eq!(posted.status, RideStatus::Available);
    assert_eq!(posted.available_seats, 3);
    assert!(posted.encoded_polyline.is_some());
    assert_eq!(posted.distance_km, Some(100.0));
}
