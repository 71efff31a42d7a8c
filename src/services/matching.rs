use chrono::NaiveDate;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::ride::{self, RideStatus};
use crate::error::AppResult;
use crate::services::routing::{Coordinate, Routing};
use crate::utils::geo;

#[derive(Debug, Default, Clone)]
pub struct SearchQuery {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_seats: Option<i32>,
}

impl SearchQuery {
    fn source(&self) -> Option<&str> {
        self.source.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn destination(&self) -> Option<&str> {
        self.destination
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn is_browse(&self) -> bool {
        self.source().is_none() && self.destination().is_none() && self.date.is_none()
    }
}

/// Find candidate rides for a passenger's itinerary. Text filtering runs
/// first; when it comes up empty and both endpoints geocode, the corridor
/// fallback matches against stored route geometry.
pub async fn search_rides(
    db: &DatabaseConnection,
    routing: &dyn Routing,
    query: &SearchQuery,
) -> AppResult<Vec<ride::Model>> {
    let mut find = ride::Entity::find().filter(ride::Column::Status.eq(RideStatus::Available));

    if query.is_browse() {
        return Ok(find.all(db).await?);
    }

    if let Some(date) = query.date {
        find = find.filter(ride::Column::TravelDate.eq(date));
    }
    if let Some(min) = query.min_price {
        find = find.filter(ride::Column::PricePerSeat.gte(min));
    }
    if let Some(max) = query.max_price {
        find = find.filter(ride::Column::PricePerSeat.lte(max));
    }
    if let Some(seats) = query.min_seats {
        find = find.filter(ride::Column::AvailableSeats.gte(seats));
    }

    let candidates = find.all(db).await?;

    let text_matches: Vec<ride::Model> = candidates
        .iter()
        .filter(|r| {
            place_matches(&r.source, r.stopovers.as_deref(), query.source())
                && place_matches(&r.destination, r.stopovers.as_deref(), query.destination())
        })
        .cloned()
        .collect();

    if !text_matches.is_empty() {
        return Ok(text_matches);
    }

    let (Some(source), Some(destination)) = (query.source(), query.destination()) else {
        return Ok(text_matches);
    };

    let Some(start) = routing.geocode(source).await else {
        return Ok(text_matches);
    };
    let Some(end) = routing.geocode(destination).await else {
        return Ok(text_matches);
    };

    Ok(candidates
        .into_iter()
        .filter(|r| corridor_match(r, start, end))
        .collect())
}

/// Case-insensitive: the field matches exactly, or the query appears in
/// the ride's stopover list. An absent query matches everything.
fn place_matches(field: &str, stopovers: Option<&str>, query: Option<&str>) -> bool {
    let Some(q) = query else {
        return true;
    };
    let q = q.to_lowercase();

    if field.to_lowercase() == q {
        return true;
    }
    stopovers
        .map(|s| s.to_lowercase().contains(&q))
        .unwrap_or(false)
}

/// A ride matches when both query points fall inside the route's dynamic
/// corridor and the start precedes the end along the direction of travel.
pub fn corridor_match(ride: &ride::Model, start: Coordinate, end: Coordinate) -> bool {
    let Some(encoded) = ride.encoded_polyline.as_deref() else {
        return false;
    };
    let Some(path) = geo::decode_polyline(encoded) else {
        return false;
    };
    if path.len() < 2 {
        return false;
    }

    let route_m = ride
        .distance_km
        .map(|km| km * 1000.0)
        .unwrap_or_else(|| geo::path_length_m(&path));
    let buffer_m = geo::corridor_buffer_m(route_m);

    let Some(from) = geo::project_onto_path(&path, (start.lat, start.lng)) else {
        return false;
    };
    let Some(to) = geo::project_onto_path(&path, (end.lat, end.lng)) else {
        return false;
    };

    from.distance_m <= buffer_m && to.distance_m <= buffer_m && from.along_m < to.along_m
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn ride_with_path(path: &[(f64, f64)], distance_km: Option<f64>) -> ride::Model {
        ride::Model {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            source: "A".to_string(),
            destination: "B".to_string(),
            stopovers: None,
            travel_date: Utc::now().date_naive(),
            travel_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            price_per_seat: 500.0,
            total_seats: 4,
            available_seats: 4,
            status: RideStatus::Available,
            distance_km,
            encoded_polyline: Some(geo::encode_polyline(path)),
            cancellation_reason: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_place_matches_exact_and_stopovers() {
        assert!(place_matches("Chennai", None, Some("chennai")));
        assert!(!place_matches("Chennai", None, Some("chen")));
        assert!(place_matches("Chennai", Some("Vellore, Krishnagiri"), Some("vellore")));
        assert!(place_matches("Chennai", None, None));
    }

    #[test]
    fn test_corridor_accepts_points_near_route() {
        // ~220 km route due east along the equator; buffer clamps to 20 km
        let path = vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)];
        let ride = ride_with_path(&path, None);

        // Both points ~11 km off the line, start before end
        let start = Coordinate { lat: 0.1, lng: 0.4 };
        let end = Coordinate { lat: 0.1, lng: 1.6 };
        assert!(corridor_match(&ride, start, end));
    }

    #[test]
    fn test_corridor_rejects_reverse_direction() {
        let path = vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)];
        let ride = ride_with_path(&path, None);

        let start = Coordinate { lat: 0.1, lng: 1.6 };
        let end = Coordinate { lat: 0.1, lng: 0.4 };
        assert!(!corridor_match(&ride, start, end));
    }

    #[test]
    fn test_corridor_rejects_points_outside_buffer() {
        let path = vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)];
        let ride = ride_with_path(&path, None);

        // ~55 km off the line, far beyond the 20 km ceiling
        let start = Coordinate { lat: 0.5, lng: 0.4 };
        let end = Coordinate { lat: 0.0, lng: 1.6 };
        assert!(!corridor_match(&ride, start, end));
    }

    #[test]
    fn test_corridor_buffer_scales_with_short_routes() {
        // ~55 km route: buffer floors at 5 km, so an 11 km offset misses
        let path = vec![(0.0, 0.0), (0.0, 0.5)];
        let ride = ride_with_path(&path, None);

        let start = Coordinate { lat: 0.1, lng: 0.1 };
        let end = Coordinate { lat: 0.1, lng: 0.4 };
        assert!(!corridor_match(&ride, start, end));

        // A 2 km offset fits inside the 5.5 km buffer
        let start = Coordinate { lat: 0.02, lng: 0.1 };
        let end = Coordinate { lat: 0.02, lng: 0.4 };
        assert!(corridor_match(&ride, start, end));
    }

    #[test]
    fn test_corridor_requires_geometry() {
        let mut ride = ride_with_path(&[(0.0, 0.0), (0.0, 1.0)], None);
        ride.encoded_polyline = None;
        assert!(!corridor_match(
            &ride,
            Coordinate { lat: 0.0, lng: 0.2 },
            Coordinate { lat: 0.0, lng: 0.8 }
        ));
    }
}
