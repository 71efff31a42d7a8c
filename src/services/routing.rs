use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::RoutingConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone)]
pub struct RouteDetails {
    pub distance_km: f64,
    pub encoded_polyline: String,
}

/// Routing/geocoding collaborator. Implementations may fail or return
/// nothing; callers must tolerate absence and fall back.
#[async_trait]
pub trait Routing: Send + Sync {
    async fn geocode(&self, place: &str) -> Option<Coordinate>;
    async fn route_details(&self, source: &str, destination: &str) -> Option<RouteDetails>;
}

/// Nominatim (geocoding) + OSRM (routing) over HTTP.
pub struct OsrmRouting {
    http: reqwest::Client,
    config: RoutingConfig,
}

impl OsrmRouting {
    pub fn new(config: RoutingConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("rideshare-backend")
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self { http, config }
    }
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    /// Meters
    distance: f64,
    /// Encoded polyline
    geometry: String,
}

#[async_trait]
impl Routing for OsrmRouting {
    async fn geocode(&self, place: &str) -> Option<Coordinate> {
        let url = format!("{}/search", self.config.nominatim_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await;

        let places: Vec<NominatimPlace> = match response {
            Ok(resp) => match resp.json().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Geocoding parse failed for {:?}: {}", place, e);
                    return None;
                }
            },
            Err(e) => {
                tracing::warn!("Geocoding request failed for {:?}: {}", place, e);
                return None;
            }
        };

        let hit = places.into_iter().next()?;
        Some(Coordinate {
            lat: hit.lat.parse().ok()?,
            lng: hit.lon.parse().ok()?,
        })
    }

    async fn route_details(&self, source: &str, destination: &str) -> Option<RouteDetails> {
        let from = self.geocode(source).await?;
        let to = self.geocode(destination).await?;

        // OSRM takes lng,lat pairs
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.config.osrm_url, from.lng, from.lat, to.lng, to.lat
        );

        let response = self
            .http
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "polyline")])
            .send()
            .await;

        let parsed: OsrmResponse = match response {
            Ok(resp) => match resp.json().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Route response parse failed: {}", e);
                    return None;
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Route request failed for {:?} -> {:?}: {}",
                    source,
                    destination,
                    e
                );
                return None;
            }
        };

        if parsed.code != "Ok" {
            tracing::warn!("Routing provider returned code {:?}", parsed.code);
            return None;
        }

        let route = parsed.routes.into_iter().next()?;
        Some(RouteDetails {
            distance_km: route.distance / 1000.0,
            encoded_polyline: route.geometry,
        })
    }
}
