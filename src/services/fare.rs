use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::config::FareConfig;
use crate::entities::route_distance;
use crate::error::{AppError, AppResult};
use crate::services::routing::Routing;

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Quote {
    pub distance_km: f64,
    pub max_fare: f64,
}

#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub distance_km: f64,
    pub encoded_polyline: Option<String>,
    /// True when the distance came from the seeded fallback rather than
    /// the cache or the provider.
    pub estimated: bool,
}

/// Prices rides and resolves distances: cache, then provider, then a
/// deterministic fallback. Provider failures never reach the caller.
#[derive(Clone)]
pub struct FareEngine {
    routing: Arc<dyn Routing>,
    config: FareConfig,
}

impl FareEngine {
    pub fn new(routing: Arc<dyn Routing>, config: FareConfig) -> Self {
        Self { routing, config }
    }

    pub async fn quote<C: ConnectionTrait>(
        &self,
        db: &C,
        source: &str,
        destination: &str,
    ) -> AppResult<Quote> {
        let route = self.resolve_route(db, source, destination).await?;
        Ok(Quote {
            distance_km: route.distance_km,
            max_fare: self.max_fare(route.distance_km),
        })
    }

    pub fn max_fare(&self, distance_km: f64) -> f64 {
        round_to_step(
            self.config.base_fare + distance_km * self.config.rate_per_km,
            self.config.round_step,
        )
    }

    /// Resolve distance and geometry for a place pair. Cached results are
    /// reused; provider results are written back; with no provider the
    /// seeded fallback keeps repeated quotes stable.
    pub async fn resolve_route<C: ConnectionTrait>(
        &self,
        db: &C,
        source: &str,
        destination: &str,
    ) -> AppResult<ResolvedRoute> {
        let src = normalize_place(source);
        let dst = normalize_place(destination);

        let cached = route_distance::Entity::find()
            .filter(route_distance::Column::Source.eq(&src))
            .filter(route_distance::Column::Destination.eq(&dst))
            .one(db)
            .await?;

        if let Some(hit) = cached {
            tracing::debug!("route cache hit: {} -> {}", src, dst);
            return Ok(ResolvedRoute {
                distance_km: hit.distance_km,
                encoded_polyline: hit.encoded_polyline,
                estimated: false,
            });
        }

        if let Some(details) = self.routing.route_details(source, destination).await {
            let entry = route_distance::ActiveModel {
                id: Set(Uuid::new_v4()),
                source: Set(src.clone()),
                destination: Set(dst.clone()),
                distance_km: Set(details.distance_km),
                encoded_polyline: Set(Some(details.encoded_polyline.clone())),
                created_at: Set(chrono::Utc::now().into()),
                ..Default::default()
            };
            // A concurrent quote may have raced us to the unique pair.
            if let Err(e) = entry.insert(db).await {
                tracing::warn!("route cache write failed for {} -> {}: {}", src, dst, e);
            }

            return Ok(ResolvedRoute {
                distance_km: details.distance_km,
                encoded_polyline: Some(details.encoded_polyline),
                estimated: false,
            });
        }

        // Fallback estimates are not cached: a later provider call should
        // still get the chance to replace them.
        Ok(ResolvedRoute {
            distance_km: fallback_distance_km(&src, &dst),
            encoded_polyline: None,
            estimated: true,
        })
    }
}

pub fn normalize_place(place: &str) -> String {
    place.trim().to_lowercase()
}

pub fn round_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).round() * step
}

/// Deterministic pseudo-random distance seeded by the place-name pair, so
/// quotes stay stable across calls even without a routing provider.
pub fn fallback_distance_km(source: &str, destination: &str) -> f64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    destination.hash(&mut hasher);

    let mut rng = StdRng::seed_from_u64(hasher.finish());
    rng.gen_range(50.0..500.0)
}

/// A caller-supplied price is accepted only at or below the fare cap; a
/// missing or zero price defaults to the cap.
pub fn validate_price(requested: Option<f64>, max_fare: f64) -> AppResult<f64> {
    match requested {
        Some(price) if price > max_fare => Err(AppError::PriceExceedsFareCap(format!(
            "Price {:.2} exceeds the maximum fare of {:.2} for this route",
            price, max_fare
        ))),
        Some(price) if price > 0.0 => Ok(price),
        _ => Ok(max_fare),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_step() {
        assert_eq!(round_to_step(123.0, 10.0), 120.0);
        assert_eq!(round_to_step(125.0, 10.0), 130.0);
        assert_eq!(round_to_step(99.9, 0.0), 99.9);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = fallback_distance_km("chennai", "bangalore");
        let b = fallback_distance_km("chennai", "bangalore");
        assert_eq!(a, b);
        assert!((50.0..500.0).contains(&a));

        // Direction matters: the pair hash is ordered
        let reverse = fallback_distance_km("bangalore", "chennai");
        assert!((50.0..500.0).contains(&reverse));
    }

    #[test]
    fn test_max_fare_monotonic_in_distance() {
        let engine_cfg = FareConfig::default();
        let fare = |km: f64| {
            round_to_step(
                engine_cfg.base_fare + km * engine_cfg.rate_per_km,
                engine_cfg.round_step,
            )
        };

        let mut last = 0.0;
        for km in [10.0, 50.0, 120.0, 300.0, 499.0] {
            let f = fare(km);
            assert!(f >= last);
            last = f;
        }
    }

    #[test]
    fn test_validate_price_against_cap() {
        assert_eq!(validate_price(Some(200.0), 300.0).unwrap(), 200.0);
        assert_eq!(validate_price(Some(300.0), 300.0).unwrap(), 300.0);
        assert_eq!(validate_price(None, 300.0).unwrap(), 300.0);
        assert_eq!(validate_price(Some(0.0), 300.0).unwrap(), 300.0);

        let err = validate_price(Some(301.0), 300.0).unwrap_err();
        assert!(matches!(err, AppError::PriceExceedsFareCap(_)));
    }
}
