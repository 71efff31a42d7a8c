//! Geometry helpers for route storage and corridor matching.
//!
//! Route paths travel as Google-encoded polylines (precision 1e-5) and are
//! decoded to (lat, lng) pairs for matching. Corridor checks work in a
//! local equirectangular projection, which is accurate enough at the
//! 5-20 km buffer scales used here.

const EARTH_RADIUS_KM: f64 = 6371.0;
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Calculate distance between two coordinates using Haversine formula
/// Returns distance in kilometers
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Total length of a path in meters.
pub fn path_length_m(path: &[(f64, f64)]) -> f64 {
    path.windows(2)
        .map(|w| haversine_distance(w[0].0, w[0].1, w[1].0, w[1].1) * 1000.0)
        .sum()
}

/// Closest approach of a path to a point.
pub struct PathProjection {
    /// Distance from the point to the path, meters.
    pub distance_m: f64,
    /// Cumulative distance along the path of the closest approach, meters.
    pub along_m: f64,
}

/// Project `point` onto the path, returning the minimum distance and the
/// position of the closest approach measured along the path. `None` for
/// paths with fewer than two points.
pub fn project_onto_path(path: &[(f64, f64)], point: (f64, f64)) -> Option<PathProjection> {
    if path.len() < 2 {
        return None;
    }

    let cos_lat = point.0.to_radians().cos();
    let xy = |p: (f64, f64)| -> (f64, f64) {
        (p.1 * METERS_PER_DEG_LAT * cos_lat, p.0 * METERS_PER_DEG_LAT)
    };

    let (px, py) = xy(point);
    let mut best: Option<PathProjection> = None;
    let mut walked = 0.0;

    for w in path.windows(2) {
        let (ax, ay) = xy(w[0]);
        let (bx, by) = xy(w[1]);
        let seg_len_m = haversine_distance(w[0].0, w[0].1, w[1].0, w[1].1) * 1000.0;

        let (dist, t) = point_to_segment((px, py), (ax, ay), (bx, by));
        let along = walked + t * seg_len_m;

        if best.as_ref().is_none_or(|b| dist < b.distance_m) {
            best = Some(PathProjection {
                distance_m: dist,
                along_m: along,
            });
        }

        walked += seg_len_m;
    }

    best
}

/// Distance from a point to a segment in the projected plane, plus the
/// clamped parameter t of the foot point.
fn point_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    let (px, py) = p;
    let (ax, ay) = a;
    let (bx, by) = b;
    let (dx, dy) = (bx - ax, by - ay);

    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };

    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (((px - cx).powi(2) + (py - cy).powi(2)).sqrt(), t)
}

/// Corridor half-width for a route of the given length: 10% of the route,
/// clamped to [5 km, 20 km].
pub fn corridor_buffer_m(route_distance_m: f64) -> f64 {
    (0.10 * route_distance_m).clamp(5_000.0, 20_000.0)
}

// ---- Google polyline codec (precision 1e-5) ----

pub fn encode_polyline(points: &[(f64, f64)]) -> String {
    let mut out = String::new();
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

    for &(lat, lng) in points {
        let lat_e5 = (lat * 1e5).round() as i64;
        let lng_e5 = (lng * 1e5).round() as i64;
        encode_value(lat_e5 - prev_lat, &mut out);
        encode_value(lng_e5 - prev_lng, &mut out);
        prev_lat = lat_e5;
        prev_lng = lng_e5;
    }

    out
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = (if value < 0 { !(value << 1) } else { value << 1 }) as u64;
    while v >= 0x20 {
        out.push(((0x20 | (v & 0x1f)) as u8 + 63) as char);
        v >>= 5;
    }
    out.push((v as u8 + 63) as char);
}

/// Decode an encoded polyline into (lat, lng) pairs. `None` on malformed
/// input (truncated chunk or out-of-range byte).
pub fn decode_polyline(encoded: &str) -> Option<Vec<(f64, f64)>> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut i = 0usize;
    let (mut lat, mut lng) = (0i64, 0i64);

    while i < bytes.len() {
        let (dlat, next) = decode_value(bytes, i)?;
        let (dlng, next) = decode_value(bytes, next)?;
        i = next;
        lat += dlat;
        lng += dlng;
        points.push((lat as f64 / 1e5, lng as f64 / 1e5));
    }

    Some(points)
}

fn decode_value(bytes: &[u8], mut i: usize) -> Option<(i64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0u32;

    loop {
        let b = bytes.get(i)?.checked_sub(63)? as u64;
        result |= (b & 0x1f) << shift;
        shift += 5;
        i += 1;
        if b < 0x20 {
            break;
        }
    }

    let value = if result & 1 != 0 {
        !((result >> 1) as i64)
    } else {
        (result >> 1) as i64
    };
    Some((value, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_chennai_bangalore() {
        let chennai = (13.0827, 80.2707);
        let bangalore = (12.9716, 77.5946);

        let distance = haversine_distance(chennai.0, chennai.1, bangalore.0, bangalore.1);
        // Great-circle distance is roughly 290 km
        assert!(distance > 270.0 && distance < 310.0);
    }

    #[test]
    fn test_polyline_known_vector() {
        // Reference vector from the polyline format documentation
        let points = vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        let encoded = encode_polyline(&points);
        assert_eq!(encoded, "_p~iF~ps|U_ulLnnqC_mqNvxq`@");

        let decoded = decode_polyline(&encoded).unwrap();
        assert_eq!(decoded.len(), 3);
        for (d, p) in decoded.iter().zip(points.iter()) {
            assert!((d.0 - p.0).abs() < 1e-5);
            assert!((d.1 - p.1).abs() < 1e-5);
        }
    }

    #[test]
    fn test_polyline_rejects_garbage() {
        // A dangling continuation bit must not decode
        assert!(decode_polyline("_").is_none());
        assert!(decode_polyline("\u{1}").is_none());
    }

    #[test]
    fn test_projection_on_straight_path() {
        // Path due east along the equator for ~111 km
        let path = vec![(0.0, 0.0), (0.0, 1.0)];

        let proj = project_onto_path(&path, (0.1, 0.5)).unwrap();
        // ~11 km off the line, about halfway along it
        assert!((proj.distance_m - 11_132.0).abs() < 300.0);
        let total = path_length_m(&path);
        assert!((proj.along_m - total / 2.0).abs() < 1_000.0);
    }

    #[test]
    fn test_projection_orders_points_along_path() {
        let path = vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)];

        let early = project_onto_path(&path, (0.01, 0.3)).unwrap();
        let late = project_onto_path(&path, (0.01, 1.7)).unwrap();
        assert!(early.along_m < late.along_m);
    }

    #[test]
    fn test_corridor_buffer_clamps() {
        assert_eq!(corridor_buffer_m(10_000.0), 5_000.0);
        assert_eq!(corridor_buffer_m(100_000.0), 10_000.0);
        assert_eq!(corridor_buffer_m(1_000_000.0), 20_000.0);
    }
}
