/*
 * src/query/geospatial.rs
 *
 * File for the Geospatial Filter
 *
 * Purpose:
 *   Great-circle distance computed directly in SQL; the catalog's only
 *   geospatial needs are a distance annotation and a radius predicate, which
 *   the haversine formula covers without a PostGIS binding.
 */

pub const EARTH_RADIUS_KM: f64 = 6371.0088;
pub const KM_PER_MILE: f64 = 1.609344;

/// A SQL expression computing great-circle distance in kilometers between
/// `meetings.latitude/longitude` and a fixed query point, using the
/// haversine formula. `lat`/`lon` are inlined as literals — they are parsed
/// f64 query parameters, never user-controlled text, so this carries no
/// injection risk and avoids juggling bind-parameter indices across a query
/// built incrementally by `sqlx::QueryBuilder`.
pub fn haversine_km_expr(lat: f64, lon: f64) -> String {
    format!(
        "(2 * {radius} * asin(sqrt(\
            power(sin(radians((m.latitude - {lat}) / 2)), 2) + \
            cos(radians({lat})) * cos(radians(m.latitude)) * \
            power(sin(radians((m.longitude - {lon}) / 2)), 2) \
        )))",
        radius = EARTH_RADIUS_KM,
    )
}

pub fn km_to_miles(km: f64) -> f64 {
    km / KM_PER_MILE
}

pub fn miles_to_km(miles: f64) -> f64 {
    miles * KM_PER_MILE
}

#[derive(Debug, Clone, Copy)]
pub enum GeoMode {
    /// Positive width: radius search, in kilometers.
    RadiusKm(f64),
    /// Negative width: nearest |N| results.
    NearestN(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct GeoQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub mode: GeoMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_inlines_the_query_point() {
        let expr = haversine_km_expr(21.33, -157.7);
        assert!(expr.contains("21.33"));
        assert!(expr.contains("-157.7"));
    }

    #[test]
    fn mile_km_conversion_round_trips() {
        let km = miles_to_km(1.0);
        assert!((km_to_miles(km) - 1.0).abs() < 1e-9);
    }
}
