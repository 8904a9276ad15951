//! Station lookup by great-circle distance.

use crate::models::WeatherStation;

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance between two coordinates in miles
pub fn haversine_miles(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());

    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * a.sqrt().asin()
}

/// Closest station to `(lat, lng)`; ties keep the first station given
pub fn nearest_station(lat_lng: (f64, f64), stations: &[WeatherStation]) -> Option<&WeatherStation> {
    stations
        .iter()
        .map(|s| (haversine_miles(lat_lng, (s.latitude, s.longitude)), s))
        .fold(None, |best: Option<(f64, &WeatherStation)>, (distance, station)| match best {
            Some((best_distance, _)) if best_distance <= distance => best,
            _ => Some((distance, station)),
        })
        .map(|(_, station)| station)
}
