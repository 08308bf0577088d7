//! GeoJSON Route Simulation
//!
//! Replays a recorded or drawn track one waypoint per poll, deriving speed
//! and heading from the next waypoint. Loops back to the start at the end.

use crate::{GpsError, PositionSample};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Mean Earth radius (m)
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in metres
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial bearing from point 1 to point 2, degrees in [0, 360)
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Waypoint player over a GeoJSON LineString
#[derive(Debug, Clone)]
pub struct RouteSimulator {
    /// (latitude, longitude) pairs
    waypoints: Vec<(f64, f64)>,
    /// Index of the next waypoint to emit
    cursor: usize,
    /// Time between emitted waypoints
    step: Duration,
}

impl RouteSimulator {
    /// Build a simulator from waypoints; `step` is the expected poll interval
    pub fn new(waypoints: Vec<(f64, f64)>, step: Duration) -> Result<Self, GpsError> {
        if waypoints.is_empty() {
            return Err(GpsError::Route("route has no coordinates".to_string()));
        }
        Ok(Self {
            waypoints,
            cursor: 0,
            step,
        })
    }

    /// Load a GeoJSON file
    pub fn load(path: impl AsRef<Path>, step: Duration) -> Result<Self, GpsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let geojson: Value = serde_json::from_str(&text)?;
        let waypoints = extract_line_strings(&geojson);
        info!("Loaded {} waypoints from {}", waypoints.len(), path.display());
        Self::new(waypoints, step)
    }

    /// Number of waypoints in the route
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Emit the next waypoint
    pub fn next_sample(&mut self) -> PositionSample {
        let (lat, lon) = self.waypoints[self.cursor];
        let next = self.waypoints.get(self.cursor + 1).copied();

        let mut sample = PositionSample::at(lat, lon);
        if let Some((next_lat, next_lon)) = next {
            let secs = self.step.as_secs_f64().max(f64::EPSILON);
            sample.heading = Some(bearing_deg(lat, lon, next_lat, next_lon));
            sample.speed = Some(haversine_m(lat, lon, next_lat, next_lon) / secs);
        }

        self.cursor = if next.is_some() { self.cursor + 1 } else { 0 };
        sample
    }
}

/// Collect `[lon, lat]` positions from every LineString in a GeoJSON value
fn extract_line_strings(geojson: &Value) -> Vec<(f64, f64)> {
    match geojson.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => geojson
            .get("features")
            .and_then(Value::as_array)
            .map(|features| features.iter().flat_map(extract_line_strings).collect())
            .unwrap_or_default(),
        Some("Feature") => geojson
            .get("geometry")
            .map(extract_line_strings)
            .unwrap_or_default(),
        Some("LineString") => geojson
            .get("coordinates")
            .and_then(Value::as_array)
            .map(|coords| {
                coords
                    .iter()
                    .filter_map(|pair| {
                        let lon = pair.get(0)?.as_f64()?;
                        let lat = pair.get(1)?.as_f64()?;
                        Some((lat, lon))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
