//! Distance oracles.
//!
//! A distance oracle maps an ordered pair of coordinates to a non-negative
//! travel cost. The instance evaluates its oracle once into a dense matrix, so
//! one metric is used for the whole lifetime of an instance.

use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Pluggable cost function between two coordinate pairs.
pub trait DistanceOracle {
    fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> DistanceOracle for F
where
    F: Fn((f64, f64), (f64, f64)) -> f64,
{
    fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        self(a, b)
    }
}

/// Built-in metrics
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Great-circle distance in km; coordinates are (latitude, longitude) in degrees
    Haversine,
    /// Planar Euclidean distance
    Euclidean,
}

impl Metric {
    /// Pick the metric matching a TSPLIB `EDGE_WEIGHT_TYPE` value.
    pub fn from_edge_weight_type(kind: &str) -> Self {
        match kind.trim().to_ascii_uppercase().as_str() {
            "GEO" | "HAVERSINE" | "GEOM" => Metric::Haversine,
            _ => Metric::Euclidean,
        }
    }
}

impl DistanceOracle for Metric {
    fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        match self {
            Metric::Haversine => haversine(a, b),
            Metric::Euclidean => euclidean(a, b),
        }
    }

    fn name(&self) -> &str {
        match self {
            Metric::Haversine => "haversine",
            Metric::Euclidean => "euclidean",
        }
    }
}

/// Great-circle distance between two (lat, lon) points given in degrees.
pub fn haversine(a: (f64, f64), b: (f64, f64)) -> f64 {
    if a == b {
        return 0.0;
    }
    let (phi1, phi2) = (a.0.to_radians(), b.0.to_radians());
    let dphi = (b.0 - a.0).to_radians();
    let dlambda = (b.1 - a.1).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    // clamp guards asin against rounding just above 1.0
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
