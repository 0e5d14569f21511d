//! Tracking sample structures

use serde::{Deserialize, Serialize};

/// Normalized 2D point, both axes in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const CENTER: Point = Point { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Clamp both axes into the unit square
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

/// One detector landmark. `z` is carried but unused by the core.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Per-frame estimator output. Consumed immediately, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingSample {
    pub detected: bool,
    #[serde(default)]
    pub point: Option<Point>,
    #[serde(default)]
    pub looking: Option<bool>,
}

impl TrackingSample {
    /// Nothing detected
    pub fn absent() -> Self {
        Self::default()
    }

    /// Face detected at `point`, with a looking verdict
    pub fn face(point: Point, looking: bool) -> Self {
        Self {
            detected: true,
            point: Some(point),
            looking: Some(looking),
        }
    }

    /// Hand detected with its centroid at `point`
    pub fn hand(point: Point) -> Self {
        Self {
            detected: true,
            point: Some(point),
            looking: None,
        }
    }

    /// Detected and looking at the screen
    pub fn is_centered(&self) -> bool {
        self.detected && self.looking.unwrap_or(false)
    }
}
