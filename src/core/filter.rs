//! Smoothing and publish filters shared by both estimators
//!
//! Detector output jitters frame to frame. Values go through a moving
//! average, then a `Debounced` gate that only publishes real changes.

use crate::types::Point;

/// Equality within a tolerance
pub trait NearEq {
    fn near_eq(&self, other: &Self, epsilon: f64) -> bool;
}

impl NearEq for bool {
    fn near_eq(&self, other: &Self, _epsilon: f64) -> bool {
        self == other
    }
}

impl NearEq for f64 {
    fn near_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self - other).abs() <= epsilon
    }
}

impl NearEq for Point {
    fn near_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.distance(other) <= epsilon
    }
}

impl<T: NearEq> NearEq for Option<T> {
    fn near_eq(&self, other: &Self, epsilon: f64) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.near_eq(b, epsilon),
            _ => false,
        }
    }
}

/// Publishes a value only when it differs from the last published one
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    published: Option<T>,
    epsilon: f64,
}

impl<T: NearEq + Copy> Debounced<T> {
    /// Gate with a change threshold
    pub fn new(epsilon: f64) -> Self {
        Self { published: None, epsilon }
    }

    /// Gate that publishes on any change (flags)
    pub fn exact() -> Self {
        Self::new(0.0)
    }

    /// Offer a value; returns true if it was published
    pub fn offer(&mut self, next: T) -> bool {
        match &self.published {
            Some(current) if current.near_eq(&next, self.epsilon) => false,
            _ => {
                self.published = Some(next);
                true
            }
        }
    }

    /// Last published value
    pub fn get(&self) -> Option<T> {
        self.published
    }

    pub fn reset(&mut self) {
        self.published = None;
    }
}

/// Exponential moving average over points
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    state: Option<Point>,
}

impl Ema {
    pub fn new(alpha: f64) -> Self {
        Self { alpha: alpha.clamp(f64::EPSILON, 1.0), state: None }
    }

    pub fn update(&mut self, p: Point) -> Point {
        let next = match self.state {
            None => p,
            Some(prev) => Point::new(
                prev.x + self.alpha * (p.x - prev.x),
                prev.y + self.alpha * (p.y - prev.y),
            ),
        };
        self.state = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Two cascaded moving averages
#[derive(Debug, Clone)]
pub struct PointSmoother {
    passes: [Ema; 2],
}

impl PointSmoother {
    pub fn new(alpha: f64) -> Self {
        Self { passes: [Ema::new(alpha), Ema::new(alpha)] }
    }

    pub fn update(&mut self, p: Point) -> Point {
        let first = self.passes[0].update(p);
        self.passes[1].update(first)
    }

    pub fn reset(&mut self) {
        for pass in &mut self.passes {
            pass.reset();
        }
    }
}
