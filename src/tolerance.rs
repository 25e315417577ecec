use serde::{Deserialize, Serialize};

/// Absolute tolerance used by every fuzzy comparison in the solver.
pub const EPSILON: f64 = 1e-7;

/// The one definition of "equal enough".
///
/// The preprocessor, both simplex phases and [`Constraint::is_satisfied`]
/// all compare through these methods so a borderline value is classified the
/// same way everywhere.
///
/// [`Constraint::is_satisfied`]: crate::model::Constraint::is_satisfied
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tolerance(f64);

impl Default for Tolerance {
    fn default() -> Self {
        Self(EPSILON)
    }
}

impl Tolerance {
    pub fn new(epsilon: f64) -> Self {
        assert!(
            epsilon.is_finite() && epsilon >= 0.0,
            "tolerance must be finite and non-negative; epsilon={}",
            epsilon
        );
        Self(epsilon)
    }

    pub fn epsilon(&self) -> f64 {
        self.0
    }

    pub fn nearly_zero(&self, x: f64) -> bool {
        x.abs() < self.0
    }

    pub fn nearly_eq(&self, x: f64, y: f64) -> bool {
        self.nearly_zero(x - y)
    }

    /// `x >= y`, or close enough to it.
    pub fn nearly_ge(&self, x: f64, y: f64) -> bool {
        x > y || self.nearly_eq(x, y)
    }

    /// `x <= y`, or close enough to it.
    pub fn nearly_le(&self, x: f64, y: f64) -> bool {
        x < y || self.nearly_eq(x, y)
    }

    /// Meaningfully below zero.
    pub fn is_negative(&self, x: f64) -> bool {
        x <= -self.0
    }

    /// Meaningfully above zero.
    pub fn is_positive(&self, x: f64) -> bool {
        x >= self.0
    }

    /// Snap values that are zero up to rounding noise to exactly zero.
    pub(crate) fn clean(&self, x: f64) -> f64 {
        if self.nearly_zero(x) {
            0.0
        } else {
            x
        }
    }
}
