use crate::problem::Relation;

/// Numeric tolerance policy shared by every comparison in the solver.
///
/// A comparison between quantities of magnitude `m` is allowed a slack of
/// `absolute + relative * m`. Determinants are compared against
/// `determinant * scale`, where `scale` is the product of the row magnitudes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Absolute slack
    pub absolute: f64,
    /// Slack per unit of magnitude of the compared quantities
    pub relative: f64,
    /// Relative threshold below which two boundary lines count as parallel
    pub determinant: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: 1e-9,
            relative: 1e-9,
            determinant: 1e-9,
        }
    }
}

impl Tolerance {
    pub fn new(absolute: f64, relative: f64) -> Self {
        Self {
            absolute,
            relative,
            ..Self::default()
        }
    }

    pub fn with_determinant(mut self, determinant: f64) -> Self {
        self.determinant = determinant;
        self
    }

    /// Allowed slack when comparing quantities of the given magnitude.
    #[inline]
    pub fn slack(&self, magnitude: f64) -> f64 {
        self.absolute + self.relative * magnitude.abs()
    }

    /// Closed comparison `lhs <relation> rhs`, within the slack for `magnitude`.
    ///
    /// Every relation and equality check in the solver goes through here.
    #[inline]
    pub fn holds(&self, lhs: f64, relation: Relation, rhs: f64, magnitude: f64) -> bool {
        let diff = lhs - rhs;
        let slack = self.slack(magnitude);
        match relation {
            Relation::LessOrEqual => diff <= slack,
            Relation::GreaterOrEqual => diff >= -slack,
            Relation::Equal => diff.abs() <= slack,
        }
    }

    #[inline]
    pub fn approx_eq(&self, a: f64, b: f64) -> bool {
        self.holds(a, Relation::Equal, b, a.abs().max(b.abs()))
    }

    #[inline]
    pub fn is_zero(&self, value: f64) -> bool {
        self.holds(value, Relation::Equal, 0.0, 0.0)
    }

    /// Whether a 2×2 determinant is too small to divide by.
    #[inline]
    pub fn is_singular(&self, det: f64, scale: f64) -> bool {
        det.abs() <= self.determinant * scale
    }
}
