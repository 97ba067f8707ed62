use std::fmt;
use std::str::FromStr;

use nalgebra::Vector2;
use thiserror::Error;

use crate::tolerance::Tolerance;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DegenerateInputError {
    #[error("Constraint '{0}' has no variable terms (a = b = 0)")]
    ZeroCoefficients(String),
    #[error("Constraint '{0}' has a non-finite coefficient")]
    NonFinite(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown objective sense '{0}': expected max or min")]
pub struct UnknownSense(pub String);

/// Relation between the left-hand side `a·x + b·y` and the constant `c`.
///
/// Strict operators are folded into their closed counterparts by the parser.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Less than or equal (<=)
    LessOrEqual,
    /// Greater than or equal (>=)
    GreaterOrEqual,
    /// Equal (=)
    Equal,
}

impl Relation {
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::LessOrEqual => "<=",
            Relation::GreaterOrEqual => ">=",
            Relation::Equal => "=",
        }
    }

    /// The relation after multiplying both sides by a negative number.
    pub fn flipped(self) -> Self {
        match self {
            Relation::LessOrEqual => Relation::GreaterOrEqual,
            Relation::GreaterOrEqual => Relation::LessOrEqual,
            Relation::Equal => Relation::Equal,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A closed linear constraint `a·x + b·y <relation> c`.
///
/// Built through [`LinearConstraint::new`] (deserialization included), so
/// the coefficients are always finite and not both zero.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawConstraint"))]
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    /// Coefficient of x
    pub(crate) a: f64,
    /// Coefficient of y
    pub(crate) b: f64,
    /// Right-hand side constant
    pub(crate) c: f64,
    pub(crate) relation: Relation,
    /// Text the constraint was written as (for labels and explanations)
    pub(crate) source: String,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawConstraint {
    a: f64,
    b: f64,
    c: f64,
    relation: Relation,
    source: String,
}

#[cfg(feature = "serde")]
impl TryFrom<RawConstraint> for LinearConstraint {
    type Error = DegenerateInputError;

    fn try_from(raw: RawConstraint) -> Result<Self, Self::Error> {
        LinearConstraint::new(raw.a, raw.b, raw.relation, raw.c, raw.source)
    }
}

impl LinearConstraint {
    pub fn new(
        a: f64,
        b: f64,
        relation: Relation,
        c: f64,
        source: impl Into<String>,
    ) -> Result<Self, DegenerateInputError> {
        let source = source.into();
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(DegenerateInputError::NonFinite(source));
        }
        let tol = Tolerance::default();
        if tol.is_zero(a) && tol.is_zero(b) {
            return Err(DegenerateInputError::ZeroCoefficients(source));
        }
        Ok(Self {
            a,
            b,
            c,
            relation,
            source,
        })
    }

    #[inline]
    pub fn a(&self) -> f64 {
        self.a
    }

    #[inline]
    pub fn b(&self) -> f64 {
        self.b
    }

    #[inline]
    pub fn c(&self) -> f64 {
        self.c
    }

    #[inline]
    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// `x >= 0`
    pub fn x_nonnegative() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            relation: Relation::GreaterOrEqual,
            source: "x >= 0".to_string(),
        }
    }

    /// `y >= 0`
    pub fn y_nonnegative() -> Self {
        Self {
            a: 0.0,
            b: 1.0,
            c: 0.0,
            relation: Relation::GreaterOrEqual,
            source: "y >= 0".to_string(),
        }
    }

    #[inline]
    pub fn normal(&self) -> Vector2<f64> {
        Vector2::new(self.a, self.b)
    }

    #[inline]
    pub fn lhs(&self, p: Vector2<f64>) -> f64 {
        self.a * p.x + self.b * p.y
    }

    fn magnitude_at(&self, p: Vector2<f64>) -> f64 {
        (self.a * p.x).abs() + (self.b * p.y).abs() + self.c.abs()
    }

    /// Closed-region membership of `p`, within tolerance.
    pub fn is_satisfied_by(&self, p: Vector2<f64>, tol: &Tolerance) -> bool {
        tol.holds(self.lhs(p), self.relation, self.c, self.magnitude_at(p))
    }

    /// Whether `p` lies on the boundary line, within tolerance.
    pub fn is_tight_at(&self, p: Vector2<f64>, tol: &Tolerance) -> bool {
        tol.holds(self.lhs(p), Relation::Equal, self.c, self.magnitude_at(p))
    }

    /// Point of the boundary line closest to the origin.
    pub fn boundary_point(&self) -> Vector2<f64> {
        let n = self.normal();
        n * (self.c / n.norm_squared())
    }

    /// Unit outward normals: pointing away from the feasible side.
    ///
    /// An equality has two, one for each side of its line.
    pub fn outward_normals(&self) -> Vec<Vector2<f64>> {
        let n = self.normal().normalize();
        match self.relation {
            Relation::LessOrEqual => vec![n],
            Relation::GreaterOrEqual => vec![-n],
            Relation::Equal => vec![n, -n],
        }
    }

    /// Unit normal, constant and relation, with `>=` rewritten as `<=` and
    /// equalities signed so their first non-zero coefficient is positive.
    fn canonical(&self, tol: &Tolerance) -> (Vector2<f64>, f64, Relation) {
        let norm = self.normal().norm();
        let n = self.normal() / norm;
        let c = self.c / norm;
        match self.relation {
            Relation::LessOrEqual => (n, c, Relation::LessOrEqual),
            Relation::GreaterOrEqual => (-n, -c, Relation::LessOrEqual),
            Relation::Equal => {
                if n.x < -tol.absolute || (tol.is_zero(n.x) && n.y < 0.0) {
                    (-n, -c, Relation::Equal)
                } else {
                    (n, c, Relation::Equal)
                }
            }
        }
    }

    /// Whether both constraints describe the same closed set.
    pub fn is_equivalent(&self, other: &LinearConstraint, tol: &Tolerance) -> bool {
        let (n1, c1, r1) = self.canonical(tol);
        let (n2, c2, r2) = other.canonical(tol);
        r1 == r2 && tol.approx_eq(n1.x, n2.x) && tol.approx_eq(n1.y, n2.y) && tol.approx_eq(c1, c2)
    }

    /// Feasible interval of `t = u·p` for a unit direction `u` parallel to the normal.
    pub(crate) fn interval_along(&self, u: Vector2<f64>) -> (f64, f64) {
        let n = self.normal();
        let scale = n.dot(&u);
        let bound = self.c / scale;
        let relation = if scale < 0.0 {
            self.relation.flipped()
        } else {
            self.relation
        };
        match relation {
            Relation::LessOrEqual => (f64::NEG_INFINITY, bound),
            Relation::GreaterOrEqual => (bound, f64::INFINITY),
            Relation::Equal => (bound, bound),
        }
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Ordered, immutable set of constraints over `x` and `y`.
///
/// Explicit constraints keep their input order and indices. The implicit
/// `x >= 0` and `y >= 0` bounds, when present, come after them.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    constraints: Vec<LinearConstraint>,
    explicit: usize,
}

impl ConstraintSet {
    /// Build a set with the default non-negativity bounds.
    pub fn new(constraints: Vec<LinearConstraint>) -> Self {
        Self::with_nonnegativity(constraints, true)
    }

    pub fn with_nonnegativity(mut constraints: Vec<LinearConstraint>, assume_nonnegative: bool) -> Self {
        let explicit = constraints.len();
        if assume_nonnegative {
            let tol = Tolerance::default();
            for bound in [LinearConstraint::x_nonnegative(), LinearConstraint::y_nonnegative()] {
                let present = constraints[..explicit]
                    .iter()
                    .any(|c| c.is_equivalent(&bound, &tol));
                if !present {
                    constraints.push(bound);
                }
            }
        }
        Self {
            constraints,
            explicit,
        }
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn get(&self, index: usize) -> Option<&LinearConstraint> {
        self.constraints.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LinearConstraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Number of constraints supplied by the caller.
    pub fn explicit_len(&self) -> usize {
        self.explicit
    }

    /// Whether the constraint at `index` was added as a default bound.
    pub fn is_implicit(&self, index: usize) -> bool {
        index >= self.explicit && index < self.constraints.len()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

impl FromStr for Sense {
    type Err = UnknownSense;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" | "maximize" | "maximise" => Ok(Sense::Maximize),
            "min" | "minimize" | "minimise" => Ok(Sense::Minimize),
            _ => Err(UnknownSense(s.to_string())),
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Maximize => f.write_str("max"),
            Sense::Minimize => f.write_str("min"),
        }
    }
}

/// Linear objective `p·x + q·y + offset`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveFunction {
    /// Coefficient of x
    pub p: f64,
    /// Coefficient of y
    pub q: f64,
    /// Constant term, added to every value
    pub offset: f64,
    pub sense: Sense,
}

impl ObjectiveFunction {
    pub fn new(p: f64, q: f64, sense: Sense) -> Self {
        Self {
            p,
            q,
            offset: 0.0,
            sense,
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    #[inline]
    pub fn gradient(&self) -> Vector2<f64> {
        Vector2::new(self.p, self.q)
    }

    #[inline]
    pub fn value_at(&self, p: Vector2<f64>) -> f64 {
        self.p * p.x + self.q * p.y + self.offset
    }
}
