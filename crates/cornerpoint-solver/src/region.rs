//! Feasible region of a two-variable constraint set by the corner-point method.
//!
//! Every pair of boundary lines is intersected, candidates outside any
//! constraint are dropped, coincident corners are merged, and the survivors
//! are ordered counter-clockwise. Boundedness is decided exactly from the
//! outward normals rather than by probing far-away points.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;
use tracing::debug;

use crate::problem::{ConstraintSet, LinearConstraint, Relation};
use crate::tolerance::Tolerance;

/// Upper bound on caller-supplied constraints; keeps the pairwise pass small.
pub const DEFAULT_MAX_CONSTRAINTS: usize = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Too many constraints: {count} given, at most {limit} allowed")]
    TooManyConstraints { count: usize, limit: usize },
}

/// A feasible point where boundary lines meet.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    /// Indices (into the constraint set) of constraints tight here, ascending
    pub tight: Vec<usize>,
    /// More than two constraints are tight at this corner
    pub degenerate: bool,
}

impl Vertex {
    fn new(p: Vector2<f64>, tight: BTreeSet<usize>) -> Self {
        let degenerate = tight.len() > 2;
        // + 0.0 turns -0.0 into 0.0
        Self {
            x: p.x + 0.0,
            y: p.y + 0.0,
            tight: tight.into_iter().collect(),
            degenerate,
        }
    }

    #[inline]
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    fn merge_tight(&mut self, tight: BTreeSet<usize>) {
        let mut all: BTreeSet<usize> = self.tight.iter().copied().collect();
        all.extend(tight);
        self.degenerate = all.len() > 2;
        self.tight = all.into_iter().collect();
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStatus {
    /// Non-empty and enclosed by a finite polygon
    Bounded,
    /// Non-empty and extends to infinity in at least one direction
    Unbounded,
    /// No point satisfies every constraint
    Infeasible,
}

/// Two or three constraints that cannot hold together, although any fewer
/// of them can.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Indices into the constraint set, ascending
    pub constraints: Vec<usize>,
}

impl Conflict {
    pub fn new(mut constraints: Vec<usize>) -> Self {
        constraints.sort_unstable();
        Self { constraints }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibleRegion {
    pub status: RegionStatus,
    /// Corner points in counter-clockwise order around their centroid
    pub vertices: Vec<Vertex>,
    /// Unit directions generating the recession cone; empty when bounded
    pub open_directions: Vec<Vector2<f64>>,
    /// Feasible sample points, only for a non-empty region without corners
    pub witnesses: Vec<Vertex>,
    /// Directly contradictory pairs; only filled when infeasible
    pub conflicts: Vec<Conflict>,
}

impl FeasibleRegion {
    pub fn is_feasible(&self) -> bool {
        self.status != RegionStatus::Infeasible
    }

    pub fn is_bounded(&self) -> bool {
        self.status == RegionStatus::Bounded
    }

    pub fn degenerate_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter().filter(|v| v.degenerate)
    }

    /// Corners, or witnesses when the region has no corner at all.
    pub fn candidates(&self) -> &[Vertex] {
        if self.vertices.is_empty() {
            &self.witnesses
        } else {
            &self.vertices
        }
    }
}

/// Corner-point solver for two-variable constraint sets.
#[derive(Debug, Clone)]
pub struct RegionSolver {
    tolerance: Tolerance,
    max_constraints: usize,
}

impl Default for RegionSolver {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            max_constraints: DEFAULT_MAX_CONSTRAINTS,
        }
    }
}

impl RegionSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_constraints(mut self, max: usize) -> Self {
        self.max_constraints = max;
        self
    }

    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    pub fn max_constraints(&self) -> usize {
        self.max_constraints
    }

    pub fn check_size(&self, count: usize) -> Result<(), SolverError> {
        if count > self.max_constraints {
            return Err(SolverError::TooManyConstraints {
                count,
                limit: self.max_constraints,
            });
        }
        Ok(())
    }

    /// Compute the feasible region of `set`.
    pub fn solve(&self, set: &ConstraintSet) -> Result<FeasibleRegion, SolverError> {
        self.check_size(set.explicit_len())?;
        let constraints = set.constraints();
        let vertices = self.corners(constraints);

        let region = if vertices.is_empty() {
            self.cornerless(constraints)
        } else {
            let open_directions = open_directions(constraints, &self.tolerance);
            let status = if open_directions.is_empty() {
                RegionStatus::Bounded
            } else {
                RegionStatus::Unbounded
            };
            FeasibleRegion {
                status,
                vertices,
                open_directions,
                witnesses: Vec::new(),
                conflicts: Vec::new(),
            }
        };

        debug!(
            constraints = constraints.len(),
            vertices = region.vertices.len(),
            status = ?region.status,
            "feasible region solved"
        );
        Ok(region)
    }

    /// Feasible corners of `constraints`, merged and ordered counter-clockwise.
    pub fn corners(&self, constraints: &[LinearConstraint]) -> Vec<Vertex> {
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut parallel = 0usize;
        let mut rejected = 0usize;

        for i in 0..constraints.len() {
            for j in (i + 1)..constraints.len() {
                let Some(p) = self.intersect(&constraints[i], &constraints[j]) else {
                    parallel += 1;
                    continue;
                };
                if !self.contains(constraints, p) {
                    rejected += 1;
                    continue;
                }
                let tight = self.tight_at(constraints, p);
                match vertices
                    .iter_mut()
                    .find(|v| self.same_point(v.position(), p))
                {
                    Some(existing) => existing.merge_tight(tight),
                    None => vertices.push(Vertex::new(p, tight)),
                }
            }
        }

        debug!(parallel, rejected, merged = vertices.len(), "pairwise intersections");
        order_counter_clockwise(&mut vertices);
        vertices
    }

    /// Solve `a_i x + b_i y = c_i`, `a_j x + b_j y = c_j` by Cramer's rule.
    fn intersect(&self, first: &LinearConstraint, second: &LinearConstraint) -> Option<Vector2<f64>> {
        let det = Matrix2::new(first.a, first.b, second.a, second.b).determinant();
        let scale = first.a.abs().max(first.b.abs()) * second.a.abs().max(second.b.abs());
        if self.tolerance.is_singular(det, scale) {
            return None;
        }
        let x = (first.c * second.b - second.c * first.b) / det;
        let y = (first.a * second.c - second.a * first.c) / det;
        Some(Vector2::new(x, y))
    }

    fn contains(&self, constraints: &[LinearConstraint], p: Vector2<f64>) -> bool {
        constraints
            .iter()
            .all(|c| c.is_satisfied_by(p, &self.tolerance))
    }

    fn tight_at(&self, constraints: &[LinearConstraint], p: Vector2<f64>) -> BTreeSet<usize> {
        constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_tight_at(p, &self.tolerance))
            .map(|(i, _)| i)
            .collect()
    }

    fn same_point(&self, p: Vector2<f64>, q: Vector2<f64>) -> bool {
        self.tolerance.approx_eq(p.x, q.x) && self.tolerance.approx_eq(p.y, q.y)
    }

    /// No corner: either empty, or a half-plane, strip, line or the whole plane.
    ///
    /// Without corners every boundary line is parallel, so probing the origin
    /// and the point of each boundary closest to it is exact.
    fn cornerless(&self, constraints: &[LinearConstraint]) -> FeasibleRegion {
        let probes = std::iter::once(Vector2::zeros())
            .chain(constraints.iter().map(LinearConstraint::boundary_point));

        let mut witnesses: Vec<Vertex> = Vec::new();
        for p in probes {
            if !self.contains(constraints, p) {
                continue;
            }
            if witnesses.iter().any(|w| self.same_point(w.position(), p)) {
                continue;
            }
            witnesses.push(Vertex::new(p, self.tight_at(constraints, p)));
        }

        if witnesses.is_empty() {
            let conflicts = self.conflicts(constraints);
            debug!(conflicts = conflicts.len(), "no feasible point");
            return FeasibleRegion {
                status: RegionStatus::Infeasible,
                vertices: Vec::new(),
                open_directions: Vec::new(),
                witnesses,
                conflicts,
            };
        }

        FeasibleRegion {
            status: RegionStatus::Unbounded,
            vertices: Vec::new(),
            open_directions: open_directions(constraints, &self.tolerance),
            witnesses,
            conflicts: Vec::new(),
        }
    }

    /// Smallest contradictory subsets. Two half-planes only contradict when
    /// parallel; failing that, an infeasible planar set always contains an
    /// infeasible triple.
    fn conflicts(&self, constraints: &[LinearConstraint]) -> Vec<Conflict> {
        let pairs = self.parallel_conflicts(constraints);
        if !pairs.is_empty() {
            return pairs;
        }

        let n = constraints.len();
        let mut out = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                for k in (j + 1)..n {
                    let subset = [&constraints[i], &constraints[j], &constraints[k]];
                    if !self.jointly_feasible(&subset) {
                        out.push(Conflict::new(vec![i, j, k]));
                    }
                }
            }
        }
        out
    }

    /// Pairs of parallel constraints whose feasible sides are disjoint.
    fn parallel_conflicts(&self, constraints: &[LinearConstraint]) -> Vec<Conflict> {
        let tol = &self.tolerance;
        let mut out = Vec::new();
        for i in 0..constraints.len() {
            for j in (i + 1)..constraints.len() {
                let u = constraints[i].normal().normalize();
                let v = constraints[j].normal().normalize();
                let cross = u.x * v.y - u.y * v.x;
                if !tol.is_singular(cross, 1.0) {
                    continue;
                }
                let (lo_i, hi_i) = constraints[i].interval_along(u);
                let (lo_j, hi_j) = constraints[j].interval_along(u);
                let lo = lo_i.max(lo_j);
                let hi = hi_i.min(hi_j);
                let magnitude = if lo.is_finite() && hi.is_finite() {
                    lo.abs().max(hi.abs())
                } else {
                    0.0
                };
                if !tol.holds(lo, Relation::LessOrEqual, hi, magnitude) {
                    out.push(Conflict::new(vec![i, j]));
                }
            }
        }
        out
    }

    /// Whether a handful of constraints share a point.
    ///
    /// A non-empty region either has a corner or only parallel boundaries,
    /// so the pairwise corners plus the cornerless probes decide it.
    fn jointly_feasible(&self, subset: &[&LinearConstraint]) -> bool {
        let mut probes = vec![Vector2::zeros()];
        probes.extend(subset.iter().map(|c| c.boundary_point()));
        for (k, first) in subset.iter().enumerate() {
            for second in &subset[k + 1..] {
                probes.extend(self.intersect(first, second));
            }
        }
        probes
            .into_iter()
            .any(|p| subset.iter().all(|c| c.is_satisfied_by(p, &self.tolerance)))
    }
}

/// Generators of the recession cone `{d : n·d <= 0 for every outward normal n}`.
///
/// Empty exactly when the outward normals positively span the plane, i.e.
/// when the region (if non-empty) is bounded. Returned sorted by angle.
pub fn open_directions(constraints: &[LinearConstraint], tol: &Tolerance) -> Vec<Vector2<f64>> {
    let normals: Vec<Vector2<f64>> = constraints
        .iter()
        .flat_map(LinearConstraint::outward_normals)
        .collect();

    if normals.is_empty() {
        return vec![
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, 0.0),
            Vector2::new(0.0, -1.0),
        ];
    }

    // Extreme rays of a 2D cone lie along some boundary line; a half-plane
    // cone additionally needs its interior direction -n.
    let candidates = normals
        .iter()
        .flat_map(|&n| [Vector2::new(-n.y, n.x), Vector2::new(n.y, -n.x), -n]);

    let mut open: Vec<Vector2<f64>> = Vec::new();
    for d in candidates {
        let recedes = normals
            .iter()
            .all(|n| tol.holds(n.dot(&d), Relation::LessOrEqual, 0.0, 1.0));
        let seen = open
            .iter()
            .any(|o| tol.approx_eq(o.x, d.x) && tol.approx_eq(o.y, d.y));
        if recedes && !seen {
            open.push(d);
        }
    }
    open.sort_by(|a, b| a.y.atan2(a.x).total_cmp(&b.y.atan2(b.x)));
    open
}

/// Sort by angle around the centroid, ties by distance from it.
fn order_counter_clockwise(vertices: &mut [Vertex]) {
    if vertices.len() < 2 {
        return;
    }
    let sum = vertices
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, v| acc + v.position());
    let centroid = sum / vertices.len() as f64;
    vertices.sort_by(|a, b| {
        let da = a.position() - centroid;
        let db = b.position() - centroid;
        match da.y.atan2(da.x).total_cmp(&db.y.atan2(db.x)) {
            Ordering::Equal => da.norm_squared().total_cmp(&db.norm_squared()),
            o => o,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(a: f64, b: f64, relation: Relation, rhs: f64) -> LinearConstraint {
        LinearConstraint::new(a, b, relation, rhs, format!("{a}x + {b}y {relation} {rhs}")).unwrap()
    }

    fn assert_point(v: &Vertex, x: f64, y: f64) {
        assert!(
            (v.x - x).abs() < 1e-9 && (v.y - y).abs() < 1e-9,
            "vertex ({}, {}) expected ({}, {})",
            v.x,
            v.y,
            x,
            y
        );
    }

    fn signed_area(vertices: &[Vertex]) -> f64 {
        let n = vertices.len();
        (0..n)
            .map(|k| {
                let p = &vertices[k];
                let q = &vertices[(k + 1) % n];
                p.x * q.y - q.x * p.y
            })
            .sum::<f64>()
            / 2.0
    }

    #[test]
    fn test_slanted_lines_and_axes() {
        // 2x + 4y <= 80, 3x + 2y <= 60, x, y >= 0
        let set = ConstraintSet::new(vec![
            c(2.0, 4.0, Relation::LessOrEqual, 80.0),
            c(3.0, 2.0, Relation::LessOrEqual, 60.0),
        ]);
        let region = RegionSolver::new().solve(&set).unwrap();

        assert_eq!(region.status, RegionStatus::Bounded);
        assert!(region.open_directions.is_empty());
        assert_eq!(region.vertices.len(), 4);
        assert_point(&region.vertices[0], 0.0, 0.0);
        assert_point(&region.vertices[1], 20.0, 0.0);
        assert_point(&region.vertices[2], 10.0, 15.0);
        assert_point(&region.vertices[3], 0.0, 20.0);
        assert_eq!(region.vertices[2].tight, vec![0, 1]);
        assert!(signed_area(&region.vertices) > 0.0);
        assert!(region.degenerate_vertices().next().is_none());
    }

    #[test]
    fn test_three_lines_through_one_corner_is_degenerate() {
        // 2x + 3y <= 12 and x + 2y <= 8 both pass through (0, 4)
        let set = ConstraintSet::new(vec![
            c(2.0, 3.0, Relation::LessOrEqual, 12.0),
            c(1.0, 2.0, Relation::LessOrEqual, 8.0),
        ]);
        let region = RegionSolver::new().solve(&set).unwrap();

        assert_eq!(region.vertices.len(), 3);
        let top = &region.vertices[2];
        assert_point(top, 0.0, 4.0);
        assert_eq!(top.tight, vec![0, 1, 2]);
        assert!(top.degenerate);
        assert_eq!(region.degenerate_vertices().count(), 1);
    }

    #[test]
    fn test_contradictory_bounds_are_infeasible() {
        let set = ConstraintSet::new(vec![
            c(1.0, 0.0, Relation::LessOrEqual, 1.0),
            c(1.0, 0.0, Relation::GreaterOrEqual, 2.0),
        ]);
        let region = RegionSolver::new().solve(&set).unwrap();

        assert_eq!(region.status, RegionStatus::Infeasible);
        assert!(region.vertices.is_empty());
        assert_eq!(region.conflicts, vec![Conflict::new(vec![0, 1])]);
    }

    #[test]
    fn test_triangle_infeasibility_reports_the_triple() {
        // x + y <= 1 with x >= 1 and y >= 1: only the three together conflict
        let set = ConstraintSet::with_nonnegativity(
            vec![
                c(1.0, 1.0, Relation::LessOrEqual, 1.0),
                c(1.0, 0.0, Relation::GreaterOrEqual, 1.0),
                c(0.0, 1.0, Relation::GreaterOrEqual, 1.0),
            ],
            false,
        );
        let region = RegionSolver::new().solve(&set).unwrap();
        assert_eq!(region.status, RegionStatus::Infeasible);
        assert_eq!(region.conflicts, vec![Conflict::new(vec![0, 1, 2])]);
    }

    #[test]
    fn test_conflict_with_default_bound() {
        // 2x + y <= 4 and x >= 3 only clash once y >= 0 is added
        let set = ConstraintSet::new(vec![
            c(2.0, 1.0, Relation::LessOrEqual, 4.0),
            c(1.0, 0.0, Relation::GreaterOrEqual, 3.0),
        ]);
        let region = RegionSolver::new().solve(&set).unwrap();
        assert_eq!(region.status, RegionStatus::Infeasible);
        assert_eq!(region.conflicts, vec![Conflict::new(vec![0, 1, 3])]);
        assert!(set.is_implicit(3));
    }

    #[test]
    fn test_single_half_plane_is_unbounded_without_corner() {
        let set = ConstraintSet::with_nonnegativity(vec![c(1.0, 1.0, Relation::GreaterOrEqual, 0.0)], false);
        let region = RegionSolver::new().solve(&set).unwrap();

        assert_eq!(region.status, RegionStatus::Unbounded);
        assert!(region.vertices.is_empty());
        assert!(!region.open_directions.is_empty());
        assert!(!region.witnesses.is_empty());
        for d in &region.open_directions {
            assert!(d.x + d.y >= -1e-12);
        }
    }

    #[test]
    fn test_strip_between_parallel_lines() {
        let set = ConstraintSet::with_nonnegativity(
            vec![
                c(1.0, 0.0, Relation::GreaterOrEqual, 1.0),
                c(1.0, 0.0, Relation::LessOrEqual, 2.0),
            ],
            false,
        );
        let region = RegionSolver::new().solve(&set).unwrap();

        assert_eq!(region.status, RegionStatus::Unbounded);
        assert_eq!(region.witnesses.len(), 2);
        assert_eq!(region.open_directions.len(), 2);
        assert!(region.open_directions.iter().all(|d| d.x.abs() < 1e-12));
    }

    #[test]
    fn test_open_quadrant_corner() {
        // x + y >= 2 in the first quadrant: opens towards +x and +y
        let set = ConstraintSet::new(vec![c(1.0, 1.0, Relation::GreaterOrEqual, 2.0)]);
        let region = RegionSolver::new().solve(&set).unwrap();

        assert_eq!(region.status, RegionStatus::Unbounded);
        assert_eq!(region.vertices.len(), 2);
        let open = &region.open_directions;
        assert!(open.iter().any(|d| (d.x - 1.0).abs() < 1e-12 && d.y.abs() < 1e-12));
        assert!(open.iter().any(|d| d.x.abs() < 1e-12 && (d.y - 1.0).abs() < 1e-12));
        assert!(open.iter().all(|d| d.x >= -1e-12 && d.y >= -1e-12));
    }

    #[test]
    fn test_equality_segment_is_bounded() {
        // x + y = 4 in the first quadrant: the segment (4, 0)-(0, 4)
        let set = ConstraintSet::new(vec![c(1.0, 1.0, Relation::Equal, 4.0)]);
        let region = RegionSolver::new().solve(&set).unwrap();

        assert_eq!(region.status, RegionStatus::Bounded);
        assert_eq!(region.vertices.len(), 2);
    }

    #[test]
    fn test_empty_set_is_whole_plane() {
        let set = ConstraintSet::with_nonnegativity(Vec::new(), false);
        let region = RegionSolver::new().solve(&set).unwrap();
        assert_eq!(region.status, RegionStatus::Unbounded);
        assert_eq!(region.open_directions.len(), 4);
        assert_point(&region.witnesses[0], 0.0, 0.0);
    }

    #[test]
    fn test_vertices_satisfy_every_constraint() {
        let set = ConstraintSet::new(vec![
            c(1.0, 3.0, Relation::LessOrEqual, 30.0),
            c(2.0, 1.0, Relation::LessOrEqual, 20.0),
            c(1.0, -1.0, Relation::LessOrEqual, 6.0),
            c(1.0, 1.0, Relation::GreaterOrEqual, 2.0),
        ]);
        let region = RegionSolver::new().solve(&set).unwrap();
        assert_eq!(region.status, RegionStatus::Bounded);
        for v in &region.vertices {
            for constraint in set.iter() {
                let lhs = constraint.lhs(v.position());
                let ok = match constraint.relation {
                    Relation::LessOrEqual => lhs <= constraint.c + 1e-6,
                    Relation::GreaterOrEqual => lhs >= constraint.c - 1e-6,
                    Relation::Equal => (lhs - constraint.c).abs() <= 1e-6,
                };
                assert!(ok, "({}, {}) violates {}", v.x, v.y, constraint);
            }
        }
        assert!(signed_area(&region.vertices) > 0.0);
    }

    #[test]
    fn test_deterministic_output() {
        let set = ConstraintSet::new(vec![
            c(1.0, 3.0, Relation::LessOrEqual, 30.0),
            c(2.0, 1.0, Relation::LessOrEqual, 20.0),
        ]);
        let solver = RegionSolver::new();
        let first = solver.solve(&set).unwrap();
        let second = solver.solve(&set).unwrap();
        assert_eq!(first.vertices.len(), second.vertices.len());
        for (a, b) in first.vertices.iter().zip(&second.vertices) {
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
            assert_eq!(a.tight, b.tight);
        }
    }

    #[test]
    fn test_constraint_limit() {
        let many = (0..4).map(|k| c(1.0, 0.0, Relation::LessOrEqual, k as f64)).collect();
        let set = ConstraintSet::new(many);
        let err = RegionSolver::new().with_max_constraints(3).solve(&set).unwrap_err();
        assert_eq!(err, SolverError::TooManyConstraints { count: 4, limit: 3 });
    }
}
