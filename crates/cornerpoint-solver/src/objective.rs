use nalgebra::Vector2;
use tracing::debug;

use crate::problem::{ObjectiveFunction, Relation, Sense};
use crate::region::{FeasibleRegion, Vertex};
use crate::tolerance::Tolerance;

/// The best objective value over the region and where it is attained.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Optimum {
    /// First optimal vertex in counter-clockwise order
    pub vertex: Vertex,
    pub value: f64,
    /// Every vertex attaining the optimum; two or more means an optimal edge
    pub tied: Vec<Vertex>,
    /// Direction along which the optimum extends without end, if any
    pub optimal_ray: Option<Vector2<f64>>,
}

impl Optimum {
    /// Whether more than one vertex attains the optimum.
    pub fn is_tied(&self) -> bool {
        self.tied.len() > 1
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveOutcome {
    Optimal(Optimum),
    /// The objective improves without bound along `direction`
    Unbounded { direction: Vector2<f64> },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Objective value at each candidate vertex, in the same order
    pub values: Vec<f64>,
    pub outcome: ObjectiveOutcome,
}

/// Evaluates a linear objective over the corners of a feasible region.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveEvaluator {
    tolerance: Tolerance,
}

impl ObjectiveEvaluator {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    /// Evaluate over a solved region. `None` when the region is infeasible.
    pub fn evaluate_region(&self, region: &FeasibleRegion, objective: &ObjectiveFunction) -> Option<Evaluation> {
        if !region.is_feasible() {
            return None;
        }
        self.evaluate(region.candidates(), &region.open_directions, objective)
    }

    /// Evaluate at `vertices` (counter-clockwise) for a region receding along
    /// `open_directions`. `None` when there is nothing to evaluate.
    pub fn evaluate(
        &self,
        vertices: &[Vertex],
        open_directions: &[Vector2<f64>],
        objective: &ObjectiveFunction,
    ) -> Option<Evaluation> {
        if vertices.is_empty() {
            return None;
        }
        if ![objective.p, objective.q, objective.offset].iter().all(|v| v.is_finite()) {
            debug!("objective has a non-finite coefficient");
            return None;
        }
        let tol = &self.tolerance;
        let gradient = objective.gradient();
        let values: Vec<f64> = vertices
            .iter()
            .map(|v| objective.value_at(v.position()))
            .collect();

        let improving = match objective.sense {
            Sense::Maximize => Relation::LessOrEqual,
            Sense::Minimize => Relation::GreaterOrEqual,
        };
        let magnitude = gradient.norm();
        if let Some(&direction) = open_directions
            .iter()
            .find(|d| !tol.holds(gradient.dot(*d), improving, 0.0, magnitude))
        {
            debug!(dx = direction.x, dy = direction.y, "objective unbounded");
            return Some(Evaluation {
                values,
                outcome: ObjectiveOutcome::Unbounded { direction },
            });
        }

        let best = values[1..].iter().fold(values[0], |acc, &v| match objective.sense {
            Sense::Maximize => acc.max(v),
            Sense::Minimize => acc.min(v),
        });
        let tied_indices: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == best || tol.approx_eq(**v, best))
            .map(|(i, _)| i)
            .collect();
        let &first = tied_indices.first()?;
        let optimal_ray = open_directions
            .iter()
            .find(|d| tol.holds(gradient.dot(*d), Relation::Equal, 0.0, magnitude))
            .copied();

        debug!(value = values[first], tied = tied_indices.len(), "objective optimum");
        Some(Evaluation {
            outcome: ObjectiveOutcome::Optimal(Optimum {
                vertex: vertices[first].clone(),
                value: values[first],
                tied: tied_indices.iter().map(|&i| vertices[i].clone()).collect(),
                optimal_ray,
            }),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ConstraintSet, LinearConstraint};
    use crate::region::RegionSolver;

    fn solve(constraints: &[(f64, f64, Relation, f64)], objective: ObjectiveFunction) -> Evaluation {
        let constraints = constraints
            .iter()
            .map(|&(a, b, r, c)| LinearConstraint::new(a, b, r, c, "test").unwrap())
            .collect();
        let region = RegionSolver::new().solve(&ConstraintSet::new(constraints)).unwrap();
        ObjectiveEvaluator::default()
            .evaluate_region(&region, &objective)
            .unwrap()
    }

    fn optimum(evaluation: &Evaluation) -> &Optimum {
        match &evaluation.outcome {
            ObjectiveOutcome::Optimal(o) => o,
            other => panic!("expected optimum, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_maximization() {
        // Maximize 3x + 2y subject to x + y <= 4, x <= 3, y <= 3; optimum (3, 1) = 11
        let evaluation = solve(
            &[
                (1.0, 1.0, Relation::LessOrEqual, 4.0),
                (1.0, 0.0, Relation::LessOrEqual, 3.0),
                (0.0, 1.0, Relation::LessOrEqual, 3.0),
            ],
            ObjectiveFunction::new(3.0, 2.0, Sense::Maximize),
        );
        let opt = optimum(&evaluation);
        assert!((opt.value - 11.0).abs() < 1e-9, "value = {}", opt.value);
        assert!((opt.vertex.x - 3.0).abs() < 1e-9 && (opt.vertex.y - 1.0).abs() < 1e-9);
        assert!(!opt.is_tied());
        assert!(opt.optimal_ray.is_none());
    }

    #[test]
    fn test_minimization_with_ge() {
        // Minimize 2x + 3y subject to x + y >= 4, x <= 3, y <= 3; optimum (3, 1) = 9
        let evaluation = solve(
            &[
                (1.0, 1.0, Relation::GreaterOrEqual, 4.0),
                (1.0, 0.0, Relation::LessOrEqual, 3.0),
                (0.0, 1.0, Relation::LessOrEqual, 3.0),
            ],
            ObjectiveFunction::new(2.0, 3.0, Sense::Minimize),
        );
        let opt = optimum(&evaluation);
        assert!((opt.value - 9.0).abs() < 1e-9, "value = {}", opt.value);
        assert!((opt.vertex.x - 3.0).abs() < 1e-9 && (opt.vertex.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_optimal_edge_reports_every_tied_vertex() {
        let evaluation = solve(
            &[(1.0, 1.0, Relation::LessOrEqual, 10.0)],
            ObjectiveFunction::new(1.0, 1.0, Sense::Maximize),
        );
        let opt = optimum(&evaluation);
        assert!(opt.is_tied());
        assert_eq!(opt.tied.len(), 2);
        assert!((opt.value - 10.0).abs() < 1e-9);
        assert_eq!((opt.vertex.x, opt.vertex.y), (10.0, 0.0));
        assert_eq!((opt.tied[1].x, opt.tied[1].y), (0.0, 10.0));
    }

    #[test]
    fn test_unbounded_objective_names_direction() {
        // x + y >= 2 in the first quadrant; maximizing x grows along +x
        let evaluation = solve(
            &[(1.0, 1.0, Relation::GreaterOrEqual, 2.0)],
            ObjectiveFunction::new(1.0, 0.0, Sense::Maximize),
        );
        match evaluation.outcome {
            ObjectiveOutcome::Unbounded { direction } => assert!(direction.x > 0.0),
            other => panic!("expected unbounded, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded_minimization_names_direction() {
        // Minimizing -x over x + y >= 2 runs off along +x
        let evaluation = solve(
            &[(1.0, 1.0, Relation::GreaterOrEqual, 2.0)],
            ObjectiveFunction::new(-1.0, 0.0, Sense::Minimize),
        );
        match evaluation.outcome {
            ObjectiveOutcome::Unbounded { direction } => assert!(-direction.x < 0.0),
            other => panic!("expected unbounded, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_objective_is_not_evaluated() {
        let constraints = vec![LinearConstraint::new(1.0, 1.0, Relation::LessOrEqual, 10.0, "x + y <= 10").unwrap()];
        let region = RegionSolver::new().solve(&ConstraintSet::new(constraints)).unwrap();
        let evaluator = ObjectiveEvaluator::default();
        let overflowed = ObjectiveFunction::new(f64::INFINITY, 0.0, Sense::Maximize);
        assert!(evaluator.evaluate_region(&region, &overflowed).is_none());
    }

    #[test]
    fn test_overflowing_values_still_tie() {
        // Finite coefficients, but both corners evaluate to +inf
        let vertices = [
            Vertex {
                x: 2.0,
                y: 0.0,
                tight: vec![0],
                degenerate: false,
            },
            Vertex {
                x: 0.0,
                y: 2.0,
                tight: vec![1],
                degenerate: false,
            },
        ];
        let objective = ObjectiveFunction::new(f64::MAX, f64::MAX, Sense::Maximize);
        let evaluation = ObjectiveEvaluator::default()
            .evaluate(&vertices, &[], &objective)
            .unwrap();
        let opt = optimum(&evaluation);
        assert_eq!(opt.tied.len(), 2);
        assert_eq!(opt.value, f64::INFINITY);
    }

    #[test]
    fn test_minimum_over_unbounded_region_is_finite() {
        let evaluation = solve(
            &[(1.0, 1.0, Relation::GreaterOrEqual, 2.0)],
            ObjectiveFunction::new(1.0, 3.0, Sense::Minimize),
        );
        let opt = optimum(&evaluation);
        assert!((opt.value - 2.0).abs() < 1e-9);
        assert_eq!((opt.vertex.x, opt.vertex.y), (2.0, 0.0));
        assert!(opt.optimal_ray.is_none());
    }

    #[test]
    fn test_optimum_along_a_ray() {
        // Minimizing y over the first quadrant above y >= 1 - x: the whole +x ray is optimal
        let evaluation = solve(
            &[(1.0, 1.0, Relation::GreaterOrEqual, 1.0)],
            ObjectiveFunction::new(0.0, 1.0, Sense::Minimize),
        );
        let opt = optimum(&evaluation);
        assert!(opt.value.abs() < 1e-9);
        let ray = opt.optimal_ray.expect("optimal ray");
        assert!((ray.x - 1.0).abs() < 1e-12 && ray.y.abs() < 1e-12);
    }

    #[test]
    fn test_cornerless_region_uses_witnesses() {
        let constraints = vec![LinearConstraint::new(1.0, 1.0, Relation::LessOrEqual, 5.0, "x + y <= 5").unwrap()];
        let region = RegionSolver::new()
            .solve(&ConstraintSet::with_nonnegativity(constraints, false))
            .unwrap();
        let evaluation = ObjectiveEvaluator::default()
            .evaluate_region(&region, &ObjectiveFunction::new(2.0, 2.0, Sense::Maximize))
            .unwrap();
        let opt = optimum(&evaluation);
        assert!((opt.value - 10.0).abs() < 1e-9);
        assert!(opt.optimal_ray.is_some());
    }

    #[test]
    fn test_offset_shifts_values() {
        let evaluation = solve(
            &[(1.0, 1.0, Relation::LessOrEqual, 10.0)],
            ObjectiveFunction::new(1.0, 0.0, Sense::Maximize).with_offset(5.0),
        );
        assert_eq!(evaluation.values, vec![5.0, 15.0, 5.0]);
        assert_eq!(optimum(&evaluation).value, 15.0);
    }
}
