use nalgebra::Vector2;
use thiserror::Error;

use crate::objective::{Evaluation, ObjectiveEvaluator, ObjectiveOutcome, Optimum};
use crate::problem::{ConstraintSet, LinearConstraint, ObjectiveFunction, Relation};
use crate::region::{Conflict, FeasibleRegion, RegionSolver, RegionStatus, SolverError, Vertex};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewportError {
    #[error("Empty viewport: {axis}min must be below {axis}max")]
    Empty { axis: char },
    #[error("Viewport bounds must be finite")]
    NonFinite,
}

/// The result of solving a constraint set, with an optional objective.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum Solution {
    /// No point satisfies every constraint
    Infeasible {
        /// Constraint pairs that contradict each other directly
        conflicts: Vec<Conflict>,
    },
    /// The region opens to infinity; the objective, if any, is still finite
    Unbounded {
        vertices: Vec<Vertex>,
        open_directions: Vec<Vector2<f64>>,
        /// Feasible sample points when the region has no corner
        witnesses: Vec<Vertex>,
        /// Objective values at the vertices (or witnesses when there are none)
        values: Vec<f64>,
        optimum: Option<Optimum>,
    },
    /// The objective improves without bound along `direction`
    UnboundedObjective {
        vertices: Vec<Vertex>,
        open_directions: Vec<Vector2<f64>>,
        direction: Vector2<f64>,
    },
    /// Closed polygon
    Bounded {
        vertices: Vec<Vertex>,
        /// Objective values at the vertices; empty without an objective
        values: Vec<f64>,
        optimum: Option<Optimum>,
    },
}

impl Solution {
    pub fn from_region(region: FeasibleRegion, evaluation: Option<Evaluation>) -> Self {
        let FeasibleRegion {
            status,
            vertices,
            open_directions,
            witnesses,
            conflicts,
        } = region;

        let (values, optimum) = match evaluation {
            Some(Evaluation {
                outcome: ObjectiveOutcome::Unbounded { direction },
                ..
            }) => {
                return Solution::UnboundedObjective {
                    vertices,
                    open_directions,
                    direction,
                };
            }
            Some(Evaluation {
                values,
                outcome: ObjectiveOutcome::Optimal(optimum),
            }) => (values, Some(optimum)),
            None => (Vec::new(), None),
        };

        match status {
            RegionStatus::Infeasible => Solution::Infeasible { conflicts },
            RegionStatus::Unbounded => Solution::Unbounded {
                vertices,
                open_directions,
                witnesses,
                values,
                optimum,
            },
            RegionStatus::Bounded => Solution::Bounded {
                vertices,
                values,
                optimum,
            },
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        match self {
            Solution::Infeasible { .. } => &[],
            Solution::Unbounded { vertices, .. }
            | Solution::UnboundedObjective { vertices, .. }
            | Solution::Bounded { vertices, .. } => vertices,
        }
    }

    pub fn optimum(&self) -> Option<&Optimum> {
        match self {
            Solution::Unbounded { optimum, .. } | Solution::Bounded { optimum, .. } => optimum.as_ref(),
            _ => None,
        }
    }

    pub fn open_directions(&self) -> &[Vector2<f64>] {
        match self {
            Solution::Unbounded { open_directions, .. }
            | Solution::UnboundedObjective { open_directions, .. } => open_directions,
            _ => &[],
        }
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            Solution::Infeasible { .. } => "infeasible",
            Solution::Unbounded { .. } => "unbounded",
            Solution::UnboundedObjective { .. } => "unbounded_objective",
            Solution::Bounded { .. } => "bounded",
        }
    }
}

/// Display window for a region. Only clips what is drawn.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            xmin: -2.0,
            xmax: 15.0,
            ymin: -2.0,
            ymax: 15.0,
        }
    }
}

impl Viewport {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, ViewportError> {
        if ![xmin, xmax, ymin, ymax].iter().all(|v| v.is_finite()) {
            return Err(ViewportError::NonFinite);
        }
        if xmin >= xmax {
            return Err(ViewportError::Empty { axis: 'x' });
        }
        if ymin >= ymax {
            return Err(ViewportError::Empty { axis: 'y' });
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Default window grown to show every point with a 10% margin.
    pub fn fit(points: &[Vertex]) -> Self {
        let mut viewport = Self::default();
        if points.is_empty() {
            return viewport;
        }
        let (xlo, xhi) = span(points.iter().map(|p| p.x));
        let (ylo, yhi) = span(points.iter().map(|p| p.y));
        let xpad = 0.1 * (xhi - xlo).max(1.0);
        let ypad = 0.1 * (yhi - ylo).max(1.0);
        viewport.xmin = viewport.xmin.min(xlo - xpad);
        viewport.xmax = viewport.xmax.max(xhi + xpad);
        viewport.ymin = viewport.ymin.min(ylo - ypad);
        viewport.ymax = viewport.ymax.max(yhi + ypad);
        viewport
    }

    pub fn contains(&self, p: Vector2<f64>) -> bool {
        (self.xmin..=self.xmax).contains(&p.x) && (self.ymin..=self.ymax).contains(&p.y)
    }

    /// The window as four half-planes.
    pub fn bounds(&self) -> [LinearConstraint; 4] {
        let side = |a: f64, b: f64, relation: Relation, c: f64, source: String| LinearConstraint {
            a,
            b,
            c,
            relation,
            source,
        };
        [
            side(1.0, 0.0, Relation::GreaterOrEqual, self.xmin, format!("x >= {}", self.xmin)),
            side(1.0, 0.0, Relation::LessOrEqual, self.xmax, format!("x <= {}", self.xmax)),
            side(0.0, 1.0, Relation::GreaterOrEqual, self.ymin, format!("y >= {}", self.ymin)),
            side(0.0, 1.0, Relation::LessOrEqual, self.ymax, format!("y <= {}", self.ymax)),
        ]
    }
}

fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Per-constraint metadata for labelling boundary lines.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintInfo {
    pub index: usize,
    pub source: String,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub relation: Relation,
    /// Added as a default non-negativity bound
    pub implicit: bool,
    /// Tight at one or more vertices
    pub active: bool,
}

/// Everything a renderer needs to draw the region and explain the answer.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDescription {
    pub solution: Solution,
    pub constraints: Vec<ConstraintInfo>,
    pub viewport: Viewport,
    /// Region clipped to the viewport, counter-clockwise; empty when infeasible
    pub clipped: Vec<Vector2<f64>>,
}

impl RegionSolver {
    /// Solve `set`, evaluate `objective` over it, and assemble the output for display.
    pub fn describe(
        &self,
        set: &ConstraintSet,
        objective: Option<&ObjectiveFunction>,
        viewport: Option<Viewport>,
    ) -> Result<RegionDescription, SolverError> {
        let region = self.solve(set)?;
        let evaluation = objective
            .and_then(|o| ObjectiveEvaluator::new(*self.tolerance()).evaluate_region(&region, o));
        let viewport = viewport.unwrap_or_else(|| Viewport::fit(region.candidates()));
        let clipped = if region.is_feasible() {
            self.clip(set, &viewport)
        } else {
            Vec::new()
        };

        let constraints = set
            .iter()
            .enumerate()
            .map(|(index, c)| ConstraintInfo {
                index,
                source: c.source.clone(),
                a: c.a,
                b: c.b,
                c: c.c,
                relation: c.relation,
                implicit: set.is_implicit(index),
                active: region.vertices.iter().any(|v| v.tight.contains(&index)),
            })
            .collect();

        Ok(RegionDescription {
            solution: Solution::from_region(region, evaluation),
            constraints,
            viewport,
            clipped,
        })
    }

    /// Corners of the region intersected with the viewport.
    pub fn clip(&self, set: &ConstraintSet, viewport: &Viewport) -> Vec<Vector2<f64>> {
        let mut constraints = set.constraints().to_vec();
        constraints.extend(viewport.bounds());
        self.corners(&constraints)
            .iter()
            .map(Vertex::position)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Sense;

    fn set(constraints: &[(f64, f64, Relation, f64)]) -> ConstraintSet {
        ConstraintSet::new(
            constraints
                .iter()
                .map(|&(a, b, r, c)| LinearConstraint::new(a, b, r, c, "test").unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_bounded_description() {
        let set = set(&[(1.0, 1.0, Relation::LessOrEqual, 10.0)]);
        let objective = ObjectiveFunction::new(1.0, 1.0, Sense::Maximize);
        let description = RegionSolver::new().describe(&set, Some(&objective), None).unwrap();

        assert_eq!(description.solution.status_name(), "bounded");
        assert_eq!(description.solution.vertices().len(), 3);
        assert_eq!(description.solution.optimum().map(|o| o.tied.len()), Some(2));
        assert_eq!(description.viewport, Viewport::default());
        assert_eq!(description.clipped.len(), 3);
        assert_eq!(description.constraints.len(), 3);
        assert!(description.constraints.iter().all(|c| c.active));
        assert!(!description.constraints[0].implicit);
        assert!(description.constraints[2].implicit);
    }

    #[test]
    fn test_unbounded_region_is_clipped_to_viewport() {
        let set = set(&[(1.0, 1.0, Relation::GreaterOrEqual, 2.0)]);
        let viewport = Viewport::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let description = RegionSolver::new().describe(&set, None, Some(viewport)).unwrap();

        assert!(matches!(description.solution, Solution::Unbounded { .. }));
        assert!(!description.solution.open_directions().is_empty());
        // (2, 0), (10, 0), (10, 10), (0, 10), (0, 2)
        assert_eq!(description.clipped.len(), 5);
        assert!(description.clipped.iter().all(|p| viewport.contains(*p)));
    }

    #[test]
    fn test_unbounded_objective_solution() {
        let set = set(&[(1.0, 1.0, Relation::GreaterOrEqual, 2.0)]);
        let objective = ObjectiveFunction::new(1.0, 1.0, Sense::Maximize);
        let description = RegionSolver::new().describe(&set, Some(&objective), None).unwrap();
        match description.solution {
            Solution::UnboundedObjective { direction, .. } => assert!(direction.x + direction.y > 0.0),
            other => panic!("expected unbounded objective, got {:?}", other),
        }
    }

    #[test]
    fn test_infeasible_has_nothing_to_draw() {
        let set = set(&[
            (1.0, 0.0, Relation::LessOrEqual, 1.0),
            (1.0, 0.0, Relation::GreaterOrEqual, 2.0),
        ]);
        let objective = ObjectiveFunction::new(1.0, 1.0, Sense::Maximize);
        let description = RegionSolver::new().describe(&set, Some(&objective), None).unwrap();
        assert_eq!(
            description.solution,
            Solution::Infeasible {
                conflicts: vec![Conflict::new(vec![0, 1])]
            }
        );
        assert!(description.solution.vertices().is_empty());
        assert!(description.clipped.is_empty());
        assert!(description.constraints.iter().all(|c| !c.active));
    }

    #[test]
    fn test_viewport_fit_and_validation() {
        let far = Vertex {
            x: 40.0,
            y: 0.0,
            tight: vec![0, 1],
            degenerate: false,
        };
        let fitted = Viewport::fit(&[far]);
        assert_eq!(fitted.xmin, -2.0);
        assert!(fitted.xmax > 40.0);
        assert_eq!(fitted.ymax, 15.0);

        assert_eq!(Viewport::new(1.0, 1.0, 0.0, 1.0), Err(ViewportError::Empty { axis: 'x' }));
        assert_eq!(Viewport::new(0.0, f64::INFINITY, 0.0, 1.0), Err(ViewportError::NonFinite));
    }
}
