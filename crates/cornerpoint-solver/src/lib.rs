mod objective;
mod problem;
mod region;
mod solution;
mod tolerance;

pub use objective::{Evaluation, ObjectiveEvaluator, ObjectiveOutcome, Optimum};
pub use problem::{ConstraintSet, DegenerateInputError, LinearConstraint, ObjectiveFunction, Relation, Sense, UnknownSense};
pub use region::{
    open_directions, Conflict, FeasibleRegion, RegionSolver, RegionStatus, SolverError, Vertex, DEFAULT_MAX_CONSTRAINTS,
};
pub use solution::{ConstraintInfo, RegionDescription, Solution, Viewport, ViewportError};
pub use tolerance::Tolerance;
pub use nalgebra::Vector2;
