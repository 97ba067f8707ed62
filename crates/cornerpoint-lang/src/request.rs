//! The boundary between user text and the solver: parse every constraint,
//! the objective and the sense, then describe the region.

use cornerpoint_solver::{
    ConstraintSet, LinearConstraint, ObjectiveFunction, RegionDescription, RegionSolver, Sense,
    SolverError, UnknownSense, Viewport, ViewportError,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::parser::{ParseError, Parser};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Constraint {} ('{source_text}'): {source}", .index + 1)]
    Parse {
        index: usize,
        source_text: String,
        source: ParseError,
    },
    #[error("Objective: {0}")]
    Objective(ParseError),
    #[error(transparent)]
    Sense(#[from] UnknownSense),
    #[error("Too many constraints: {count} given, at most {limit} allowed")]
    TooManyConstraints { count: usize, limit: usize },
    #[error(transparent)]
    Viewport(#[from] ViewportError),
}

impl From<SolverError> for SolveError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::TooManyConstraints { count, limit } => {
                SolveError::TooManyConstraints { count, limit }
            }
        }
    }
}

/// One problem as submitted: constraint strings plus optional objective.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveRequest {
    pub constraints: Vec<String>,
    pub objective: Option<String>,
    /// `max` or `min`
    pub sense: String,
    /// Add `x >= 0` and `y >= 0` unless already given
    pub assume_nonnegative: bool,
    pub viewport: Option<Viewport>,
}

impl Default for SolveRequest {
    fn default() -> Self {
        Self {
            constraints: Vec::new(),
            objective: None,
            sense: "max".to_string(),
            assume_nonnegative: true,
            viewport: None,
        }
    }
}

impl SolveRequest {
    pub fn new<S: Into<String>>(constraints: impl IntoIterator<Item = S>) -> Self {
        Self {
            constraints: constraints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_objective(mut self, objective: impl Into<String>, sense: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self.sense = sense.into();
        self
    }

    pub fn with_nonnegativity(mut self, assume_nonnegative: bool) -> Self {
        self.assume_nonnegative = assume_nonnegative;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Solve with the default solver configuration.
    pub fn solve(&self) -> Result<RegionDescription, SolveError> {
        self.solve_with(&RegionSolver::new())
    }

    pub fn solve_with(&self, solver: &RegionSolver) -> Result<RegionDescription, SolveError> {
        solver.check_size(self.constraints.len())?;

        let constraints = check_constraints(&self.constraints)?;
        let objective = self.objective()?;
        let viewport = self
            .viewport
            .map(|v| Viewport::new(v.xmin, v.xmax, v.ymin, v.ymax))
            .transpose()?;

        let set = ConstraintSet::with_nonnegativity(constraints, self.assume_nonnegative);
        debug!(
            explicit = set.explicit_len(),
            total = set.len(),
            objective = objective.is_some(),
            "solving request"
        );
        let description = solver.describe(&set, objective.as_ref(), viewport)?;
        info!(status = description.solution.status_name(), "request solved");
        Ok(description)
    }

    fn objective(&self) -> Result<Option<ObjectiveFunction>, SolveError> {
        let Some(source) = self.objective.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        let sense: Sense = self.sense.parse()?;
        Parser::parse_objective(source, sense)
            .map(Some)
            .map_err(SolveError::Objective)
    }
}

/// Parse every constraint string, stopping at the first that fails.
pub fn check_constraints<S: AsRef<str>>(sources: &[S]) -> Result<Vec<LinearConstraint>, SolveError> {
    sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            let source = source.as_ref();
            Parser::parse_constraint(source).map_err(|e| SolveError::Parse {
                index,
                source_text: source.to_string(),
                source: e,
            })
        })
        .collect()
}
