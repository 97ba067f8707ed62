use std::fmt;

use crate::lexer::Span;

/// Which side of the relational operator an expression came from.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    X,
    Y,
}

/// Relational operator as written, before strict operators are closed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
}

impl RelOp {
    pub fn is_strict(self) -> bool {
        matches!(self, RelOp::Lt | RelOp::Gt)
    }
}

/// One signed term: `coefficient` times `variable`, or a constant.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub span: Span,
    pub coefficient: f64,
    pub variable: Option<Variable>,
}

/// A sum of terms, collected per variable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<Term>,
}

impl LinearExpr {
    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Accumulated coefficient of `variable`.
    pub fn coefficient(&self, variable: Variable) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.variable == Some(variable))
            .map(|t| t.coefficient)
            .sum()
    }

    /// Sum of the constant terms.
    pub fn constant(&self) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.variable.is_none())
            .map(|t| t.coefficient)
            .sum()
    }

    pub fn span(&self) -> Option<Span> {
        let first = self.terms.first()?.span;
        Some(self.terms.iter().fold(first, |acc, t| acc.merge(t.span)))
    }
}

/// `lhs <op> rhs` as parsed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: LinearExpr,
    pub op: RelOp,
    pub op_span: Span,
    pub rhs: LinearExpr,
}
