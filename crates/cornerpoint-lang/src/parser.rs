use cornerpoint_solver::{DegenerateInputError, LinearConstraint, ObjectiveFunction, Relation, Sense, Tolerance};
use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::lexer::{Lexer, Span, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("No relational operator found: expected one of <=, >=, =, <, >")]
    MissingOperator,
    #[error("Expected exactly one relational operator, found {count}")]
    MultipleOperators { count: usize },
    #[error("The {0} side is empty")]
    EmptySide(Side),
    #[error("Unsupported variable '{name}': only x and y are allowed")]
    UnsupportedVariable { name: String, span: Span },
    #[error("Non-linear term '{text}': only multiples of x and y can be added")]
    NonLinearTerm { text: String, span: Span },
    #[error("Right-hand side must be numeric, found '{text}'")]
    NonNumericRhs { text: String, span: Span },
    #[error("Unexpected '{found}' at position {span:?}")]
    UnexpectedToken { found: String, span: Span },
    #[error("Expected a term after '{found}'")]
    DanglingOperator { found: String, span: Span },
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),
    #[error("No variables left: 0 {relation} {constant} can never hold")]
    Contradiction { relation: Relation, constant: f64 },
    #[error("No variables left: 0 {relation} {constant} always holds")]
    Tautology { relation: Relation, constant: f64 },
    #[error("Objective has no x or y term")]
    ConstantObjective,
    #[error(transparent)]
    Degenerate(#[from] DegenerateInputError),
}

impl ParseError {
    /// Location in the source, when the error points at specific text.
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnsupportedVariable { span, .. }
            | ParseError::NonLinearTerm { span, .. }
            | ParseError::NonNumericRhs { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::DanglingOperator { span, .. } => Some(*span),
            _ => None,
        }
    }
}

/// Operator waiting for its right operand inside a term.
#[derive(Clone, Copy, PartialEq)]
enum Pending {
    Nothing,
    Mul,
    Div,
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Lexer::tokenize(source),
            pos: 0,
        }
    }

    /// Parse one constraint such as `2x + 3y <= 12` into canonical form.
    pub fn parse_constraint(source: &str) -> Result<LinearConstraint, ParseError> {
        let comparison = Parser::parse_comparison(source)?;
        let lhs = &comparison.lhs;
        let rhs = &comparison.rhs;

        let a = lhs.coefficient(Variable::X) - rhs.coefficient(Variable::X);
        let b = lhs.coefficient(Variable::Y) - rhs.coefficient(Variable::Y);
        let c = rhs.constant() - lhs.constant();
        let relation = match comparison.op {
            RelOp::Le | RelOp::Lt => Relation::LessOrEqual,
            RelOp::Ge | RelOp::Gt => Relation::GreaterOrEqual,
            RelOp::Eq => Relation::Equal,
        };
        if comparison.op.is_strict() {
            debug!(source, "strict inequality read as closed");
        }

        let tol = Tolerance::default();
        if tol.is_zero(a) && tol.is_zero(b) {
            return Err(if tol.holds(0.0, relation, c, c) {
                ParseError::Tautology { relation, constant: c }
            } else {
                ParseError::Contradiction { relation, constant: c }
            });
        }

        Ok(LinearConstraint::new(a, b, relation, c, normalize_whitespace(source))?)
    }

    /// Parse `lhs <op> rhs` without lowering it.
    pub fn parse_comparison(source: &str) -> Result<Comparison, ParseError> {
        let mut parser = Parser::new(source);
        let eof = parser.tokens.len() - 1;
        let relations: Vec<usize> = parser
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind.is_relation())
            .map(|(i, _)| i)
            .collect();

        let split = match relations.as_slice() {
            [] => return Err(ParseError::MissingOperator),
            [k] => *k,
            many => return Err(ParseError::MultipleOperators { count: many.len() }),
        };

        let lhs = parser.parse_expr(split, Side::Left)?;
        parser.pos = split + 1;
        let rhs = parser.parse_expr(eof, Side::Right)?;

        let op_token = &parser.tokens[split];
        let op = match op_token.kind {
            TokenKind::Le => RelOp::Le,
            TokenKind::Ge => RelOp::Ge,
            TokenKind::Lt => RelOp::Lt,
            TokenKind::Gt => RelOp::Gt,
            _ => RelOp::Eq,
        };
        Ok(Comparison {
            lhs,
            op,
            op_span: op_token.span,
            rhs,
        })
    }

    /// Parse an objective such as `15x + 20y` or `Z = 3x + 2y + 5`.
    pub fn parse_objective(source: &str, sense: Sense) -> Result<ObjectiveFunction, ParseError> {
        let mut parser = Parser::new(source);
        let eof = parser.tokens.len() - 1;
        let relations: Vec<usize> = parser
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind.is_relation())
            .map(|(i, _)| i)
            .collect();

        let start = match relations.as_slice() {
            [] => 0,
            [1] if parser.is_objective_name(0) && parser.tokens[1].kind == TokenKind::Eq => 2,
            [k] => {
                let token = &parser.tokens[*k];
                return Err(ParseError::UnexpectedToken {
                    found: token.text.clone(),
                    span: token.span,
                });
            }
            many => return Err(ParseError::MultipleOperators { count: many.len() }),
        };
        if start >= eof {
            return Err(ParseError::ConstantObjective);
        }

        parser.pos = start;
        let expr = parser.parse_expr(eof, Side::Left)?;
        let p = expr.coefficient(Variable::X);
        let q = expr.coefficient(Variable::Y);
        let offset = expr.constant();
        if ![p, q, offset].iter().all(|v| v.is_finite()) {
            return Err(ParseError::InvalidNumber(normalize_whitespace(source)));
        }
        let tol = Tolerance::default();
        if tol.is_zero(p) && tol.is_zero(q) {
            return Err(ParseError::ConstantObjective);
        }
        Ok(ObjectiveFunction::new(p, q, sense).with_offset(offset))
    }

    /// A leading name like `Z` in `Z = 3x + 2y`.
    fn is_objective_name(&self, index: usize) -> bool {
        let token = &self.tokens[index];
        token.kind == TokenKind::Ident && classify(&token.text).is_err()
    }

    fn term_text(&self, start: usize, end: usize) -> String {
        self.source[start..end].trim().to_string()
    }

    /// Signed terms from the current position up to token index `end`.
    fn parse_expr(&mut self, end: usize, side: Side) -> Result<LinearExpr, ParseError> {
        let mut expr = LinearExpr::default();
        if self.pos >= end {
            return Err(ParseError::EmptySide(side));
        }

        while self.pos < end {
            let mut sign = 1.0;
            let mut sign_span: Option<Span> = None;
            while self.pos < end
                && matches!(self.tokens[self.pos].kind, TokenKind::Plus | TokenKind::Minus)
            {
                let token = &self.tokens[self.pos];
                if token.kind == TokenKind::Minus {
                    sign = -sign;
                }
                sign_span = Some(sign_span.map_or(token.span, |s| s.merge(token.span)));
                self.pos += 1;
            }

            if self.pos >= end {
                let span = sign_span.unwrap_or_else(|| Span::new(0, 0));
                return Err(ParseError::DanglingOperator {
                    found: self.term_text(span.start, span.end),
                    span,
                });
            }

            let mut term = self.parse_term(end, side)?;
            term.coefficient *= sign;
            if let Some(s) = sign_span {
                term.span = s.merge(term.span);
            }
            expr.push(term);
        }

        Ok(expr)
    }

    /// Factors joined by `*`, `/` or juxtaposition, up to the next `+`/`-`.
    fn parse_term(&mut self, end: usize, side: Side) -> Result<Term, ParseError> {
        let start = self.tokens[self.pos].span;
        let mut span = start;
        let mut coefficient = 1.0;
        let mut variable: Option<Variable> = None;
        let mut last: Option<TokenKind> = None;
        let mut pending = Pending::Nothing;

        while self.pos < end {
            let token = self.tokens[self.pos].clone();
            match token.kind {
                TokenKind::Plus | TokenKind::Minus => break,
                TokenKind::Number => {
                    if last.is_some() && pending == Pending::Nothing {
                        return Err(ParseError::UnexpectedToken {
                            found: token.text,
                            span: token.span,
                        });
                    }
                    let value = parse_number(&token.text)?;
                    if pending == Pending::Div {
                        if value == 0.0 {
                            return Err(ParseError::DivisionByZero(
                                self.term_text(start.start, token.span.end),
                            ));
                        }
                        coefficient /= value;
                    } else {
                        coefficient *= value;
                    }
                }
                TokenKind::Ident => {
                    let nonlinear = ParseError::NonLinearTerm {
                        text: self.term_text(start.start, token.span.end),
                        span: start.merge(token.span),
                    };
                    if pending == Pending::Div || variable.is_some() {
                        return Err(nonlinear);
                    }
                    variable = Some(match classify(&token.text) {
                        Ok(v) => v,
                        Err(Classified::Product) => return Err(nonlinear),
                        Err(Classified::Unknown) => {
                            return Err(ParseError::UnsupportedVariable {
                                name: token.text,
                                span: token.span,
                            });
                        }
                    });
                }
                TokenKind::Star | TokenKind::Slash => {
                    if last.is_none() || pending != Pending::Nothing {
                        return Err(ParseError::UnexpectedToken {
                            found: token.text,
                            span: token.span,
                        });
                    }
                    pending = if token.kind == TokenKind::Star {
                        Pending::Mul
                    } else {
                        Pending::Div
                    };
                    span = span.merge(token.span);
                    self.pos += 1;
                    continue;
                }
                TokenKind::Caret => {
                    let through = self
                        .tokens
                        .get(self.pos + 1)
                        .filter(|_| self.pos + 1 < end)
                        .map_or(token.span, |next| next.span);
                    return Err(ParseError::NonLinearTerm {
                        text: self.term_text(start.start, through.end),
                        span: start.merge(through),
                    });
                }
                _ => {
                    return Err(match side {
                        Side::Right => ParseError::NonNumericRhs {
                            text: token.text,
                            span: token.span,
                        },
                        Side::Left => ParseError::UnexpectedToken {
                            found: token.text,
                            span: token.span,
                        },
                    });
                }
            }
            last = Some(token.kind);
            pending = Pending::Nothing;
            span = span.merge(token.span);
            self.pos += 1;
        }

        if pending != Pending::Nothing {
            return Err(ParseError::DanglingOperator {
                found: self.term_text(span.start, span.end),
                span,
            });
        }

        Ok(Term {
            span,
            coefficient,
            variable,
        })
    }
}

enum Classified {
    /// Juxtaposed variables such as `xy`
    Product,
    Unknown,
}

fn classify(name: &str) -> Result<Variable, Classified> {
    let lower = name.to_lowercase();
    match lower.as_str() {
        "x" => Ok(Variable::X),
        "y" => Ok(Variable::Y),
        s if s.chars().all(|c| c == 'x' || c == 'y') => Err(Classified::Product),
        _ => Err(Classified::Unknown),
    }
}

fn parse_number(text: &str) -> Result<f64, ParseError> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber(text.to_string())),
    }
}

fn normalize_whitespace(source: &str) -> String {
    source.split_whitespace().collect::<Vec<_>>().join(" ")
}
