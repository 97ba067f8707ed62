pub mod ast;
pub mod lexer;
pub mod parser;
pub mod request;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use ast::*;
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use request::{check_constraints, SolveError, SolveRequest};
