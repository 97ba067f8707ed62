//! WASM bindings for the graph editor
//!
//! Constraint inputs are validated as they are typed; `solve` takes a whole
//! request object and returns the region description as a JS object.

use wasm_bindgen::prelude::*;

use crate::lexer::{Lexer, TokenKind};
use crate::parser::Parser;
use crate::request::SolveRequest;

/// Solve a request (`{constraints, objective, sense, assume_nonnegative, viewport}`)
#[wasm_bindgen]
pub fn solve(request: JsValue) -> Result<JsValue, JsValue> {
    let request: SolveRequest =
        serde_wasm_bindgen::from_value(request).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let description = request.solve().map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&description).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parse a single constraint and return its canonical form
#[wasm_bindgen]
pub fn parse_constraint(source: &str) -> Result<JsValue, JsValue> {
    let constraint = Parser::parse_constraint(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&constraint).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Tokenize source code and return tokens as JSON
#[wasm_bindgen]
pub fn tokenize(source: &str) -> Result<JsValue, JsValue> {
    let tokens: Vec<TokenInfo> = Lexer::tokenize(source)
        .into_iter()
        .map(|t| TokenInfo {
            kind: format!("{:?}", t.kind),
            text: t.text,
            start: t.span.start,
            end: t.span.end,
        })
        .collect();
    serde_wasm_bindgen::to_value(&tokens).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Token information for JavaScript
#[derive(serde::Serialize)]
struct TokenInfo {
    kind: String,
    text: String,
    start: usize,
    end: usize,
}

/// Validate one constraint and return diagnostics as JSON
#[wasm_bindgen]
pub fn validate(source: &str) -> JsValue {
    let diagnostics = get_diagnostics(source);
    serde_wasm_bindgen::to_value(&diagnostics).unwrap_or(JsValue::NULL)
}

/// Get semantic tokens for syntax highlighting
#[wasm_bindgen]
pub fn get_semantic_tokens(source: &str) -> Result<JsValue, JsValue> {
    let tokens: Vec<SemanticToken> = Lexer::tokenize(source)
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| {
            let token_type = match t.kind {
                TokenKind::Ident => "variable",
                TokenKind::Number => "number",
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Caret => "operator",
                TokenKind::Le | TokenKind::Ge | TokenKind::Lt | TokenKind::Gt | TokenKind::Eq => {
                    "keyword"
                }
                TokenKind::LParen | TokenKind::RParen => "delimiter",
                TokenKind::Error | TokenKind::Eof => "error",
            };
            SemanticToken {
                start: t.span.start,
                end: t.span.end,
                token_type: token_type.to_string(),
            }
        })
        .collect();
    serde_wasm_bindgen::to_value(&tokens).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[derive(serde::Serialize)]
struct SemanticToken {
    start: usize,
    end: usize,
    token_type: String,
}

#[derive(serde::Serialize)]
struct Diagnostic {
    start: usize,
    end: usize,
    severity: String,
    message: String,
}

fn get_diagnostics(source: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if let Err(e) = Parser::parse_constraint(source) {
        let (start, end) = e.span().map_or((0, source.len()), |s| (s.start, s.end));
        diagnostics.push(Diagnostic {
            start,
            end,
            severity: "error".to_string(),
            message: e.to_string(),
        });
    }

    diagnostics
}
