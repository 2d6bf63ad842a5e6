//! Structured diagnostics shared by lowering and manifest building.
//!
//! Every failure is a [`CompileError`]: a human message, an optional source
//! position and optional machine-readable details. Non-fatal findings are
//! [`Warning`]s appended to a caller-supplied accumulator.
use serde::Serialize;
use thiserror::Error;

use crate::ast::Span;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown record/page/flow/compose/pack/pattern name.
    Reference,
    /// Disallowed child, duplicate label, missing block.
    Structure,
    /// Ambiguous or missing data source, bad state binding.
    StateBinding,
    /// Tool or function call in a pure position.
    Purity,
    Cycle,
    Visibility,
    ActionCollision,
    Capability,
    Theme,
    Storage,
    /// Malformed input documents.
    Input,
    /// Broken compiler invariant.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), line: None, column: None, details: None }
    }
    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reference, message)
    }
    pub fn structure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structure, message)
    }
    pub fn state_binding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StateBinding, message)
    }
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach a source position. Zero positions mean "unknown" and are dropped.
    pub fn at(mut self, span: Span) -> Self {
        if span.line > 0 {
            self.line = Some(span.line);
            self.column = Some(span.column);
        }
        self
    }

    /// Attach a position only when none is set yet (inner positions win).
    pub fn or_at(self, span: Span) -> Self {
        if self.line.is_some() { self } else { self.at(span) }
    }

    pub fn with_details(mut self, error_id: impl Into<String>, keyword: Option<impl AsRef<str>>) -> Self {
        self.details = Some(ErrorDetails {
            error_id: Some(error_id.into()),
            keyword: keyword.map(|keyword| keyword.as_ref().to_owned()),
        });
        self
    }

    /// `line L, column C: message` when a position is known.
    pub fn located(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(column)) => format!("line {line}, column {column}: {}", self.message),
            _ => self.message.clone(),
        }
    }
}

impl Warning {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self { code: code.to_owned(), message: message.into(), line: None, column: None, element_id: None }
    }
    pub fn at(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.column = column;
        self
    }
    pub fn on_element(mut self, element_id: Option<&str>) -> Self {
        self.element_id = element_id.map(str::to_owned);
        self
    }
}

// ------------------------------- Tests ------------------------------------ //
