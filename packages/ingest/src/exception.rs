//! Server-reported conditions and their extraction from JSON documents.

use std::fmt;

use serde_json::Value;

use crate::finder::{find_first, KeyFinder};
use crate::severity::{classify, code_number, ErrorCode, Severity};

/// An exception reported by a SUSHI server.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticError {
    /// Code as it appeared in the document (empty when absent).
    pub code: String,
    pub severity: Severity,
    pub message: String,
    /// Free-form `Data` attached to the exception (empty when absent).
    pub data: String,
}

impl SemanticError {
    /// Numeric code, when the code is numeric.
    #[must_use]
    pub fn code_number(&self) -> Option<i64> {
        self.code.trim().parse().ok()
    }

    /// Whether this exception carries the given known code.
    #[must_use]
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code_number() == Some(code.value())
    }

    /// Build an exception from an object found in a document.
    ///
    /// `Code`, `Message` and `Data` are looked up anywhere inside `exception`.
    /// Severity follows `Code` alone; the legacy `number` key only stands in
    /// for the displayed code, so a `number`-only exception is an Error.
    #[must_use]
    pub fn from_value(exception: &Value) -> Self {
        let code = find_first(exception, &["Code"]).filter(|code| !code.is_null());
        let severity = classify(code.and_then(code_number));
        let code = code.or_else(|| find_first(exception, &["number"]));

        Self {
            code: code.map(render_scalar).unwrap_or_default(),
            severity,
            message: find_first(exception, &["Message"])
                .map(render_scalar)
                .unwrap_or_default(),
            data: find_first(exception, &["Data"])
                .filter(|data| is_truthy(data))
                .map(render_scalar)
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error {}: {}", self.severity, self.code, self.message)?;
        if !self.data.is_empty() {
            write!(f, "; {}", self.data)?;
        }
        Ok(())
    }
}

/// A failure to obtain SUSHI data at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub http_status: Option<u16>,
    pub message: String,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "Transport error [HTTP {status}]: {}", self.message),
            None => write!(f, "Transport error: {}", self.message),
        }
    }
}

/// Anything filed into the error list of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    Semantic(SemanticError),
    Transport(TransportError),
}

impl ProtocolError {
    /// The semantic exception, if this is one.
    #[must_use]
    pub fn as_semantic(&self) -> Option<&SemanticError> {
        match self {
            Self::Semantic(error) => Some(error),
            Self::Transport(_) => None,
        }
    }

    /// Whether this is a semantic exception with the given code.
    #[must_use]
    pub fn is(&self, code: ErrorCode) -> bool {
        self.as_semantic().is_some_and(|error| error.is(code))
    }

    /// Diagnostic payload attached to the error.
    #[must_use]
    pub fn data(&self) -> &str {
        match self {
            Self::Semantic(error) => &error.data,
            Self::Transport(error) => &error.message,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic(error) => error.fmt(f),
            Self::Transport(error) => error.fmt(f),
        }
    }
}

/// Collect every exception present in `data`.
///
/// Lists are searched element by element. Within one document, keyed
/// `Exception` objects and `Exceptions` lists are collected first; only when
/// none exist is the document itself considered, and then only if it carries
/// a non-empty code.
#[must_use]
pub fn extract_errors(data: &Value) -> Vec<SemanticError> {
    if let Value::Array(values) = data {
        return values.iter().flat_map(extract_errors).collect();
    }

    let mut errors: Vec<SemanticError> = KeyFinder::new(data, &["Exception"])
        .map(SemanticError::from_value)
        .collect();

    for exceptions in KeyFinder::new(data, &["Exceptions"]) {
        match exceptions {
            Value::Array(list) => errors.extend(list.iter().map(SemanticError::from_value)),
            // a lone object instead of a list; nested `Exception`s were already collected
            Value::Object(_) if find_first(exceptions, &["Exception"]).is_none() => {
                errors.push(SemanticError::from_value(exceptions));
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        let naked = SemanticError::from_value(data);
        // needs code and severity; severity is always derived, so the code decides
        if !naked.code.is_empty() {
            errors.push(naked);
        }
    }

    errors
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(values) => !values.is_empty(),
        Value::Object(object) => !object.is_empty(),
        Value::Number(_) => true,
    }
}
