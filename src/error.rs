//! Engine, record and configuration errors.

use thiserror::Error;

use crate::classifier::Category;
use crate::state::{State, UnknownState};

/// Errors that abort a turn. Memory is left exactly as it was passed in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The state graph has no edge for this (state, category) pair.
    #[error("invalid state transition from {from} on {category}")]
    InvalidStateTransition { from: State, category: Category },

    /// A memory delta would break a session-memory invariant.
    #[error("invalid session memory: {field}: {reason}")]
    InvalidMemory { field: &'static str, reason: String },
}

/// Errors decoding a persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    UnknownState(#[from] UnknownState),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field {field} has unparsable value {value:?}")]
    Unparsable { field: &'static str, value: String },

    #[error("field {field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Errors loading the engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value parsed but is not usable.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors loading screen text.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The text table is missing an entry the engine renders.
    #[error("incomplete script: {0}")]
    Incomplete(String),
}
