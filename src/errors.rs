use std::path::PathBuf;

use thiserror::Error;

/// A single context-validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContextError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Engine-wide error taxonomy.
///
/// Approval rejections and pending verdicts are values, not errors; this
/// enum covers I/O, path, provider, lookup, and corruption failures only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("context validation failed: {}", format_context_errors(.0))]
    ContextInvalid(Vec<ContextError>),

    #[error("profile '{0}' is not registered")]
    ProfileNotFound(String),

    #[error("provider '{0}' is not registered")]
    ProviderNotFound(String),

    #[error("provider '{key}' failed validation: {message}")]
    ProviderValidation { key: String, message: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("invalid artifact path '{path}': {reason}")]
    PathInvalid { path: String, reason: String },

    #[error("path '{path}' escapes root '{root}'")]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("command '{command}' is not valid in state {state}")]
    InvalidCommand { command: String, state: String },

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("session '{id}' is corrupt: {reason}")]
    SessionCorrupt { id: String, reason: String },

    #[error("required file missing: {0}")]
    MissingFile(PathBuf),

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_context_errors(errors: &[ContextError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, EngineError>;
