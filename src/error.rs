//! Engine error taxonomy.
//!
//! Every failure a caller can observe from `validate` is one of these variants.
//! Absence of a template is NOT an error: it is a normal operating mode and
//! never surfaces here.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage that exceeded its time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    TemplateLookup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::TemplateLookup => write!(f, "template_lookup"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Unreadable, corrupt or unsupported input. The user must re-submit.
    #[error("Could not decode document: {0}")]
    Decode(String),

    /// Decode or template lookup exceeded the per-request budget.
    #[error("Timed out during {stage} after {budget_ms}ms")]
    Timeout { stage: Stage, budget_ms: u64 },

    /// Hash or template produced by a different engine version.
    #[error("Engine version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// A component produced data violating a model invariant.
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    /// The caller cancelled the request at a stage boundary.
    #[error("Validation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Only timeouts are worth retrying (with backoff) by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Stable machine-readable code for logs and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::Timeout { .. } => "timeout_error",
            Self::VersionMismatch { .. } => "version_mismatch_error",
            Self::InternalInvariant(_) => "internal_invariant_error",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
