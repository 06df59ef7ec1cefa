//! Error types for the planner.
//!
//! Only input validation, I/O, serialization and internal invariant breaches
//! surface as errors. Placement failures and soft-constraint exceedances are
//! recorded in the allocation diagnostics instead.

use std::path::PathBuf;

/// Main planner error type
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// Unreadable or malformed input files, missing columns, bad constraints
    #[error("invalid input ({context}): {message}")]
    InputValidation { context: String, message: String },

    /// The caller cancelled the run
    #[error("analysis cancelled")]
    Cancelled,

    #[error("Unable to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write the workbook: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Unable to serialize the report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl PlannerError {
    pub fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputValidation {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error: 2 for validation, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputValidation { .. } => 2,
            _ => 1,
        }
    }
}

/// Failure of a single external categorization request.
#[derive(Debug, thiserror::Error)]
pub enum CategorizerError {
    #[error("Unable to start the categorizer helper: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Unable to communicate with the categorizer helper: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse categorizer output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("the categorizer helper exited")]
    Terminated,

    #[error("the categorizer reported an error: {0}")]
    Remote(String),
}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;
