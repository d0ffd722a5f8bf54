//! Error types, warnings, and exit codes for testmap-engine

use std::process::ExitCode;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to parse solution manifest {path}: {message}")]
    SolutionParse { path: String, message: String },

    #[error("Project file referenced by the solution is missing: {path}")]
    ProjectMissing { path: String },

    #[error("Project dependency cycle: {chain}")]
    DependencyCycle { chain: String },

    #[error("File is not part of the solution: {path}")]
    FileNotInSolution { path: String },

    #[error("Compilation of project '{project}' failed: {message}")]
    Compilation { project: String, message: String },

    #[error("Method id could not be resolved: {id}")]
    UnresolvedMethod { id: String },

    #[error("Invalid project pattern: {pattern}")]
    InvalidPattern { pattern: String },

    #[error("Cache entry failed integrity validation: {key}")]
    CacheIntegrity { key: String },

    #[error("Resource exhausted: {message}")]
    ResourceExhausted { message: String },

    #[error("Analysis of project '{project}' timed out after {seconds}s")]
    Timeout { project: String, seconds: u64 },

    #[error("Operation canceled")]
    Canceled,

    #[error("Internal invariant violated: {message}")]
    Internal { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convert error to the CLI exit code:
    /// - 0: success
    /// - 1: IO / missing files
    /// - 2: malformed input (solution, patterns, method ids)
    /// - 3: compilation or timeout failure
    /// - 4: internal invariant violation
    /// - 5: canceled
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) | Self::ProjectMissing { .. } | Self::FileNotInSolution { .. } => {
                ExitCode::from(1)
            }
            Self::SolutionParse { .. }
            | Self::DependencyCycle { .. }
            | Self::UnresolvedMethod { .. }
            | Self::InvalidPattern { .. } => ExitCode::from(2),
            Self::Compilation { .. } | Self::Timeout { .. } | Self::ResourceExhausted { .. } => {
                ExitCode::from(3)
            }
            Self::CacheIntegrity { .. } | Self::Internal { .. } => ExitCode::from(4),
            Self::Canceled => ExitCode::from(5),
        }
    }

    /// Whether the error aborts an operation or degrades to a warning.
    ///
    /// Only input errors, cancellation, and invariant violations abort;
    /// everything else is recovered locally and surfaced as a warning.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SolutionParse { .. }
                | Self::ProjectMissing { .. }
                | Self::DependencyCycle { .. }
                | Self::InvalidPattern { .. }
                | Self::Canceled
                | Self::Internal { .. }
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Category tag for structured warnings carried on result objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    Input,
    Compilation,
    Resolution,
    CacheIntegrity,
    ResourceExhaustion,
    Timeout,
}

/// A non-fatal problem surfaced alongside successful data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub category: WarningCategory,
    pub message: String,
}

impl Warning {
    pub fn new(category: WarningCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Completion status carried on every result object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Complete,
    Partial,
    Failed,
}

impl AnalysisStatus {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}
