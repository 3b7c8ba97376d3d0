//! Error types for the SMS code relay.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failure reported by an external collaborator (clipboard, store, shell...).
///
/// None of these are fatal: the pipeline logs them at the step boundary
/// and moves on to the next independent step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// Missing permission or privilege.
    #[error("Capability {capability} denied: {reason}")]
    CapabilityDenied { capability: String, reason: String },

    /// The collaborator could not be reached at all.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable { collaborator: String, reason: String },

    /// The collaborator was reached but the operation did not succeed.
    #[error("{collaborator} failed: {reason}")]
    Failed { collaborator: String, reason: String },
}

impl CollaboratorError {
    pub fn denied(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CapabilityDenied {
            capability: capability.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(collaborator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator: collaborator.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(collaborator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            collaborator: collaborator.into(),
            reason: reason.into(),
        }
    }

    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CapabilityDenied { .. } => "capability_denied",
            Self::Unavailable { .. } => "unavailable",
            Self::Failed { .. } => "failed",
        }
    }
}

impl From<DatabaseError> for CollaboratorError {
    fn from(e: DatabaseError) -> Self {
        Self::unavailable("message store", e.to_string())
    }
}

/// Queue/worker plumbing errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline queue {0} is closed")]
    QueueClosed(String),

    #[error("Pipeline worker failed: {0}")]
    Worker(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
