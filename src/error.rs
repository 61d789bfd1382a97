//! Central error types for the MyApp operator
//!
//! Uses `thiserror` for ergonomic, type-safe error handling with
//! automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Central error type for the MyApp operator
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error from kube-rs
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Resource not found in the cluster
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Write rejected because it was based on a stale resourceVersion
    #[error("Conflict writing {kind}/{name}: object was modified")]
    Conflict { kind: String, name: String },

    /// Create rejected because the object already exists
    #[error("{kind}/{name} already exists")]
    AlreadyExists { kind: String, name: String },

    /// A precondition the controller relies on does not hold
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// MyApp spec validation error
    #[error("Spec validation error: {0}")]
    ValidationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A reconciliation step failed for a specific managed object
    #[error("Failed to reconcile {kind}/{name}: {source}")]
    Reconcile {
        kind: &'static str,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wrap an error with the kind and name of the object being reconciled
    pub fn context(self, kind: &'static str, name: impl Into<String>) -> Self {
        Error::Reconcile {
            kind,
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error type should trigger a fast retry
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_) | Error::Conflict { .. } | Error::AlreadyExists { .. } => true,
            Error::Reconcile { source, .. } => source.is_retriable(),
            _ => false,
        }
    }

    /// Check if this is a stale-write rejection
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict { .. } => true,
            Error::Reconcile { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    /// Convert to a human-readable message for status updates
    pub fn status_message(&self) -> String {
        match self {
            Error::KubeError(e) => format!("Kubernetes error: {}", e),
            Error::ValidationError(msg) => format!("Validation failed: {}", msg),
            Error::InvariantViolation(msg) => msg.clone(),
            Error::Reconcile { kind, name, source } => {
                format!("{} {}: {}", kind, name, source.status_message())
            }
            _ => self.to_string(),
        }
    }
}
