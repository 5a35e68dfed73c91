//! Infrastructure API error classification
//!
//! Collaborators wrap an [`InfraError`] in the `anyhow::Error` they return;
//! the coordinator recovers it by walking the error chain instead of matching
//! on message text.

use thiserror::Error;

/// Infrastructure API error categories used by cleanup and reporting
#[derive(Debug, Error)]
pub enum InfraError {
    /// Resource was not found (safe to skip in cleanup)
    #[error("Resource not found: {resource_type} '{resource_id}'")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// Credentials rejected or missing permission
    #[error("Request rejected by the infrastructure API: {0}")]
    Unauthorized(String),

    /// Generic API error with optional status code
    #[error("Infrastructure API error: {message}")]
    Api { code: Option<u16>, message: String },
}

impl InfraError {
    /// Create a not-found error for a resource
    pub fn not_found(resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, InfraError::NotFound { .. })
    }
}

/// Find the first [`InfraError`] in an error chain, if any.
pub fn classify_anyhow_error(error: &anyhow::Error) -> Option<&InfraError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<InfraError>())
}

/// Check whether an error chain reports a missing resource.
pub fn is_not_found(error: &anyhow::Error) -> bool {
    classify_anyhow_error(error).is_some_and(InfraError::is_not_found)
}
