use thiserror::Error;

/// Failures raised by the domain layer. I/O failures travel as `anyhow` errors
/// with context; these are the ones a caller may want to match on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngagementError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("role '{role}' lacks the '{permission}' permission")]
    PermissionDenied { role: String, permission: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl EngagementError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
