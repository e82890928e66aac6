// Service-level error taxonomy. Every operation a request can reach returns
// one of these; the HTTP layer maps each variant to a status code.

use cfmpicks_core::league_code::LeagueCodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("upstream failure: {0:#}")]
    Upstream(#[from] anyhow::Error),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Short, stable label for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized(_) => "Unauthorized",
            ServiceError::Forbidden(_) => "Forbidden",
            ServiceError::NotFound(_) => "Not found",
            ServiceError::Validation(_) => "Invalid request",
            ServiceError::Upstream(_) => "Internal error",
            ServiceError::Unavailable(_) => "Service unavailable",
        }
    }

    /// Human-readable detail for the caller.
    pub fn details(&self) -> String {
        match self {
            ServiceError::Unauthorized(d)
            | ServiceError::Forbidden(d)
            | ServiceError::NotFound(d)
            | ServiceError::Validation(d)
            | ServiceError::Unavailable(d) => d.clone(),
            ServiceError::Upstream(e) => format!("{e:#}"),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }
}

impl From<LeagueCodeError> for ServiceError {
    fn from(e: LeagueCodeError) -> Self {
        match e {
            LeagueCodeError::Malformed(_) => ServiceError::Validation(e.to_string()),
            LeagueCodeError::Exhausted { .. } => ServiceError::Upstream(e.into()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn upstream_details_include_context_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("disk full")).context("failed to save");
        let err = ServiceError::from(err.unwrap_err());
        assert_eq!(err.kind(), "Internal error");
        assert_eq!(err.details(), "failed to save: disk full");
    }

    #[test]
    fn malformed_code_is_validation() {
        let err = ServiceError::from(LeagueCodeError::Malformed("x".into()));
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
