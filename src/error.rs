//! Error handling for the runway core.
//!
//! Defines the core error kind enum, mapped 1:1 onto the error kinds in the
//! design doc, and a unified `Result` alias built on `anyhow` for
//! context-chained propagation everywhere a `CoreError` variant isn't the
//! precise thing callers need to branch on.

use thiserror::Error;

/// Core error kinds. HTTP handlers and the CLI both translate these into
/// their respective surface (status code / exit code); the variants
/// themselves carry no transport-specific information.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// CLI exit code for this error kind: 0 success, 1 usage error, 2
    /// operational failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Validation(_) => 1,
            _ => 2,
        }
    }
}

/// Result type alias used pervasively across the crate.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_usage_errors() {
        let err = CoreError::Validation("bad date".into());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn upstream_errors_are_operational_failures() {
        let err = CoreError::Upstream("timeout".into());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn error_messages_include_the_kind() {
        let err = CoreError::NotFound("account 42".into());
        assert_eq!(err.to_string(), "not found: account 42");
    }

    #[test]
    fn anyhow_context_chains_through_result_alias() {
        use anyhow::Context;
        let result: Result<()> =
            Err(anyhow::anyhow!("connection refused")).context("ingest run failed");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("ingest run failed"));
        assert!(format!("{err:?}").contains("connection refused"));
    }
}
