//! Error kinds surfaced by the session wizard and the reporting engine.
//!
//! Collaborators (record store, roster provider) speak `anyhow`; their
//! failures are converted into one of these kinds at the boundary so callers
//! only ever match on `AttendanceError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Rejected before any store interaction; wizard state is unchanged.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not available in the wizard's current stage.
    #[error("cannot {action} while in stage {stage}")]
    InvalidTransition {
        action: &'static str,
        stage: &'static str,
    },

    #[error("failed to read {what}: {message}")]
    StoreRead { what: String, message: String },

    #[error("failed to write attendance for subject {subject_code}: {message}")]
    StoreWrite {
        subject_code: String,
        message: String,
    },

    /// A stored document did not match the record schema.
    #[error("malformed record {key}: {reason}")]
    DataShape { key: String, reason: String },
}

impl AttendanceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn store_read(what: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::StoreRead {
            what: what.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn store_write(subject_code: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::StoreWrite {
            subject_code: subject_code.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidTransition { .. })
    }
}

pub type AttendanceResult<T> = std::result::Result<T, AttendanceError>;
