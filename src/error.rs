//! Container error taxonomy

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("container: registry not ready")]
    NotReady,
    #[error("container: not found")]
    NotFound,
    #[error("container: invalid format")]
    InvalidFormat,
    #[error("container: unsupported auth type")]
    Unsupported,
    #[error("container: buffer too small")]
    BufferTooSmall,
    #[error("container: security violation")]
    SecurityViolation,
    #[error("container: decompression failed")]
    DecompressFailure,
    #[error("container: registry full")]
    OutOfCapacity,
    #[error("container: invalid argument")]
    InvalidArgument,
}

impl ContainerError {
    pub fn as_str(self) -> &'static str {
        use ContainerError::*;
        match self {
            NotReady => "container: registry not ready",
            NotFound => "container: not found",
            InvalidFormat => "container: invalid format",
            Unsupported => "container: unsupported auth type",
            BufferTooSmall => "container: buffer too small",
            SecurityViolation => "container: security violation",
            DecompressFailure => "container: decompression failed",
            OutOfCapacity => "container: registry full",
            InvalidArgument => "container: invalid argument",
        }
    }

    /// True for failures that must stop use of the component but leave the
    /// registry untouched.
    pub fn is_integrity_failure(self) -> bool {
        matches!(self, ContainerError::SecurityViolation | ContainerError::InvalidFormat)
    }
}

pub type Result<T> = core::result::Result<T, ContainerError>;
