use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// One backend could not decode an archive. Recoverable: the next backend is tried.
    #[error("Extraction backend '{backend}' failed: {message}")]
    ExtractionBackendFailure { backend: String, message: String },
    #[error("Archive unsupported or corrupt: {0}")]
    ArchiveUnsupportedOrCorrupt(String),
    #[error("No payload found: {0}")]
    NoPayloadFound(String),
    #[error("Backup missing or empty: {0}")]
    BackupMissingOrEmpty(String),
    #[error("Partial copy failure: {copied} copied, {failed} failed ({detail})")]
    PartialCopyFailure {
        copied: usize,
        failed: usize,
        detail: String,
    },
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Operation in progress: {0}")]
    Busy(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    pub fn backend(backend: impl Into<String>, message: impl ToString) -> Self {
        VaultError::ExtractionBackendFailure {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// Wraps an I/O failure with the operation and path it happened on.
    pub fn io_at(action: &str, path: &std::path::Path, error: std::io::Error) -> Self {
        VaultError::Io(format!("{action} '{}': {error}", path.display()))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(error: std::io::Error) -> Self {
        VaultError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(error: serde_json::Error) -> Self {
        VaultError::Config(error.to_string())
    }
}

impl From<walkdir::Error> for VaultError {
    fn from(error: walkdir::Error) -> Self {
        VaultError::Io(error.to_string())
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(error: tokio::task::JoinError) -> Self {
        VaultError::Internal(format!("Background task failed: {error}"))
    }
}

impl Serialize for VaultError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
#[path = "tests/errors_tests.rs"]
mod tests;
