//! Error types for the licensing core.

use std::path::PathBuf;

use thiserror::Error;

/// Licensing-specific errors.
///
/// Signature mismatches and policy violations (expiry, bindings) are not
/// errors: they are reported as [`crate::LicenseStatus`] values.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// A key file required for the operation does not exist.
    #[error("key not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    /// Key generation refused because a key pair is already present.
    #[error("keys already exist, use --force to overwrite")]
    KeysAlreadyExist,

    /// License creation refused because no key pair has been generated.
    #[error("signing keys not found, run 'genkeys' first")]
    KeysNotFound,

    /// Another key generation holds the key directory lock.
    #[error(
        "key generation already in progress (lock file {}); remove it if no generation is running",
        .0.display()
    )]
    KeyGenerationInProgress(PathBuf),

    /// Key pair generation or export failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Key material is malformed.
    #[error("invalid key material: {0}")]
    Crypto(String),

    /// The license record could not be parsed.
    #[error("invalid license format: {0}")]
    InvalidFormat(String),

    /// Caller supplied an unusable value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The local machine identity could not be read.
    #[error("cannot read machine identity: {0}")]
    Environment(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of [`LicenseError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A license or key source is missing.
    NotFound,
    /// A record could not be parsed.
    Format,
    /// Key material is malformed or a cryptographic operation failed.
    Crypto,
    /// The execution environment could not be queried.
    Environment,
    /// The caller asked for something that cannot be done.
    Input,
    /// Other filesystem failures.
    Io,
}

impl LicenseError {
    /// Returns the taxonomy bucket this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyNotFound(_) | Self::KeysNotFound => ErrorKind::NotFound,
            Self::InvalidFormat(_) | Self::Serialization(_) => ErrorKind::Format,
            Self::KeyGeneration(_) | Self::Signing(_) | Self::Crypto(_) => ErrorKind::Crypto,
            Self::Environment(_) => ErrorKind::Environment,
            Self::KeysAlreadyExist | Self::KeyGenerationInProgress(_) | Self::InvalidInput(_) => {
                ErrorKind::Input
            }
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
