//! Client-side license validation.
//!
//! [`LicenseValidator::validate`] runs a fixed sequence of checks and stops
//! at the first failure:
//!
//! 1. load and parse the license record
//! 2. verify the signature
//! 3. check expiry
//! 4. check the MAC binding, then the host binding
//!
//! Nothing about expiry or bindings is reported until the signature is
//! trusted, and an expired license reports `Expired` rather than a binding
//! mismatch.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::LicenseError;
use crate::keys::PublicKeySource;
use crate::license::License;
use crate::machine::{MachineIdentity, SystemIdentity};

/// Terminal result of a validation run.
///
/// The numeric [`code`](LicenseStatus::code) doubles as the client's
/// process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    /// Every check passed.
    Valid,
    /// The license file is missing or unreadable.
    FileNotFound,
    /// Unsigned, tampered, or signed by another key.
    InvalidSignature,
    /// The expiry date has passed.
    Expired,
    /// This machine's MAC address is not in the binding list.
    MacMismatch,
    /// This machine's host name is not in the binding list.
    HostnameMismatch,
    /// The file is not a well-formed license record.
    InvalidFormat,
    /// Any other failure, including unreadable machine identity.
    UnknownError,
}

impl LicenseStatus {
    /// Stable numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Valid => 0,
            Self::FileNotFound => 2,
            Self::InvalidSignature => 3,
            Self::Expired => 4,
            Self::MacMismatch => 5,
            Self::HostnameMismatch => 6,
            Self::InvalidFormat => 7,
            Self::UnknownError => 99,
        }
    }

    /// Returns true for [`LicenseStatus::Valid`].
    #[must_use]
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Valid => "VALID",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Expired => "EXPIRED",
            Self::MacMismatch => "MAC_MISMATCH",
            Self::HostnameMismatch => "HOSTNAME_MISMATCH",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::UnknownError => "UNKNOWN_ERROR",
        };
        f.write_str(name)
    }
}

/// Status, human-readable message, and the license when it was trusted.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// First failing check, or `Valid`.
    pub status: LicenseStatus,
    /// Human-readable explanation.
    pub message: String,
    /// Present once the signature was trusted.
    pub license: Option<License>,
}

impl ValidationOutcome {
    fn new(status: LicenseStatus, message: impl Into<String>, license: Option<License>) -> Self {
        Self {
            status,
            message: message.into(),
            license,
        }
    }

    fn rejected(status: LicenseStatus, message: impl Into<String>) -> Self {
        Self::new(status, message, None)
    }

    /// Returns true if every check passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.status.code()
    }

    /// Runs `f` with the license only if validation succeeded; otherwise
    /// hands the outcome back.
    pub fn gate<T>(self, f: impl FnOnce(&License) -> T) -> Result<T, Self> {
        if self.status.is_valid() {
            if let Some(license) = &self.license {
                return Ok(f(license));
            }
        }
        Err(self)
    }
}

/// Validates a license file against a trusted public key and the local machine.
pub struct LicenseValidator {
    license_path: PathBuf,
    key_source: PublicKeySource,
    identity: Box<dyn MachineIdentity>,
    clock: Box<dyn Clock>,
    require_bindings: bool,
}

impl LicenseValidator {
    /// Validator using the system identity and wall clock.
    pub fn new(license_path: impl Into<PathBuf>, key_source: PublicKeySource) -> Self {
        Self {
            license_path: license_path.into(),
            key_source,
            identity: Box::new(SystemIdentity),
            clock: Box::new(SystemClock),
            require_bindings: true,
        }
    }

    /// Replaces the machine identity provider.
    #[must_use]
    pub fn with_identity(mut self, identity: impl MachineIdentity + 'static) -> Self {
        self.identity = Box::new(identity);
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Enables or disables binding enforcement (on by default).
    #[must_use]
    pub fn require_bindings(mut self, require: bool) -> Self {
        self.require_bindings = require;
        self
    }

    /// License file this validator reads.
    #[must_use]
    pub fn license_path(&self) -> &Path {
        &self.license_path
    }

    /// Runs every check and returns the first failing status, or `Valid`.
    pub fn validate(&self) -> ValidationOutcome {
        let outcome = self.run();
        if outcome.is_valid() {
            info!(status = %outcome.status, "{}", outcome.message);
        } else {
            warn!(status = %outcome.status, code = outcome.exit_code(), "{}", outcome.message);
        }
        outcome
    }

    fn run(&self) -> ValidationOutcome {
        let license = match self.load() {
            Ok(license) => license,
            Err(outcome) => return outcome,
        };
        debug!("loaded {license}");

        if !self.signature_valid(&license) {
            return ValidationOutcome::rejected(
                LicenseStatus::InvalidSignature,
                "Invalid license signature",
            );
        }

        let now = self.clock.now();
        if license.is_expired_at(now) {
            let message = format!("License expired on {}", license.expiry());
            return ValidationOutcome::new(LicenseStatus::Expired, message, Some(license));
        }

        let license = if self.require_bindings {
            match self.check_bindings(license) {
                Ok(license) => license,
                Err(outcome) => return outcome,
            }
        } else {
            license
        };

        let message = format!(
            "License valid for {}. Expires in {} days.",
            license.customer(),
            license.days_until_expiry(now)
        );
        ValidationOutcome::new(LicenseStatus::Valid, message, Some(license))
    }

    fn load(&self) -> Result<License, ValidationOutcome> {
        let path = self.license_path.display();
        let bytes = fs::read(&self.license_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ValidationOutcome::rejected(
                LicenseStatus::FileNotFound,
                format!("License file not found: {path}"),
            ),
            io::ErrorKind::PermissionDenied => ValidationOutcome::rejected(
                LicenseStatus::FileNotFound,
                format!("License file not readable: {path} ({e})"),
            ),
            _ => ValidationOutcome::rejected(
                LicenseStatus::UnknownError,
                format!("Error loading license: {e}"),
            ),
        })?;

        License::from_json(&bytes).map_err(|e| match e {
            LicenseError::InvalidFormat(detail) => ValidationOutcome::rejected(
                LicenseStatus::InvalidFormat,
                format!("Invalid license file format: {detail}"),
            ),
            other => ValidationOutcome::rejected(
                LicenseStatus::UnknownError,
                format!("Error loading license: {other}"),
            ),
        })
    }

    fn signature_valid(&self, license: &License) -> bool {
        if license.signature().is_none() {
            debug!("license carries no signature");
            return false;
        }
        match self.key_source.load() {
            Ok(key) => license.verify_signature(&key),
            Err(e) => {
                warn!("public key unavailable: {e}");
                false
            }
        }
    }

    fn check_bindings(&self, license: License) -> Result<License, ValidationOutcome> {
        let bindings = license.bindings();

        if !bindings.mac.is_empty() {
            let current = self.identity.primary_mac().map_err(identity_failure)?;
            if !bindings.allows_mac(&current) {
                let message = format!(
                    "MAC mismatch. Current: {current}, Allowed: [{}]",
                    bindings.mac.join(", ")
                );
                return Err(ValidationOutcome::new(
                    LicenseStatus::MacMismatch,
                    message,
                    Some(license),
                ));
            }
        }

        if !bindings.host.is_empty() {
            let current = self.identity.hostname().map_err(identity_failure)?;
            if !bindings.allows_host(&current) {
                let message = format!(
                    "Hostname mismatch. Current: {current}, Allowed: [{}]",
                    bindings.host.join(", ")
                );
                return Err(ValidationOutcome::new(
                    LicenseStatus::HostnameMismatch,
                    message,
                    Some(license),
                ));
            }
        }

        Ok(license)
    }
}

fn identity_failure(err: LicenseError) -> ValidationOutcome {
    ValidationOutcome::rejected(
        LicenseStatus::UnknownError,
        format!("Error reading machine identity: {err}"),
    )
}
