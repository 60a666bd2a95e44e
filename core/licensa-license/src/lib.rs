//! Signed license issuance and validation for Licensa.
//!
//! This crate handles:
//! - Key pair generation and PEM key files for the issuing authority
//! - Canonical encoding and signing of license payloads
//! - Client-side validation: signature, expiry, and machine bindings
//!
//! # License Format
//!
//! A license is a JSON record `{ "payload": {...}, "signature": "<base64>" }`.
//! The payload holds the customer, an expiry date, and optional MAC/host
//! bindings. The signature is Ed25519 over the SHA-256 digest of the
//! payload's canonical encoding (sorted keys, fixed separators, ASCII only),
//! so issuer and verifier always hash identical bytes.
//!
//! # Validation Order
//!
//! Parse, signature, expiry, MAC binding, host binding. The first failure
//! determines the [`LicenseStatus`]; validation never returns an error.

pub mod canonical;
mod clock;
mod error;
mod issuance;
mod keys;
mod license;
mod machine;
pub mod signing;
mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorKind, LicenseError, LicenseResult};
pub use issuance::{
    DEFAULT_KEYS_DIR, DEFAULT_LICENSES_DIR, IssuedLicense, Issuer, LICENSE_EXTENSION,
    LicenseRequest, license_file_stem,
};
pub use keys::{KeyPaths, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE, PublicKeySource, load_signing_key};
pub use license::{
    EXPIRY_FORMAT, License, LicenseBindings, LicensePayload, LicenseRecord, parse_expiry,
};
pub use machine::{
    MachineFingerprint, MachineIdentity, StaticIdentity, SystemIdentity, normalize_mac,
};
pub use signing::KeyPair;
pub use validation::{LicenseStatus, LicenseValidator, ValidationOutcome};
