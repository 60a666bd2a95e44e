//! The license entity, its machine bindings, and the persisted record form.
//!
//! A license file on disk looks like:
//!
//! ```json
//! {
//!   "payload": {
//!     "customer": "Acme",
//!     "expiry": "2099-01-01",
//!     "binds": { "mac": ["aa:bb:cc:dd:ee:ff"] }
//!   },
//!   "signature": "<base64>"
//! }
//! ```
//!
//! The signature covers the canonical encoding of `payload` (see
//! [`crate::canonical`]), never the pretty-printed file bytes.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::error::{LicenseError, LicenseResult};
use crate::signing;

/// Date format used for `expiry` in records and on the command line.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d";

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Machine-identity constraints attached to a license.
///
/// An empty category is unconstrained. Empty categories are left out of the
/// serialized form entirely, which keeps the signed payload minimal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseBindings {
    /// Allowed MAC addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mac: Vec<String>,
    /// Allowed host names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,
}

impl LicenseBindings {
    /// Creates bindings from MAC and host lists.
    #[must_use]
    pub fn new(mac: Vec<String>, host: Vec<String>) -> Self {
        Self { mac, host }
    }

    /// Returns true if either category constrains the machine.
    #[must_use]
    pub fn has_bindings(&self) -> bool {
        !self.mac.is_empty() || !self.host.is_empty()
    }

    /// Returns true if `mac` satisfies the MAC category.
    #[must_use]
    pub fn allows_mac(&self, mac: &str) -> bool {
        allowed(&self.mac, mac)
    }

    /// Returns true if `host` satisfies the host category.
    #[must_use]
    pub fn allows_host(&self, host: &str) -> bool {
        allowed(&self.host, host)
    }
}

fn allowed(set: &[String], value: &str) -> bool {
    if set.is_empty() {
        return true;
    }
    let value = value.to_lowercase();
    set.iter().any(|candidate| candidate.to_lowercase() == value)
}

/// The signed portion of a license record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    /// Customer the license was issued to.
    pub customer: String,
    /// Last day before the license lapses (UTC).
    pub expiry: NaiveDate,
    /// Machine bindings; absent means unconstrained.
    #[serde(default)]
    pub binds: LicenseBindings,
}

/// On-disk form of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Signed fields.
    pub payload: LicensePayload,
    /// Base64 signature, `null` when unsigned.
    #[serde(default)]
    pub signature: Option<String>,
}

/// A license grant.
///
/// Loaded licenses are read-only; the only mutation is [`License::sign`],
/// which consumes an unsigned license during issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    customer: String,
    expiry: NaiveDate,
    bindings: LicenseBindings,
    signature: Option<String>,
}

impl License {
    /// Creates an unsigned license.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidInput`] if `customer` is blank.
    pub fn new(
        customer: impl Into<String>,
        expiry: NaiveDate,
        bindings: LicenseBindings,
    ) -> LicenseResult<Self> {
        let customer = customer.into();
        if customer.trim().is_empty() {
            return Err(LicenseError::InvalidInput(
                "customer name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            customer,
            expiry,
            bindings,
            signature: None,
        })
    }

    /// Rebuilds a license from its persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidFormat`] if the record has no customer.
    pub fn from_record(record: LicenseRecord) -> LicenseResult<Self> {
        let LicenseRecord { payload, signature } = record;
        if payload.customer.trim().is_empty() {
            return Err(LicenseError::InvalidFormat(
                "payload.customer is empty".to_string(),
            ));
        }
        Ok(Self {
            customer: payload.customer,
            expiry: payload.expiry,
            bindings: payload.binds,
            signature,
        })
    }

    /// Parses a license from record JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidFormat`] if the bytes are not a record.
    pub fn from_json(bytes: &[u8]) -> LicenseResult<Self> {
        let record: LicenseRecord = serde_json::from_slice(bytes)
            .map_err(|e| LicenseError::InvalidFormat(e.to_string()))?;
        Self::from_record(record)
    }

    /// Returns the signed fields.
    #[must_use]
    pub fn payload(&self) -> LicensePayload {
        LicensePayload {
            customer: self.customer.clone(),
            expiry: self.expiry,
            binds: self.bindings.clone(),
        }
    }

    /// Returns the persisted form.
    #[must_use]
    pub fn to_record(&self) -> LicenseRecord {
        LicenseRecord {
            payload: self.payload(),
            signature: self.signature.clone(),
        }
    }

    /// Serializes the record as indented JSON.
    pub fn to_json_pretty(&self) -> LicenseResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.to_record())?)
    }

    /// Canonical bytes covered by the signature.
    pub fn canonical_payload(&self) -> LicenseResult<Vec<u8>> {
        canonical::encode_payload(&self.payload())
    }

    /// Signs the license, replacing any previous signature.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Signing`] if the signature cannot be produced.
    pub fn sign(mut self, key: &SigningKey) -> LicenseResult<Self> {
        let payload = self.canonical_payload()?;
        let signature = signing::sign(&payload, key)?;
        self.signature = Some(signing::encode_signature(&signature));
        Ok(self)
    }

    /// Checks the stored signature against `key`.
    ///
    /// Unsigned licenses, undecodable signatures and wrong keys all yield
    /// `false`.
    #[must_use]
    pub fn verify_signature(&self, key: &VerifyingKey) -> bool {
        let Some(signature) = self.signature.as_deref() else {
            return false;
        };
        match self.canonical_payload() {
            Ok(payload) => signing::verify_encoded(&payload, signature, key),
            Err(_) => false,
        }
    }

    /// Customer name.
    #[must_use]
    pub fn customer(&self) -> &str {
        &self.customer
    }

    /// Expiry date.
    #[must_use]
    pub fn expiry(&self) -> NaiveDate {
        self.expiry
    }

    /// Machine bindings.
    #[must_use]
    pub fn bindings(&self) -> &LicenseBindings {
        &self.bindings
    }

    /// Base64 signature, if signed.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// The instant the license stops being valid: midnight UTC starting the expiry day.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expiry.and_time(NaiveTime::MIN).and_utc()
    }

    /// Returns true once `now` is past [`License::expires_at`].
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Whole days left until expiry, rounded down; negative once expired.
    #[must_use]
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_seconds().div_euclid(SECS_PER_DAY)
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "License(customer={}, expiry={})", self.customer, self.expiry)
    }
}

/// Parses a `YYYY-MM-DD` expiry date.
///
/// # Errors
///
/// Returns [`LicenseError::InvalidInput`] for anything else.
pub fn parse_expiry(value: &str) -> LicenseResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), EXPIRY_FORMAT).map_err(|e| {
        LicenseError::InvalidInput(format!("expiry '{value}' is not a YYYY-MM-DD date: {e}"))
    })
}
