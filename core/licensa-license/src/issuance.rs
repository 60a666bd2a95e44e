//! Issuer-side key management and license creation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::error::{LicenseError, LicenseResult};
use crate::keys::{self, KeyPaths, PublicKeySource};
use crate::license::{License, LicenseBindings};
use crate::signing::KeyPair;

/// Default directory for the issuer key pair.
pub const DEFAULT_KEYS_DIR: &str = "keys";

/// Default directory for issued licenses.
pub const DEFAULT_LICENSES_DIR: &str = "licenses";

/// File extension of license records.
pub const LICENSE_EXTENSION: &str = "lic";

/// Parameters for a new license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRequest {
    /// Licensee name, must not be blank.
    pub customer: String,
    /// Last day the license is valid.
    pub expiry: NaiveDate,
    /// Allowed MAC addresses; empty means any machine.
    pub mac: Vec<String>,
    /// Allowed host names; empty means any host.
    pub host: Vec<String>,
    /// Output file; defaults to a name derived from the customer.
    pub output: Option<PathBuf>,
}

impl LicenseRequest {
    /// Unbound request written to the default location.
    pub fn new(customer: impl Into<String>, expiry: NaiveDate) -> Self {
        Self {
            customer: customer.into(),
            expiry,
            mac: Vec::new(),
            host: Vec::new(),
            output: None,
        }
    }

    /// Adds an allowed MAC address.
    #[must_use]
    pub fn bind_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac.push(mac.into());
        self
    }

    /// Adds an allowed host name.
    #[must_use]
    pub fn bind_host(mut self, host: impl Into<String>) -> Self {
        self.host.push(host.into());
        self
    }

    /// Writes the license to `path` instead of the licenses directory.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }
}

/// A signed license and where it was written.
#[derive(Debug, Clone)]
pub struct IssuedLicense {
    /// The signed license.
    pub license: License,
    /// File the record was written to.
    pub path: PathBuf,
}

/// The signing authority: owns the key directory and the license output directory.
pub struct Issuer {
    keys: KeyPaths,
    licenses_dir: PathBuf,
    clock: Box<dyn Clock>,
}

impl Default for Issuer {
    fn default() -> Self {
        Self::new(DEFAULT_KEYS_DIR, DEFAULT_LICENSES_DIR)
    }
}

impl Issuer {
    /// Issuer with keys in `keys_dir` and default license output in `licenses_dir`.
    pub fn new(keys_dir: impl AsRef<Path>, licenses_dir: impl Into<PathBuf>) -> Self {
        Self {
            keys: KeyPaths::in_dir(keys_dir),
            licenses_dir: licenses_dir.into(),
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the clock used by [`Issuer::verify_license`].
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Locations of the key pair.
    #[must_use]
    pub fn key_paths(&self) -> &KeyPaths {
        &self.keys
    }

    /// True once both key files are present.
    #[must_use]
    pub fn keys_exist(&self) -> bool {
        self.keys.exists()
    }

    /// Generates a new key pair and writes it to the key directory.
    ///
    /// Overwriting with `force` is destructive: previous keys are not backed
    /// up and licenses signed with them stop verifying against the new key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeysAlreadyExist`] if keys exist and `force` is false,
    /// and [`LicenseError::KeyGenerationInProgress`] while another generation
    /// holds the key directory lock.
    pub fn generate_keys(&self, force: bool) -> LicenseResult<(PathBuf, PathBuf)> {
        let keypair = KeyPair::generate();
        self.keys.write_keypair(&keypair, force)?;

        info!(
            public = %self.keys.public.display(),
            private = %self.keys.private.display(),
            "generated key pair"
        );
        Ok((self.keys.public.clone(), self.keys.private.clone()))
    }

    /// Signs a license without writing it, returning the record JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeysNotFound`] before any key has been generated.
    pub fn issue(
        &self,
        customer: &str,
        expiry: NaiveDate,
        bindings: LicenseBindings,
    ) -> LicenseResult<Vec<u8>> {
        self.sign_new(customer, expiry, bindings)?.to_json_pretty()
    }

    /// Signs a license and writes it to disk.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeysNotFound`] before any key has been generated.
    pub fn create_license(&self, request: LicenseRequest) -> LicenseResult<IssuedLicense> {
        let LicenseRequest {
            customer,
            expiry,
            mac,
            host,
            output,
        } = request;

        let license = self.sign_new(&customer, expiry, LicenseBindings::new(mac, host))?;

        let path = output.unwrap_or_else(|| {
            self.licenses_dir
                .join(format!("{}.{LICENSE_EXTENSION}", license_file_stem(&customer)))
        });
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, license.to_json_pretty()?)?;

        info!(
            customer = %license.customer(),
            expiry = %license.expiry(),
            path = %path.display(),
            "license created"
        );
        Ok(IssuedLicense { license, path })
    }

    /// Issuer-side sanity check: signature and expiry only, bindings are
    /// not evaluated. Never fails; problems are reported in the message.
    pub fn verify_license(&self, path: impl AsRef<Path>) -> (bool, String) {
        match self.check_license(path.as_ref()) {
            Ok(result) => result,
            Err(e) => (false, format!("Verification error: {e}")),
        }
    }

    fn check_license(&self, path: &Path) -> LicenseResult<(bool, String)> {
        let license = License::from_json(&fs::read(path)?)?;
        let key = PublicKeySource::FromFile(self.keys.public.clone()).load()?;

        if !license.verify_signature(&key) {
            return Ok((false, "Invalid signature".to_string()));
        }
        if license.is_expired_at(self.clock.now()) {
            return Ok((false, format!("License expired on {}", license.expiry())));
        }
        Ok((true, format!("License valid for {}", license.customer())))
    }

    fn sign_new(
        &self,
        customer: &str,
        expiry: NaiveDate,
        bindings: LicenseBindings,
    ) -> LicenseResult<License> {
        if !self.keys.exists() {
            return Err(LicenseError::KeysNotFound);
        }
        let license = License::new(customer, expiry, bindings)?;
        let key = keys::load_signing_key(&self.keys.private)?;
        license.sign(&key)
    }
}

/// Customer name with every non-alphanumeric character replaced by `_`, lowercased.
#[must_use]
pub fn license_file_stem(customer: &str) -> String {
    customer
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}
