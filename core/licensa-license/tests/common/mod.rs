//! Shared test helpers for license tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ed25519_dalek::SigningKey;
use licensa_license::{
    FixedClock, KeyPair, License, LicenseBindings, LicenseValidator, PublicKeySource,
    StaticIdentity,
};
use tempfile::TempDir;

pub const LOCAL_MAC: &str = "aa:bb:cc:dd:ee:ff";
pub const LOCAL_HOST: &str = "build-01";

/// Returns a deterministic key pair from a fixed seed.
pub fn test_keypair() -> KeyPair {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    KeyPair::from_signing_key(SigningKey::from_bytes(&seed))
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// Fixed "now" used by validation tests: 2030-06-15 12:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 15, 12, 0, 0).unwrap()
}

pub fn bindings(mac: &[&str], host: &[&str]) -> LicenseBindings {
    LicenseBindings::new(
        mac.iter().map(|s| s.to_string()).collect(),
        host.iter().map(|s| s.to_string()).collect(),
    )
}

/// Builds and signs a license.
pub fn signed_license(
    keypair: &KeyPair,
    customer: &str,
    expiry: &str,
    binds: LicenseBindings,
) -> License {
    License::new(customer, date(expiry), binds)
        .unwrap()
        .sign(&keypair.signing_key)
        .unwrap()
}

/// Writes a license record to `dir/name`.
pub fn write_license(dir: &Path, name: &str, license: &License) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, license.to_json_pretty().unwrap()).unwrap();
    path
}

/// Writes the public half of `keypair` as `dir/pub.pem`.
pub fn write_public_key(dir: &Path, keypair: &KeyPair) -> PathBuf {
    let (public, _) = keypair.to_pem().unwrap();
    let path = dir.join("pub.pem");
    fs::write(&path, public).unwrap();
    path
}

/// Validator with the fixed clock and the local test identity.
pub fn validator(license_path: &Path, key_source: PublicKeySource) -> LicenseValidator {
    LicenseValidator::new(license_path, key_source)
        .with_clock(FixedClock(now()))
        .with_identity(StaticIdentity::new(LOCAL_MAC, LOCAL_HOST))
}

/// Temp dir holding `license.lic` and `pub.pem` for `license`, verified with `keypair`.
pub fn license_fixture(keypair: &KeyPair, license: &License) -> (TempDir, LicenseValidator) {
    let dir = tempfile::tempdir().unwrap();
    let license_path = write_license(dir.path(), "license.lic", license);
    let key_path = write_public_key(dir.path(), keypair);
    let validator = validator(&license_path, PublicKeySource::FromFile(key_path));
    (dir, validator)
}
