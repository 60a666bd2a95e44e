mod common;

use std::fs;

use common::{
    LOCAL_HOST, LOCAL_MAC, bindings, license_fixture, now, signed_license, test_keypair,
    validator, write_license, write_public_key,
};
use licensa_license::{
    FixedClock, KeyPair, License, LicenseError, LicenseResult, LicenseStatus, MachineIdentity,
    PublicKeySource, StaticIdentity, signing,
};

/// Identity whose lookups fail where no value is configured.
struct PartialIdentity {
    mac: Option<&'static str>,
    host: Option<&'static str>,
}

impl MachineIdentity for PartialIdentity {
    fn primary_mac(&self) -> LicenseResult<String> {
        self.mac
            .map(str::to_string)
            .ok_or_else(|| LicenseError::Environment("no nic".into()))
    }

    fn hostname(&self) -> LicenseResult<String> {
        self.host
            .map(str::to_string)
            .ok_or_else(|| LicenseError::Environment("no hostname".into()))
    }
}

#[test]
fn valid_license_reports_customer_and_days_left() {
    let kp = KeyPair::generate();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);

    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::Valid);
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.message.contains("Acme"));
    let days: i64 = outcome
        .message
        .split("Expires in ")
        .nth(1)
        .and_then(|rest| rest.split(' ').next())
        .and_then(|n| n.parse().ok())
        .expect("message carries a day count");
    assert!(days > 0);
    assert_eq!(outcome.license.unwrap().customer(), "Acme");
}

#[test]
fn expired_license_names_the_date() {
    let kp = KeyPair::generate();
    let license = signed_license(&kp, "Acme", "2000-01-01", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);

    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::Expired);
    assert_eq!(outcome.exit_code(), 4);
    assert!(outcome.message.contains("2000-01-01"));
    assert!(outcome.license.is_some());
}

#[test]
fn wrong_public_key_is_invalid_signature() {
    let key_a = KeyPair::generate();
    let key_b = KeyPair::generate();
    let license = signed_license(&key_a, "Acme", "2099-01-01", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&key_b, &license);

    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::InvalidSignature);
    assert!(outcome.license.is_none());
}

#[test]
fn mac_mismatch_names_both_values() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&["11:22:33:44:55:66"], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);

    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::MacMismatch);
    assert!(outcome.message.contains("11:22:33:44:55:66"));
    assert!(outcome.message.contains(LOCAL_MAC));
    assert!(outcome.license.is_some());
}

#[test]
fn hostname_mismatch_after_mac_satisfied() {
    let kp = test_keypair();
    let license = signed_license(
        &kp,
        "Acme",
        "2099-01-01",
        bindings(&[LOCAL_MAC], &["build-02", "build-03"]),
    );
    let (_dir, validator) = license_fixture(&kp, &license);

    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::HostnameMismatch);
    assert_eq!(outcome.exit_code(), 6);
    assert!(outcome.message.contains(LOCAL_HOST));
    assert!(outcome.message.contains("build-02, build-03"));
}

#[test]
fn mac_is_checked_before_hostname() {
    let kp = test_keypair();
    let license = signed_license(
        &kp,
        "Acme",
        "2099-01-01",
        bindings(&["11:22:33:44:55:66"], &["elsewhere"]),
    );
    let (_dir, validator) = license_fixture(&kp, &license);
    assert_eq!(validator.validate().status, LicenseStatus::MacMismatch);
}

#[test]
fn bindings_compare_case_insensitively() {
    let kp = test_keypair();
    let license = signed_license(
        &kp,
        "Acme",
        "2099-01-01",
        bindings(&["AA:BB:CC:DD:EE:FF"], &["BUILD-01"]),
    );
    let (_dir, validator) = license_fixture(&kp, &license);
    assert_eq!(validator.validate().status, LicenseStatus::Valid);
}

#[test]
fn unbound_license_validates_on_any_machine() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[], &[]));
    let (dir, _) = license_fixture(&kp, &license);

    for (mac, host) in [("00:11:22:33:44:55", "alpha"), ("ff:ee:dd:cc:bb:aa", "omega")] {
        let outcome = validator(
            &dir.path().join("license.lic"),
            PublicKeySource::FromFile(dir.path().join("pub.pem")),
        )
        .with_identity(StaticIdentity::new(mac, host))
        .validate();
        assert_eq!(outcome.status, LicenseStatus::Valid);
    }
}

#[test]
fn bindings_can_be_skipped() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&["11:22:33:44:55:66"], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);
    let outcome = validator.require_bindings(false).validate();
    assert_eq!(outcome.status, LicenseStatus::Valid);
}

#[test]
fn invalid_signature_wins_over_expiry_and_bindings() {
    let signer = test_keypair();
    let other = KeyPair::generate();
    let license = signed_license(
        &signer,
        "Acme",
        "2000-01-01",
        bindings(&["11:22:33:44:55:66"], &["elsewhere"]),
    );
    let (_dir, validator) = license_fixture(&other, &license);

    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::InvalidSignature);
    assert!(!outcome.message.contains("2000-01-01"));
    assert!(!outcome.message.contains("11:22:33:44:55:66"));
}

#[test]
fn expiry_wins_over_binding_mismatch() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2000-01-01", bindings(&["11:22:33:44:55:66"], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);
    assert_eq!(validator.validate().status, LicenseStatus::Expired);
}

#[test]
fn missing_license_file() {
    let kp = test_keypair();
    let dir = tempfile::tempdir().unwrap();
    let key_path = write_public_key(dir.path(), &kp);
    let outcome = validator(&dir.path().join("absent.lic"), PublicKeySource::FromFile(key_path))
        .validate();
    assert_eq!(outcome.status, LicenseStatus::FileNotFound);
    assert_eq!(outcome.exit_code(), 2);
    assert!(outcome.message.contains("absent.lic"));
    assert!(outcome.license.is_none());
}

#[test]
fn garbage_license_is_invalid_format() {
    let kp = test_keypair();
    let dir = tempfile::tempdir().unwrap();
    let key_path = write_public_key(dir.path(), &kp);

    for (name, contents) in [
        ("not-json.lic", "this is not json"),
        ("no-payload.lic", r#"{"signature": "abc"}"#),
        ("bad-date.lic", r#"{"payload": {"customer": "Acme", "expiry": "soon"}, "signature": null}"#),
    ] {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        let outcome = validator(&path, PublicKeySource::FromFile(key_path.clone())).validate();
        assert_eq!(outcome.status, LicenseStatus::InvalidFormat, "{name}");
        assert_eq!(outcome.exit_code(), 7);
    }
}

#[cfg(unix)]
#[test]
fn unreadable_license_file_is_file_not_found() {
    use std::os::unix::fs::PermissionsExt;

    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[], &[]));
    let (dir, validator) = license_fixture(&kp, &license);
    let path = dir.path().join("license.lic");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&path).is_ok() {
        // Running as root: permission bits are not enforced.
        return;
    }

    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::FileNotFound);
    assert_eq!(outcome.exit_code(), 2);
    assert!(outcome.message.contains("not readable"));
    assert!(outcome.license.is_none());
}

#[test]
fn identity_failure_on_bound_license_is_unknown_error() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[LOCAL_MAC], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);

    let outcome = validator
        .with_identity(PartialIdentity { mac: None, host: None })
        .validate();
    assert_eq!(outcome.status, LicenseStatus::UnknownError);
    assert_eq!(outcome.exit_code(), 99);
    assert!(outcome.message.contains("machine identity"));
    assert!(outcome.message.contains("no nic"));
    assert!(outcome.license.is_none());
}

#[test]
fn identity_failure_on_host_binding_is_unknown_error() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[LOCAL_MAC], &[LOCAL_HOST]));
    let (_dir, validator) = license_fixture(&kp, &license);

    let outcome = validator
        .with_identity(PartialIdentity { mac: Some(LOCAL_MAC), host: None })
        .validate();
    assert_eq!(outcome.status, LicenseStatus::UnknownError);
    assert!(outcome.message.contains("no hostname"));
}

#[test]
fn identity_is_not_queried_for_unbound_categories() {
    let kp = test_keypair();

    let unbound = signed_license(&kp, "Acme", "2099-01-01", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &unbound);
    let outcome = validator
        .with_identity(PartialIdentity { mac: None, host: None })
        .validate();
    assert_eq!(outcome.status, LicenseStatus::Valid);

    let mac_only = signed_license(&kp, "Acme", "2099-01-01", bindings(&[LOCAL_MAC], &[]));
    let (_dir, validator) = license_fixture(&kp, &mac_only);
    let outcome = validator
        .with_identity(PartialIdentity { mac: Some(LOCAL_MAC), host: None })
        .validate();
    assert_eq!(outcome.status, LicenseStatus::Valid);

    let host_only = signed_license(&kp, "Acme", "2099-01-01", bindings(&[], &[LOCAL_HOST]));
    let (_dir, validator) = license_fixture(&kp, &host_only);
    let outcome = validator
        .with_identity(PartialIdentity { mac: None, host: Some(LOCAL_HOST) })
        .validate();
    assert_eq!(outcome.status, LicenseStatus::Valid);
}

#[test]
fn directory_instead_of_file_is_unknown_error() {
    let kp = test_keypair();
    let dir = tempfile::tempdir().unwrap();
    let key_path = write_public_key(dir.path(), &kp);
    let outcome = validator(dir.path(), PublicKeySource::FromFile(key_path)).validate();
    assert_eq!(outcome.status, LicenseStatus::UnknownError);
    assert_eq!(outcome.exit_code(), 99);
}

#[test]
fn unsigned_or_garbled_signature_is_invalid_signature() {
    let kp = test_keypair();
    let dir = tempfile::tempdir().unwrap();
    let key_path = write_public_key(dir.path(), &kp);

    let unsigned = License::new("Acme", common::date("2099-01-01"), bindings(&[], &[])).unwrap();
    let path = write_license(dir.path(), "unsigned.lic", &unsigned);
    let outcome = validator(&path, PublicKeySource::FromFile(key_path.clone())).validate();
    assert_eq!(outcome.status, LicenseStatus::InvalidSignature);

    let path = dir.path().join("garbled.lic");
    fs::write(
        &path,
        r#"{"payload": {"customer": "Acme", "expiry": "2099-01-01", "binds": {}}, "signature": "%%%"}"#,
    )
    .unwrap();
    let outcome = validator(&path, PublicKeySource::FromFile(key_path)).validate();
    assert_eq!(outcome.status, LicenseStatus::InvalidSignature);
}

#[test]
fn tampered_record_fails_signature() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2030-01-01", bindings(&[], &[]));
    let (dir, validator) = license_fixture(&kp, &license);

    let path = dir.path().join("license.lic");
    let raw = fs::read_to_string(&path).unwrap();
    fs::write(&path, raw.replace("2030-01-01", "2099-01-01")).unwrap();

    assert_eq!(validator.validate().status, LicenseStatus::InvalidSignature);
}

#[test]
fn missing_public_key_is_invalid_signature() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[], &[]));
    let dir = tempfile::tempdir().unwrap();
    let path = write_license(dir.path(), "license.lic", &license);
    let outcome = validator(&path, PublicKeySource::FromFile(dir.path().join("nope.pem"))).validate();
    assert_eq!(outcome.status, LicenseStatus::InvalidSignature);
}

#[test]
fn embedded_key_takes_priority_over_file() {
    let signer = test_keypair();
    let decoy = KeyPair::generate();
    let license = signed_license(&signer, "Acme", "2099-01-01", bindings(&[], &[]));
    let dir = tempfile::tempdir().unwrap();
    let path = write_license(dir.path(), "license.lic", &license);
    let decoy_path = write_public_key(dir.path(), &decoy);

    let (embedded, _) = signer.to_pem().unwrap();
    let source = PublicKeySource::resolve(Some(&embedded), decoy_path.clone());
    assert_eq!(validator(&path, source).validate().status, LicenseStatus::Valid);

    let source = PublicKeySource::resolve(None, decoy_path);
    assert_eq!(validator(&path, source).validate().status, LicenseStatus::InvalidSignature);
}

#[test]
fn expiry_day_itself_is_already_expired_after_midnight() {
    let kp = test_keypair();
    // now() is 2030-06-15 12:00 UTC
    let license = signed_license(&kp, "Acme", "2030-06-15", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);
    assert_eq!(validator.validate().status, LicenseStatus::Expired);

    let license = signed_license(&kp, "Acme", "2030-06-16", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);
    let outcome = validator.validate();
    assert_eq!(outcome.status, LicenseStatus::Valid);
    assert!(outcome.message.contains("Expires in 0 days"));
}

#[test]
fn clock_controls_expiry() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2030-01-01", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);
    let before = now() - chrono::Duration::days(365);
    assert_eq!(
        validator.with_clock(FixedClock(before)).validate().status,
        LicenseStatus::Valid
    );
}

#[test]
fn gate_runs_business_logic_only_when_valid() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &license);
    let greeting = validator
        .validate()
        .gate(|license| format!("Hello, {}", license.customer()))
        .unwrap();
    assert_eq!(greeting, "Hello, Acme");

    let expired = signed_license(&kp, "Acme", "2000-01-01", bindings(&[], &[]));
    let (_dir, validator) = license_fixture(&kp, &expired);
    let mut ran = false;
    let result = validator.validate().gate(|_| ran = true);
    assert!(result.is_err());
    assert!(!ran);
}

#[test]
fn record_signature_matches_manual_verification() {
    let kp = test_keypair();
    let license = signed_license(&kp, "Acme", "2099-01-01", bindings(&[LOCAL_MAC], &[]));
    let payload = license.canonical_payload().unwrap();
    assert!(signing::verify_encoded(
        &payload,
        license.signature().unwrap(),
        &kp.verifying_key
    ));
}
