//! Key material resolution and storage.
//!
//! Verification keys come either from a key baked into the client binary or
//! from a PEM file; signing keys only ever come from the issuer's private
//! key file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{LicenseError, LicenseResult};
use crate::signing::{self, KeyPair};

/// Public key file name inside the issuer key directory.
pub const PUBLIC_KEY_FILE: &str = "pub.pem";

/// Private key file name inside the issuer key directory.
pub const PRIVATE_KEY_FILE: &str = "priv.pem";

const LOCK_FILE: &str = ".keygen.lock";

/// Where the trusted public key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeySource {
    /// PEM text compiled into the running program.
    Embedded(String),
    /// PEM file on disk.
    FromFile(PathBuf),
}

impl PublicKeySource {
    /// Prefers a non-empty embedded key, falling back to the file at `path`.
    pub fn resolve(embedded: Option<&str>, path: impl Into<PathBuf>) -> Self {
        match embedded.map(str::trim).filter(|pem| !pem.is_empty()) {
            Some(pem) => Self::Embedded(pem.to_string()),
            None => Self::FromFile(path.into()),
        }
    }

    /// Loads the verifying key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyNotFound`] if the key file is missing and
    /// [`LicenseError::Crypto`] if the PEM cannot be parsed.
    pub fn load(&self) -> LicenseResult<VerifyingKey> {
        match self {
            Self::Embedded(pem) => {
                debug!("using embedded public key");
                signing::verifying_key_from_pem(pem)
            }
            Self::FromFile(path) => {
                debug!("loading public key from {}", path.display());
                signing::verifying_key_from_pem(&read_key_file(path)?)
            }
        }
    }
}

/// Loads the issuer's signing key from a PEM file.
///
/// # Errors
///
/// Returns [`LicenseError::KeyNotFound`] if the file is missing and
/// [`LicenseError::Crypto`] if it is not a valid private key.
pub fn load_signing_key(path: &Path) -> LicenseResult<SigningKey> {
    debug!("loading private key from {}", path.display());
    signing::signing_key_from_pem(&read_key_file(path)?)
}

fn read_key_file(path: &Path) -> LicenseResult<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LicenseError::KeyNotFound(path.to_path_buf()),
        _ => LicenseError::Io(e),
    })
}

/// Locations of the issuer's key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    /// Verifying key, distributed with the client.
    pub public: PathBuf,
    /// Signing key, kept by the issuer.
    pub private: PathBuf,
}

impl KeyPaths {
    /// `pub.pem` and `priv.pem` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            public: dir.join(PUBLIC_KEY_FILE),
            private: dir.join(PRIVATE_KEY_FILE),
        }
    }

    /// True only when both key files are present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.public.exists() && self.private.exists()
    }

    /// Writes `keypair` to both paths.
    ///
    /// The existence check and both writes happen under an exclusive lock
    /// file next to the private key, and each file is replaced by atomic
    /// rename so a reader never sees a partially written key.
    ///
    /// # Errors
    ///
    /// - [`LicenseError::KeysAlreadyExist`] if keys exist and `force` is false
    /// - [`LicenseError::KeyGenerationInProgress`] if the lock is held
    pub fn write_keypair(&self, keypair: &KeyPair, force: bool) -> LicenseResult<()> {
        create_parent(&self.public)?;
        create_parent(&self.private)?;

        let _lock = KeyDirLock::acquire(&parent_dir(&self.private).join(LOCK_FILE))?;
        if self.exists() {
            if !force {
                return Err(LicenseError::KeysAlreadyExist);
            }
            warn!("overwriting existing key pair in {}", self.private.display());
        }

        let (public_pem, private_pem) = keypair.to_pem()?;
        write_atomic(&self.private, private_pem.as_bytes(), 0o600)?;
        write_atomic(&self.public, public_pem.as_bytes(), 0o644)?;
        Ok(())
    }
}

/// Lock file removed on drop.
struct KeyDirLock {
    path: PathBuf,
    _file: File,
}

impl KeyDirLock {
    fn acquire(path: &Path) -> LicenseResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    LicenseError::KeyGenerationInProgress(path.to_path_buf())
                }
                _ => LicenseError::Io(e),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }
}

impl Drop for KeyDirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn create_parent(path: &Path) -> LicenseResult<()> {
    fs::create_dir_all(parent_dir(path))?;
    Ok(())
}

#[cfg_attr(not(unix), allow(unused_variables))]
fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> LicenseResult<()> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    }

    tmp.persist(path).map_err(|e| LicenseError::Io(e.error))?;
    Ok(())
}
