//! Key pair generation, signing and verification.
//!
//! Signatures are Ed25519 over the SHA-256 digest of the canonical payload.
//! Keys are exchanged as PEM: PKCS#8 `PRIVATE KEY` for the signing key and
//! SPKI `PUBLIC KEY` for the verifying key.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{LicenseError, LicenseResult};

/// Length in bytes of a raw signature.
pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// A signing key together with its verifying key.
pub struct KeyPair {
    /// Private half; never leaves the issuer.
    pub signing_key: SigningKey,
    /// Public half, derived from `signing_key`.
    pub verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generates a new random key pair from the OS entropy source.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Derives the pair from an existing signing key.
    #[must_use]
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Exports both keys as PEM text, returned as `(public, private)`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyGeneration`] if either key cannot be encoded.
    pub fn to_pem(&self) -> LicenseResult<(String, String)> {
        let public = verifying_key_to_pem(&self.verifying_key)?;
        let private = signing_key_to_pem(&self.signing_key)?;
        Ok((public, private))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("signing_key", &"[REDACTED]")
            .field("verifying_key", &self.verifying_key)
            .finish()
    }
}

/// SHA-256 digest of `payload`; this is what actually gets signed.
#[must_use]
pub fn digest(payload: &[u8]) -> [u8; 32] {
    Sha256::digest(payload).into()
}

/// Signs the digest of `payload`.
///
/// # Errors
///
/// Returns [`LicenseError::Signing`] if the signer rejects the key.
pub fn sign(payload: &[u8], key: &SigningKey) -> LicenseResult<Vec<u8>> {
    let signature = key
        .try_sign(&digest(payload))
        .map_err(|e| LicenseError::Signing(e.to_string()))?;
    Ok(signature.to_bytes().to_vec())
}

/// Checks `signature` over the digest of `payload`.
///
/// Never fails: malformed signatures and mismatches are both `false`.
#[must_use]
pub fn verify(payload: &[u8], signature: &[u8], key: &VerifyingKey) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify_strict(&digest(payload), &signature).is_ok()
}

/// Like [`verify`], taking the base64 text stored in license records.
#[must_use]
pub fn verify_encoded(payload: &[u8], signature_b64: &str, key: &VerifyingKey) -> bool {
    match BASE64.decode(signature_b64.trim()) {
        Ok(signature) => verify(payload, &signature, key),
        Err(_) => false,
    }
}

/// Base64 text form of a raw signature.
#[must_use]
pub fn encode_signature(signature: &[u8]) -> String {
    BASE64.encode(signature)
}

/// Encodes a signing key as PKCS#8 PEM.
pub fn signing_key_to_pem(key: &SigningKey) -> LicenseResult<String> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.as_str().to_owned())
        .map_err(|e| LicenseError::KeyGeneration(format!("cannot encode private key: {e}")))
}

/// Encodes a verifying key as SPKI PEM.
pub fn verifying_key_to_pem(key: &VerifyingKey) -> LicenseResult<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| LicenseError::KeyGeneration(format!("cannot encode public key: {e}")))
}

/// Parses a PKCS#8 PEM signing key.
pub fn signing_key_from_pem(pem: &str) -> LicenseResult<SigningKey> {
    SigningKey::from_pkcs8_pem(pem.trim())
        .map_err(|e| LicenseError::Crypto(format!("malformed private key: {e}")))
}

/// Parses an SPKI PEM verifying key.
pub fn verifying_key_from_pem(pem: &str) -> LicenseResult<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem.trim())
        .map_err(|e| LicenseError::Crypto(format!("malformed public key: {e}")))
}
