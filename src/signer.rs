//! Receipt signing and verification over canonical payload bytes.
//!
//! Keys are Ed25519, PEM-encoded (PKCS#8 private, SPKI public), supplied
//! externally via paths or `DEV_PRIVATE_KEY_PATH` / `DEV_PUBLIC_KEY_PATH`.
//! The crate never manages long-term keys; `generate_keypair` exists for
//! tests and local dev only.

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::canonical::canonical_bytes;
use crate::errors::GateError;

pub const PRIVATE_KEY_ENV: &str = "DEV_PRIVATE_KEY_PATH";
pub const PUBLIC_KEY_ENV: &str = "DEV_PUBLIC_KEY_PATH";

pub struct ReceiptSigner {
    signing: Option<SigningKey>,
    verifying: Option<VerifyingKey>,
}

impl ReceiptSigner {
    /// Load keys from `DEV_PRIVATE_KEY_PATH` / `DEV_PUBLIC_KEY_PATH`.
    /// Missing variables or files load silently; using the corresponding
    /// operation later fails with a configuration error.
    pub fn from_env() -> Result<Self, GateError> {
        let priv_path = std::env::var(PRIVATE_KEY_ENV).ok();
        let pub_path = std::env::var(PUBLIC_KEY_ENV).ok();
        Self::from_paths(priv_path.as_deref().map(Path::new), pub_path.as_deref().map(Path::new))
    }

    /// Load whichever keys exist at the given paths. A present but unparsable
    /// PEM is a configuration error; an absent file is not.
    pub fn from_paths(
        private_key_path: Option<&Path>,
        public_key_path: Option<&Path>,
    ) -> Result<Self, GateError> {
        let signing = match private_key_path {
            Some(path) if path.exists() => {
                let pem = fs::read_to_string(path)?;
                Some(SigningKey::from_pkcs8_pem(&pem).map_err(|e| {
                    GateError::Configuration(format!(
                        "bad private key {}: {}",
                        path.display(),
                        e
                    ))
                })?)
            }
            _ => None,
        };
        let verifying = match public_key_path {
            Some(path) if path.exists() => {
                let pem = fs::read_to_string(path)?;
                Some(VerifyingKey::from_public_key_pem(&pem).map_err(|e| {
                    GateError::Configuration(format!("bad public key {}: {}", path.display(), e))
                })?)
            }
            _ => None,
        };
        Ok(Self { signing, verifying })
    }

    pub fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    pub fn can_verify(&self) -> bool {
        self.verifying.is_some()
    }

    /// Sign the canonical bytes of `payload`; hex-encoded signature.
    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String, GateError> {
        self.sign_bytes(&canonical_bytes(payload)?)
    }

    /// Sign raw bytes directly (callers that pre-canonicalize).
    pub fn sign_bytes(&self, bytes: &[u8]) -> Result<String, GateError> {
        let key = self.signing.as_ref().ok_or_else(|| {
            GateError::Configuration(format!(
                "private key not loaded; set {} or pass a key path",
                PRIVATE_KEY_ENV
            ))
        })?;
        Ok(hex::encode(key.sign(bytes).to_bytes()))
    }

    /// Verify a hex signature against the canonical bytes of `payload`.
    /// Malformed or mismatched signatures return `Ok(false)`; only a missing
    /// public key is an error.
    pub fn verify<T: Serialize>(
        &self,
        payload: &T,
        signature_hex: &str,
    ) -> Result<bool, GateError> {
        self.verify_bytes(&canonical_bytes(payload)?, signature_hex)
    }

    pub fn verify_bytes(&self, bytes: &[u8], signature_hex: &str) -> Result<bool, GateError> {
        let key = self.verifying.as_ref().ok_or_else(|| {
            GateError::Configuration(format!(
                "public key not loaded; set {} or pass a key path",
                PUBLIC_KEY_ENV
            ))
        })?;
        let raw = match hex::decode(signature_hex) {
            Ok(raw) => raw,
            Err(_) => return Ok(false),
        };
        let raw: [u8; 64] = match raw.try_into() {
            Ok(raw) => raw,
            Err(_) => return Ok(false),
        };
        let signature = Signature::from_bytes(&raw);
        Ok(key.verify(bytes, &signature).is_ok())
    }
}

/// Write an ephemeral PEM keypair for tests and local dev. Refuses to
/// overwrite existing files; the private key gets mode 0600 on unix.
pub fn generate_keypair(priv_path: &Path, pub_path: &Path) -> Result<(), GateError> {
    use rand::RngCore;

    if priv_path.exists() || pub_path.exists() {
        return Err(GateError::Configuration(format!(
            "refusing to overwrite existing key at {} / {}",
            priv_path.display(),
            pub_path.display()
        )));
    }
    for path in [priv_path, pub_path] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    let key = SigningKey::from_bytes(&secret);

    let priv_pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| GateError::Configuration(format!("private key encode: {}", e)))?;
    let pub_pem = key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| GateError::Configuration(format!("public key encode: {}", e)))?;

    fs::write(priv_path, priv_pem.as_bytes())?;
    fs::write(pub_path, pub_pem.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(priv_path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
