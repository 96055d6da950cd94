//! Key material: raw symmetric keys, RSA PEM keys, loading and generation

use std::path::Path;

use jpc_core::config::SchemeChoice;
use jpc_core::{JpcError, JpcResult};
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, Zeroizing};

use crate::KEY_SIZE;

const PEM_PREFIX: &[u8] = b"-----BEGIN";

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Fails with `KeyLength` unless `bytes` is exactly `KEY_SIZE` long.
    pub fn from_slice(bytes: &[u8]) -> JpcResult<Self> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| JpcError::KeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(array))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key material for one run. Immutable once loaded.
#[derive(Clone)]
pub enum KeyMaterial {
    Symmetric(SymmetricKey),
    /// Encrypt-only callers
    RsaPublic(RsaPublicKey),
    /// Decrypt side; also able to encrypt through its public half
    RsaPrivate(RsaPrivateKey),
}

impl KeyMaterial {
    pub fn kind(&self) -> &'static str {
        match self {
            KeyMaterial::Symmetric(_) => "symmetric",
            KeyMaterial::RsaPublic(_) => "rsa-public",
            KeyMaterial::RsaPrivate(_) => "rsa-private",
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KeyMaterial")
            .field(&self.kind())
            .field(&"[REDACTED]")
            .finish()
    }
}

/// Read and parse a key file.
pub fn load_key_material(path: &Path, scheme: SchemeChoice) -> JpcResult<KeyMaterial> {
    let raw = Zeroizing::new(
        std::fs::read(path)
            .map_err(|e| JpcError::KeyLoad(format!("reading {}: {e}", path.display())))?,
    );
    let material = parse_key_material(&raw, scheme)?;
    tracing::debug!(path = %path.display(), kind = material.kind(), "key loaded");
    Ok(material)
}

/// Parse key bytes according to `scheme`. `Auto` treats PEM input as RSA
/// and anything else as a raw symmetric key.
pub fn parse_key_material(raw: &[u8], scheme: SchemeChoice) -> JpcResult<KeyMaterial> {
    let is_pem = raw.trim_ascii_start().starts_with(PEM_PREFIX);
    match scheme {
        SchemeChoice::RsaOaep => parse_rsa_pem(raw),
        SchemeChoice::Auto if is_pem => parse_rsa_pem(raw),
        SchemeChoice::Auto | SchemeChoice::Aead => {
            SymmetricKey::from_slice(raw).map(KeyMaterial::Symmetric)
        }
    }
}

fn parse_rsa_pem(raw: &[u8]) -> JpcResult<KeyMaterial> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| JpcError::KeyLoad("RSA key file is not PEM text".into()))?;

    if text.contains("PRIVATE KEY") {
        let key = RsaPrivateKey::from_pkcs1_pem(text)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(text))
            .map_err(|e| JpcError::KeyLoad(format!("parsing RSA private key: {e}")))?;
        return Ok(KeyMaterial::RsaPrivate(key));
    }
    if text.contains("PUBLIC KEY") {
        let key = RsaPublicKey::from_public_key_pem(text)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(text))
            .map_err(|e| JpcError::KeyLoad(format!("parsing RSA public key: {e}")))?;
        return Ok(KeyMaterial::RsaPublic(key));
    }
    Err(JpcError::KeyLoad(
        "PEM file holds neither an RSA private nor public key".into(),
    ))
}

/// Generate a random 256-bit symmetric key.
pub fn generate_symmetric_key() -> SymmetricKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    SymmetricKey::from_bytes(bytes)
}

/// Generate an RSA private key with a `bits`-bit modulus.
pub fn generate_rsa_key(bits: usize) -> JpcResult<RsaPrivateKey> {
    RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| JpcError::Encryption(format!("RSA key generation failed: {e}")))
}

/// PKCS#1 PEM (`BEGIN RSA PRIVATE KEY`).
pub fn encode_rsa_private_pem(key: &RsaPrivateKey) -> JpcResult<Zeroizing<String>> {
    key.to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| JpcError::Encryption(format!("encoding private key: {e}")))
}

/// SPKI PEM (`BEGIN PUBLIC KEY`).
pub fn encode_rsa_public_pem(key: &RsaPublicKey) -> JpcResult<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| JpcError::Encryption(format!("encoding public key: {e}")))
}
