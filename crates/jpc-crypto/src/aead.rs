//! Symmetric envelope: AES-256-GCM or XChaCha20-Poly1305
//!
//! Sealed format:
//! ```text
//! ciphertext = [N bytes: encrypted data][16 bytes: tag]
//! nonce      = [12 bytes (GCM) | 24 bytes (XChaCha)], fresh per call, returned separately
//! ```
//!
//! The nonce is not secret. The container stores it; this module only
//! guarantees a new random one for every `seal`.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use jpc_core::config::AeadAlgorithm;
use jpc_core::{JpcError, JpcResult};
use rand::RngCore;

use crate::keys::SymmetricKey;
use crate::TAG_SIZE;

/// AEAD envelope bound to one key and algorithm.
#[derive(Debug, Clone)]
pub struct AeadEnvelope {
    algorithm: AeadAlgorithm,
    key: SymmetricKey,
}

impl AeadEnvelope {
    pub fn new(algorithm: AeadAlgorithm, key: SymmetricKey) -> Self {
        Self { algorithm, key }
    }

    /// Build from raw key bytes; `KeyLength` unless exactly 32 bytes.
    pub fn from_slice(algorithm: AeadAlgorithm, key: &[u8]) -> JpcResult<Self> {
        Ok(Self::new(algorithm, SymmetricKey::from_slice(key)?))
    }

    pub fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }

    pub fn nonce_len(&self) -> usize {
        self.algorithm.nonce_len()
    }

    /// Encrypt under a freshly drawn random nonce.
    ///
    /// Returns `(ciphertext || tag, nonce)`.
    pub fn seal(&self, plaintext: &[u8]) -> JpcResult<(Vec<u8>, Vec<u8>)> {
        let mut nonce = vec![0u8; self.nonce_len()];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = match self.algorithm {
            AeadAlgorithm::Aes256Gcm => {
                let cipher = Aes256Gcm::new(self.key.as_bytes().into());
                cipher.encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext)
            }
            AeadAlgorithm::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());
                cipher.encrypt(XNonce::from_slice(&nonce), plaintext)
            }
        }
        .map_err(|e| JpcError::Encryption(format!("{} seal failed: {e}", self.algorithm.name())))?;

        Ok((ciphertext, nonce))
    }

    /// Verify and decrypt. Nothing is returned unless the tag checks out.
    pub fn open(&self, ciphertext: &[u8], nonce: &[u8]) -> JpcResult<Vec<u8>> {
        if nonce.len() != self.nonce_len() || ciphertext.len() < TAG_SIZE {
            return Err(JpcError::Authentication);
        }

        match self.algorithm {
            AeadAlgorithm::Aes256Gcm => {
                let cipher = Aes256Gcm::new(self.key.as_bytes().into());
                cipher.decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
            }
            AeadAlgorithm::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());
                cipher.decrypt(XNonce::from_slice(nonce), ciphertext)
            }
        }
        .map_err(|_| JpcError::Authentication)
    }
}
