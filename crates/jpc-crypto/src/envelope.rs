//! The `EnvelopeCipher` seam and the enum the orchestrator holds

use jpc_core::config::AeadAlgorithm;
use jpc_core::{JpcError, JpcResult};

use crate::aead::AeadEnvelope;
use crate::keys::KeyMaterial;
use crate::oaep::OaepEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Aead(AeadAlgorithm),
    RsaOaep,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Aead(algorithm) => f.write_str(algorithm.name()),
            Scheme::RsaOaep => f.write_str("rsa-oaep-sha256"),
        }
    }
}

/// Output of one `encrypt` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    /// Present for nonce-based schemes only
    pub nonce: Option<Vec<u8>>,
}

/// Arbitrary-length encryption under one key, shared read-only across workers.
pub trait EnvelopeCipher: Send + Sync {
    fn scheme(&self) -> Scheme;

    /// Bytes of nonce the container must carry (0 when there is none).
    fn nonce_len(&self) -> usize;

    fn encrypt(&self, plaintext: &[u8]) -> JpcResult<Sealed>;

    fn decrypt(&self, ciphertext: &[u8], nonce: Option<&[u8]>) -> JpcResult<Vec<u8>>;
}

impl EnvelopeCipher for AeadEnvelope {
    fn scheme(&self) -> Scheme {
        Scheme::Aead(self.algorithm())
    }

    fn nonce_len(&self) -> usize {
        AeadEnvelope::nonce_len(self)
    }

    fn encrypt(&self, plaintext: &[u8]) -> JpcResult<Sealed> {
        let (ciphertext, nonce) = self.seal(plaintext)?;
        Ok(Sealed {
            ciphertext,
            nonce: Some(nonce),
        })
    }

    fn decrypt(&self, ciphertext: &[u8], nonce: Option<&[u8]>) -> JpcResult<Vec<u8>> {
        let nonce = nonce.ok_or(JpcError::Authentication)?;
        self.open(ciphertext, nonce)
    }
}

impl EnvelopeCipher for OaepEnvelope {
    fn scheme(&self) -> Scheme {
        Scheme::RsaOaep
    }

    fn nonce_len(&self) -> usize {
        0
    }

    fn encrypt(&self, plaintext: &[u8]) -> JpcResult<Sealed> {
        Ok(Sealed {
            ciphertext: self.seal(plaintext)?,
            nonce: None,
        })
    }

    fn decrypt(&self, ciphertext: &[u8], _nonce: Option<&[u8]>) -> JpcResult<Vec<u8>> {
        self.open(ciphertext)
    }
}

/// Either variant, chosen once per run from the loaded key.
#[derive(Debug, Clone)]
pub enum Envelope {
    Aead(AeadEnvelope),
    Oaep(OaepEnvelope),
}

impl Envelope {
    pub fn from_key_material(material: KeyMaterial, algorithm: AeadAlgorithm) -> Self {
        match material {
            KeyMaterial::Symmetric(key) => Envelope::Aead(AeadEnvelope::new(algorithm, key)),
            KeyMaterial::RsaPublic(key) => Envelope::Oaep(OaepEnvelope::Public(key)),
            KeyMaterial::RsaPrivate(key) => Envelope::Oaep(OaepEnvelope::Private(key)),
        }
    }

    fn inner(&self) -> &dyn EnvelopeCipher {
        match self {
            Envelope::Aead(env) => env,
            Envelope::Oaep(env) => env,
        }
    }
}

impl EnvelopeCipher for Envelope {
    fn scheme(&self) -> Scheme {
        self.inner().scheme()
    }

    fn nonce_len(&self) -> usize {
        self.inner().nonce_len()
    }

    fn encrypt(&self, plaintext: &[u8]) -> JpcResult<Sealed> {
        self.inner().encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8], nonce: Option<&[u8]>) -> JpcResult<Vec<u8>> {
        self.inner().decrypt(ciphertext, nonce)
    }
}
