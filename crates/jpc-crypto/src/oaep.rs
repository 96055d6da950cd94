//! Chunked RSA-OAEP (SHA-256) envelope
//!
//! OAEP caps one operation at `k - 2*hLen - 2` plaintext bytes (k = modulus
//! size in bytes, hLen = 32). Longer input is cut into chunks of exactly that
//! size, the last one possibly shorter:
//! ```text
//! plaintext  = [max][max]...[rest]
//! ciphertext = [k bytes][k bytes]...[k bytes]
//! ```
//! Block boundaries are implied by `k`; nothing else is recorded.

use std::borrow::Cow;

use jpc_core::{JpcError, JpcResult};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::OAEP_HASH_SIZE;

/// Largest plaintext one OAEP block carries for a `key_size`-byte modulus.
pub fn max_chunk_len(key_size: usize) -> usize {
    key_size.saturating_sub(2 * OAEP_HASH_SIZE + 2)
}

#[derive(Debug, Clone)]
pub enum OaepEnvelope {
    Public(RsaPublicKey),
    Private(RsaPrivateKey),
}

impl OaepEnvelope {
    fn public_key(&self) -> Cow<'_, RsaPublicKey> {
        match self {
            OaepEnvelope::Public(key) => Cow::Borrowed(key),
            OaepEnvelope::Private(key) => Cow::Owned(key.to_public_key()),
        }
    }

    /// Modulus size in bytes; every ciphertext block has exactly this length.
    pub fn block_size(&self) -> usize {
        match self {
            OaepEnvelope::Public(key) => key.size(),
            OaepEnvelope::Private(key) => key.size(),
        }
    }

    pub fn max_chunk_len(&self) -> usize {
        max_chunk_len(self.block_size())
    }

    pub fn seal(&self, plaintext: &[u8]) -> JpcResult<Vec<u8>> {
        let block = self.block_size();
        let max = self.max_chunk_len();
        if max == 0 {
            return Err(JpcError::Encryption(format!(
                "{}-bit modulus too small for OAEP-SHA256",
                block * 8
            )));
        }

        let public = self.public_key();
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(plaintext.len().div_ceil(max) * block);

        for (i, chunk) in plaintext.chunks(max).enumerate() {
            let sealed = public
                .encrypt(&mut rng, Oaep::new::<Sha256>(), chunk)
                .map_err(|e| JpcError::Encryption(format!("OAEP chunk {i}: {e}")))?;
            debug_assert_eq!(sealed.len(), block);
            out.extend_from_slice(&sealed);
        }
        Ok(out)
    }

    pub fn open(&self, ciphertext: &[u8]) -> JpcResult<Vec<u8>> {
        let OaepEnvelope::Private(private) = self else {
            return Err(JpcError::KeyLoad(
                "RSA private key required to decrypt".into(),
            ));
        };

        let block = self.block_size();
        if ciphertext.len() % block != 0 {
            return Err(JpcError::Decryption(format!(
                "ciphertext length {} is not a multiple of the {block}-byte block",
                ciphertext.len()
            )));
        }

        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(ciphertext.len() / block * self.max_chunk_len());
        for (i, chunk) in ciphertext.chunks(block).enumerate() {
            let plain = private
                .decrypt_blinded(&mut rng, Oaep::new::<Sha256>(), chunk)
                .map_err(|_| JpcError::Decryption(format!("block {i}: bad padding or wrong key")))?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_rsa_key;
    use std::sync::OnceLock;

    // 1024-bit: k = 128, chunk = 62
    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| generate_rsa_key(1024).unwrap())
    }

    fn private_envelope() -> OaepEnvelope {
        OaepEnvelope::Private(test_key().clone())
    }

    fn make_data(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i.wrapping_mul(31) ^ (i >> 2)) as u8).collect()
    }

    #[test]
    fn test_chunk_bound() {
        assert_eq!(max_chunk_len(128), 62);
        assert_eq!(max_chunk_len(256), 190);
        assert_eq!(max_chunk_len(384), 318);
        assert_eq!(max_chunk_len(40), 0);
        assert_eq!(private_envelope().max_chunk_len(), 62);
    }

    #[test]
    fn test_roundtrip_multi_chunk_ragged() {
        let env = private_envelope();
        let plaintext = make_data(62 * 3 + 5);

        let ciphertext = env.seal(&plaintext).unwrap();
        assert_eq!(ciphertext.len(), 4 * 128);
        assert_eq!(env.open(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_exact_multiple() {
        let env = private_envelope();
        let plaintext = make_data(62 * 4);

        let ciphertext = env.seal(&plaintext).unwrap();
        assert_eq!(ciphertext.len() % env.block_size(), 0);
        assert_eq!(ciphertext.len(), 4 * 128);
        assert_eq!(env.open(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_short_and_empty() {
        let env = private_envelope();

        let ciphertext = env.seal(b"in/a/b.txt").unwrap();
        assert_eq!(ciphertext.len(), 128);
        assert_eq!(env.open(&ciphertext).unwrap(), b"in/a/b.txt");

        let empty = env.seal(b"").unwrap();
        assert!(empty.is_empty());
        assert_eq!(env.open(&empty).unwrap(), b"");
    }

    #[test]
    fn test_public_only_encrypts_private_decrypts() {
        let public = OaepEnvelope::Public(test_key().to_public_key());
        let ciphertext = public.seal(b"sealed with the public half").unwrap();

        assert!(matches!(public.open(&ciphertext), Err(JpcError::KeyLoad(_))));
        assert_eq!(
            private_envelope().open(&ciphertext).unwrap(),
            b"sealed with the public half"
        );
    }

    #[test]
    fn test_open_ragged_length() {
        let env = private_envelope();
        let mut ciphertext = env.seal(b"abc").unwrap();
        ciphertext.pop();
        assert!(matches!(env.open(&ciphertext), Err(JpcError::Decryption(_))));
    }

    #[test]
    fn test_open_corrupt_block() {
        let env = private_envelope();
        let mut ciphertext = env.seal(&make_data(100)).unwrap();
        ciphertext[128 + 7] ^= 0xFF;
        assert!(matches!(env.open(&ciphertext), Err(JpcError::Decryption(_))));
    }

    #[test]
    fn test_blinded_open_is_stable() {
        let env = private_envelope();
        let ciphertext = env.seal(&make_data(150)).unwrap();
        let first = env.open(&ciphertext).unwrap();
        let second = env.open(&ciphertext).unwrap();
        assert_eq!(first, make_data(150));
        assert_eq!(first, second);
    }

    #[test]
    fn test_open_wrong_key() {
        let other = OaepEnvelope::Private(generate_rsa_key(1024).unwrap());
        let ciphertext = private_envelope().seal(b"secret").unwrap();
        assert!(matches!(other.open(&ciphertext), Err(JpcError::Decryption(_))));
    }

    #[test]
    fn test_randomized_blocks() {
        let env = private_envelope();
        assert_ne!(env.seal(b"same").unwrap(), env.seal(b"same").unwrap());
    }
}
