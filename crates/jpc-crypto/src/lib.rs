//! jpc-crypto: envelope encryption for jpegcrypt containers
//!
//! Two interchangeable schemes, one per run:
//! ```text
//! aead      AES-256-GCM (12-byte nonce) or XChaCha20-Poly1305 (24-byte nonce)
//!           ciphertext = data || 16-byte tag, nonce returned alongside
//! rsa-oaep  RSA-OAEP(SHA-256), plaintext split into (k - 66)-byte chunks,
//!           each sealed to one k-byte block; blocks concatenated, no framing
//! ```
//!
//! Payload and embedded path are always sealed by separate calls.

pub mod aead;
pub mod envelope;
pub mod keys;
pub mod oaep;

pub use aead::AeadEnvelope;
pub use envelope::{Envelope, EnvelopeCipher, Scheme, Sealed};
pub use keys::{
    encode_rsa_private_pem, encode_rsa_public_pem, generate_rsa_key, generate_symmetric_key,
    load_key_material, parse_key_material, KeyMaterial, SymmetricKey,
};
pub use oaep::OaepEnvelope;

/// Size of a symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the AEAD authentication tag (GCM and Poly1305 alike)
pub const TAG_SIZE: usize = 16;

/// SHA-256 output size, the OAEP hash
pub const OAEP_HASH_SIZE: usize = 32;

/// Default modulus size for generated RSA keys
pub const DEFAULT_RSA_BITS: usize = 3072;
