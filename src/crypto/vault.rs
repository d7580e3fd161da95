//! Entropy generation and authenticated encryption of secrets
//!
//! Uses XChaCha20-Poly1305: a 256-bit key and a 192-bit nonce, both drawn
//! fresh from the OS for every [`encrypt`] call, so nonce reuse under one key
//! cannot happen. Ciphertexts carry the 16-byte Poly1305 tag at the end.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Symmetric key length in bytes
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes
pub const NONCE_LEN: usize = 24;

/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Vault failures
///
/// Everything except [`VaultError::Encryption`] is caused by caller input.
/// [`VaultError::Authentication`] is kept apart from the malformed-input
/// variants: the input was well formed but does not verify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("unsupported entropy length of {0} bits (expected 128 or 256)")]
    InvalidEntropyLength(u32),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },

    #[error("ciphertext of {0} bytes is shorter than the authentication tag")]
    CiphertextTooShort(usize),

    #[error("`{field}` is not valid base64: {reason}")]
    Encoding { field: &'static str, reason: String },

    #[error("authentication failed: ciphertext, key and nonce do not belong together")]
    Authentication,

    #[error("encryption failed")]
    Encryption,
}

impl VaultError {
    /// Whether the failure was an authentication tag mismatch
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

/// Mnemonic strength supported by [`generate_entropy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyStrength {
    /// 128 bits, a 12-word mnemonic
    Words12,
    /// 256 bits, a 24-word mnemonic
    Words24,
}

impl EntropyStrength {
    pub fn from_bits(bits: u32) -> Result<Self, VaultError> {
        match bits {
            128 => Ok(Self::Words12),
            256 => Ok(Self::Words24),
            other => Err(VaultError::InvalidEntropyLength(other)),
        }
    }

    pub fn from_word_count(words: u32) -> Option<Self> {
        match words {
            12 => Some(Self::Words12),
            24 => Some(Self::Words24),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Words12 => 128,
            Self::Words24 => 256,
        }
    }

    pub fn byte_len(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Fill a buffer of `bits / 8` bytes from the OS random source
///
/// Only 128 and 256 are accepted. The buffer is wiped when dropped.
pub fn generate_entropy(bits: u32) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let strength = EntropyStrength::from_bits(bits)?;
    let mut entropy = Zeroizing::new(vec![0u8; strength.byte_len()]);
    OsRng.fill_bytes(&mut entropy);
    Ok(entropy)
}

/// Output of [`encrypt`]: everything needed to recover the plaintext
///
/// The key is secret material and the whole bundle is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBundle {
    key: [u8; KEY_LEN],
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_LEN],
}

impl SecretBundle {
    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Ciphertext followed by the authentication tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Base64 form for JSON transport
    pub fn to_encoded(&self) -> EncodedBundle {
        EncodedBundle {
            key: STANDARD.encode(self.key),
            ciphertext: STANDARD.encode(&self.ciphertext),
            nonce: STANDARD.encode(self.nonce),
        }
    }
}

impl std::fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBundle")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// A [`SecretBundle`] with every field base64-encoded
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct EncodedBundle {
    pub key: String,
    pub ciphertext: String,
    pub nonce: String,
}

impl EncodedBundle {
    /// Decode and decrypt
    pub fn open(&self) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let key = Zeroizing::new(decode_base64("key", &self.key)?);
        let ciphertext = decode_base64("ciphertext", &self.ciphertext)?;
        let nonce = decode_base64("nonce", &self.nonce)?;
        decrypt(&ciphertext, &key, &nonce)
    }
}

impl std::fmt::Debug for EncodedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedBundle")
            .field("ciphertext", &self.ciphertext)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

/// Encrypt under a fresh random key and nonce
pub fn encrypt(plaintext: &[u8]) -> Result<SecretBundle, VaultError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(key.as_mut_slice());
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| VaultError::Encryption)?;

    Ok(SecretBundle {
        key: *key,
        ciphertext,
        nonce,
    })
}

/// Verify and decrypt
///
/// Input lengths are checked first so malformed input is reported as such;
/// a well-formed input that fails verification is
/// [`VaultError::Authentication`]. No plaintext is returned unless the tag
/// verifies.
pub fn decrypt(ciphertext: &[u8], key: &[u8], nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if key.len() != KEY_LEN {
        return Err(VaultError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::InvalidNonceLength {
            expected: NONCE_LEN,
            actual: nonce.len(),
        });
    }
    if ciphertext.len() < TAG_LEN {
        return Err(VaultError::CiphertextTooShort(ciphertext.len()));
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::Authentication)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode one base64 field; `field` names it in the error
pub fn decode_base64(field: &'static str, value: &str) -> Result<Vec<u8>, VaultError> {
    STANDARD.decode(value).map_err(|e| VaultError::Encoding {
        field,
        reason: e.to_string(),
    })
}
