//! Secret handling: entropy, authenticated encryption, threshold backup
//!
//! - [`vault`] generates entropy and seals secrets into a [`SecretBundle`]
//!   (key, ciphertext with tag, nonce).
//! - [`shamir`] splits a secret string into hex-encoded shares and combines
//!   them back.
//!
//! Transient plaintext buffers are held in [`zeroize::Zeroizing`] so they
//! are overwritten when released.

pub mod shamir;
pub mod vault;

pub use shamir::ShareError;
pub use vault::{EncodedBundle, EntropyStrength, SecretBundle, VaultError};
