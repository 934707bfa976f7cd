// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 identity keys and their conversion to X25519.
//!
//! Peers are identified by long-lived Ed25519 signing certificates. The same key material doubles
//! as the sealed-box recipient key: the Edwards public point maps birationally onto the Montgomery
//! curve, and the secret scalar is derived from the seed the same way the signing scalar is.
//!
//! <https://libsodium.gitbook.io/doc/advanced/ed25519-curve25519>
use ed25519_dalek::{SigningKey, VerifyingKey};
use thiserror::Error;

use crate::crypto::sha2::sha2_512;
use crate::crypto::x25519;

pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Converts an Ed25519 public key into its X25519 counterpart.
///
/// Fails for byte strings that do not decompress to a valid Edwards point; callers drop the
/// affected peer or record.
pub fn public_key_to_x25519(
    public_key: &[u8; ED25519_PUBLIC_KEY_SIZE],
) -> Result<x25519::PublicKey, Ed25519Error> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| Ed25519Error::InvalidPublicKey)?;
    Ok(x25519::PublicKey::from_bytes(
        verifying_key.to_montgomery().to_bytes(),
    ))
}

/// Derives the X25519 secret key from an Ed25519 signing key.
///
/// The lower half of the SHA-512 seed expansion is the signing scalar; clamping happens inside
/// [`x25519::SecretKey::from_bytes`].
pub fn signing_key_to_x25519(signing_key: &SigningKey) -> x25519::SecretKey {
    let expanded = sha2_512(&[signing_key.as_bytes()]);
    let mut scalar = [0u8; x25519::SECRET_KEY_SIZE];
    scalar.copy_from_slice(&expanded[..x25519::SECRET_KEY_SIZE]);
    x25519::SecretKey::from_bytes(scalar)
}

#[derive(Debug, Error)]
pub enum Ed25519Error {
    #[error("byte string is not a valid ed25519 public key")]
    InvalidPublicKey,
}
