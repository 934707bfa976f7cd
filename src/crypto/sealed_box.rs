// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anonymous sealed box.
//!
//! Seals a message to a recipient's X25519 public key without authenticating the sender: a fresh
//! ephemeral key pair is generated per message, the ECDH agreement is expanded with HKDF-SHA256
//! into an AEAD key, and the ephemeral public key is prepended to the ciphertext. Anyone can seal;
//! only the holder of the recipient secret key can open.
use thiserror::Error;

use crate::crypto::aead::{aead_decrypt, aead_encrypt, AeadError, NONCE_SIZE, TAG_SIZE};
use crate::crypto::hkdf::{hkdf_sha256, HkdfError};
use crate::crypto::x25519::{PublicKey, SecretKey, X25519Error, PUBLIC_KEY_SIZE};
use crate::crypto::{Rng, RngError};

/// Bytes a sealed box adds on top of the message: ephemeral public key and AEAD tag.
pub const SEAL_OVERHEAD: usize = PUBLIC_KEY_SIZE + TAG_SIZE;

const SEAL_INFO: &[u8] = b"sgkey/sealed-box/v1";

/// Seals `plaintext` to the recipient; output is `ephemeral pk ‖ ciphertext ‖ tag`.
pub fn seal(
    plaintext: &[u8],
    recipient: &PublicKey,
    rng: &Rng,
) -> Result<Vec<u8>, SealedBoxError> {
    let ephemeral_secret = SecretKey::from_bytes(rng.random_array()?);
    let ephemeral_public = ephemeral_secret.public_key();

    let key = expand_key(
        &ephemeral_secret.calculate_agreement(recipient)?,
        &ephemeral_public,
        recipient,
    )?;

    // The AEAD key is unique per message (fresh ephemeral pair), so a fixed nonce is safe.
    let ciphertext = aead_encrypt(&key, &[0u8; NONCE_SIZE], plaintext)?;

    let mut sealed = Vec::with_capacity(PUBLIC_KEY_SIZE + ciphertext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Opens a sealed box with the recipient's key pair.
pub fn open(
    sealed: &[u8],
    recipient_public: &PublicKey,
    recipient_secret: &SecretKey,
) -> Result<Vec<u8>, SealedBoxError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(SealedBoxError::Truncated);
    }

    let (ephemeral_bytes, ciphertext) = sealed.split_at(PUBLIC_KEY_SIZE);
    let ephemeral_public = PublicKey::from_bytes(
        ephemeral_bytes
            .try_into()
            .expect("split yields exactly PUBLIC_KEY_SIZE bytes"),
    );

    let key = expand_key(
        &recipient_secret.calculate_agreement(&ephemeral_public)?,
        &ephemeral_public,
        recipient_public,
    )?;

    Ok(aead_decrypt(&key, &[0u8; NONCE_SIZE], ciphertext)?)
}

/// Binds the AEAD key to both public keys so a ciphertext cannot be replayed towards a different
/// recipient.
fn expand_key(
    agreement: &[u8],
    ephemeral_public: &PublicKey,
    recipient: &PublicKey,
) -> Result<[u8; 32], SealedBoxError> {
    let mut salt = [0u8; PUBLIC_KEY_SIZE * 2];
    salt[..PUBLIC_KEY_SIZE].copy_from_slice(ephemeral_public.as_bytes());
    salt[PUBLIC_KEY_SIZE..].copy_from_slice(recipient.as_bytes());
    Ok(hkdf_sha256(&salt, agreement, SEAL_INFO)?)
}

#[derive(Debug, Error)]
pub enum SealedBoxError {
    #[error("sealed box is shorter than the fixed overhead")]
    Truncated,

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    X25519(#[from] X25519Error),

    #[error(transparent)]
    Hkdf(#[from] HkdfError),

    #[error(transparent)]
    Aead(#[from] AeadError),
}
