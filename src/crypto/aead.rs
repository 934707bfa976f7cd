// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated encryption with associated data (ChaCha20-Poly1305).
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use thiserror::Error;

pub const KEY_SIZE: usize = 32;

pub const NONCE_SIZE: usize = 12;

pub const TAG_SIZE: usize = 16;

/// Encrypts and authenticates plaintext; the ciphertext grows by [`TAG_SIZE`] bytes.
pub fn aead_encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, AeadError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| AeadError::Encrypt)
}

/// Decrypts and verifies a ciphertext produced by [`aead_encrypt`].
pub fn aead_decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, AeadError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AeadError::Decrypt)
}

#[derive(Debug, Error)]
pub enum AeadError {
    #[error("could not encrypt with aead")]
    Encrypt,

    #[error("could not decrypt with aead")]
    Decrypt,
}
