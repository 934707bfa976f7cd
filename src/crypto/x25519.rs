// SPDX-License-Identifier: MIT OR Apache-2.0

//! Elliptic-curve Diffie–Hellman (ECDH) key agreement scheme (X25519).
use std::fmt;

use curve25519_dalek::MontgomeryPoint;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::crypto::Secret;

pub const SECRET_KEY_SIZE: usize = 32;

pub const PUBLIC_KEY_SIZE: usize = 32;

pub const AGREEMENT_SIZE: usize = 32;

/// X25519 secret key.
///
/// The [`Secret`] container supplies zeroisation, constant-time comparison and debug redaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(Secret<SECRET_KEY_SIZE>);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        // Clamping
        let mut bytes = bytes;
        bytes[0] &= 248u8;
        bytes[31] &= 127u8;
        bytes[31] |= 64u8;
        SecretKey(Secret::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        *self.0.as_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(MontgomeryPoint::mul_base_clamped(self.to_bytes()).to_bytes())
    }

    /// Computes the shared secret with another party's public key.
    ///
    /// Fails when the agreement lands on the identity point (low-order or otherwise invalid peer
    /// key), matching the behaviour of contributory ECDH implementations.
    pub fn calculate_agreement(
        &self,
        their_public: &PublicKey,
    ) -> Result<[u8; AGREEMENT_SIZE], X25519Error> {
        let shared = MontgomeryPoint(their_public.0).mul_clamped(self.to_bytes());
        if bool::from(shared.to_bytes().ct_eq(&[0u8; AGREEMENT_SIZE])) {
            return Err(X25519Error::InvalidCurve);
        }
        Ok(shared.to_bytes())
    }
}

/// X25519 public key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(public_key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(public_key)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Error)]
pub enum X25519Error {
    #[error("invalid curve point or scalar")]
    InvalidCurve,
}
