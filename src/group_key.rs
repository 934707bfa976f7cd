// SPDX-License-Identifier: MIT OR Apache-2.0

//! The subscriber-group key pair.
//!
//! The key-maker mints a fresh X25519 pair on every rekey. The public half is broadcast in the
//! clear inside every key record; the secret half is sealed individually per member. Peers
//! converge on one pair per epoch by accepting only strictly newer creation times.
use serde::{Deserialize, Serialize};

use crate::crypto::x25519::{PublicKey, SecretKey};
use crate::crypto::{Rng, RngError};

pub const GROUP_PUBLIC_KEY_SIZE: usize = 32;

pub const GROUP_SECRET_KEY_SIZE: usize = 32;

/// UNIX timestamp in microseconds; the ordering token for key generations and publications.
pub type Timestamp = u64;

/// The full group key pair, held by the key-maker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKeyPair {
    public: PublicKey,
    secret: SecretKey,
    created_at: Timestamp,
}

impl GroupKeyPair {
    /// Generates a fresh pair stamped with the given creation time.
    pub fn generate(rng: &Rng, created_at: Timestamp) -> Result<Self, RngError> {
        let secret = SecretKey::from_bytes(rng.random_array()?);
        Ok(Self {
            public: secret.public_key(),
            secret,
            created_at,
        })
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

/// A peer's adopted view of the group key.
///
/// Publisher-only peers never learn the secret half; they carry `secret: None` and can only
/// encrypt towards the group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupKey {
    pub public: PublicKey,
    pub secret: Option<SecretKey>,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;

    use super::GroupKeyPair;

    #[test]
    fn generated_pair_is_consistent() {
        let rng = Rng::from_seed([1; 32]);
        let pair = GroupKeyPair::generate(&rng, 42).unwrap();

        assert_eq!(pair.secret().public_key(), *pair.public());
        assert_eq!(pair.created_at(), 42);
    }

    #[test]
    fn fresh_pairs_differ() {
        let rng = Rng::from_seed([1; 32]);
        let pair_1 = GroupKeyPair::generate(&rng, 1).unwrap();
        let pair_2 = GroupKeyPair::generate(&rng, 2).unwrap();

        assert_ne!(pair_1.public(), pair_2.public());
    }
}
