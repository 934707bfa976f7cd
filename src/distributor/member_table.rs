// SPDX-License-Identifier: MIT OR Apache-2.0

//! The key-maker's member table.
//!
//! Maps each enrolled subscriber's certificate thumbprint to the X25519 form of its public key,
//! ready for sealing. The ordered map gives the byte-lexicographic iteration order the range
//! addressing of key-record names depends on.
use std::collections::BTreeMap;

use crate::crypto::x25519::PublicKey;
use crate::group_key::Timestamp;
use crate::key_record::MAX_KEY_RECORDS;
use crate::publication::Thumbprint;
use crate::traits::CertStore;

/// Hard cap on enrolled members, keeping one rekey below the transport's set-reconciliation
/// threshold of 80 publications.
pub const MAX_MEMBERS: usize = 80 * MAX_KEY_RECORDS;

#[derive(Clone, Debug, Default)]
pub struct MemberTable {
    entries: BTreeMap<Thumbprint, PublicKey>,
}

impl MemberTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a member's sealing key.
    pub fn insert(&mut self, tp: Thumbprint, public_key: PublicKey) {
        self.entries.insert(tp, public_key);
    }

    pub fn remove(&mut self, tp: &Thumbprint) -> Option<PublicKey> {
        self.entries.remove(tp)
    }

    pub fn contains(&self, tp: &Thumbprint) -> bool {
        self.entries.contains_key(tp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn at_capacity(&self) -> bool {
        self.entries.len() >= MAX_MEMBERS
    }

    /// Members in thumbprint order.
    pub fn iter(&self) -> impl Iterator<Item = (&Thumbprint, &PublicKey)> {
        self.entries.iter()
    }

    /// Drops members whose certificate is gone from the store or past its expiry.
    ///
    /// Runs at the start of every rekey so departed peers stop receiving the secret key.
    pub fn sweep_expired<CS: CertStore>(&mut self, certs: &CS, now: Timestamp) {
        self.entries.retain(|tp, _| {
            certs
                .valid_until(tp)
                .is_some_and(|valid_until| valid_until > now)
        });
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use crate::crypto::x25519::PublicKey;
    use crate::crypto::Rng;
    use crate::distributor::test_utils::{CertAuthority, Capabilities};
    use crate::traits::CertStore;

    use super::MemberTable;

    fn key(byte: u8) -> PublicKey {
        PublicKey::from_bytes([byte; 32])
    }

    #[test]
    fn iteration_is_sorted_by_thumbprint() {
        let mut table = MemberTable::new();
        table.insert([3; 32], key(3));
        table.insert([1; 32], key(1));
        table.insert([2; 32], key(2));

        let order: Vec<u8> = table.iter().map(|(tp, _)| tp[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let mut table = MemberTable::new();
        table.insert([1; 32], key(1));
        table.insert([1; 32], key(9));

        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().unwrap().1, &key(9));
    }

    #[test]
    fn sweep_drops_expired_and_unknown_members() {
        let rng = Rng::from_seed([1; 32]);
        let mut authority = CertAuthority::new();

        let now = 1_000_000_000;
        let fresh = authority.issue(
            SigningKey::from_bytes(&rng.random_array().unwrap()),
            Capabilities::subscriber("pubs"),
            now + 1_000_000,
        );
        let expired = authority.issue(
            SigningKey::from_bytes(&rng.random_array().unwrap()),
            Capabilities::subscriber("pubs"),
            now - 1,
        );
        let certs = authority.store_for(fresh);

        let mut table = MemberTable::new();
        table.insert(fresh, key(1));
        table.insert(expired, key(2));
        table.insert([7; 32], key(3)); // no certificate at all

        table.sweep_expired(&certs, now);

        assert_eq!(table.len(), 1);
        assert!(table.contains(&fresh));
        assert!(certs.contains(&expired), "cert stays, member goes");
    }
}
