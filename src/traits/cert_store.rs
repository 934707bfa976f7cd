// SPDX-License-Identifier: MIT OR Apache-2.0

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::group_key::Timestamp;
use crate::publication::Thumbprint;

/// Read-only view of the certificate store shared with the rest of the stack.
///
/// The store validates signing chains before certificates appear here; the distributor only looks
/// certificates up by thumbprint and reads capabilities off the chain. Implementations must keep
/// lookups stable for the duration of one event-handler call.
pub trait CertStore {
    /// Thumbprint of the local peer's primary signing certificate.
    fn local_thumbprint(&self) -> Thumbprint;

    /// Secret half of the local signing identity; `None` when the key is not (or no longer)
    /// available for the given thumbprint.
    fn signing_key(&self, tp: &Thumbprint) -> Option<SigningKey>;

    fn contains(&self, tp: &Thumbprint) -> bool;

    /// Certified Ed25519 public key of a peer.
    fn public_key(&self, tp: &Thumbprint) -> Option<VerifyingKey>;

    /// Expiry of a peer's certificate, in microseconds since the UNIX epoch.
    fn valid_until(&self, tp: &Thumbprint) -> Option<Timestamp>;

    /// Argument of a named capability on a peer's signing chain, or `None` when the chain does
    /// not carry the capability.
    fn capability(&self, tp: &Thumbprint, name: &str) -> Option<String>;
}
