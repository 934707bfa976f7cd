// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed publications exchanged over the synchronization transport.
//!
//! The transport validates signatures before a publication reaches the distributor; the signer's
//! certificate thumbprint travels in the signature info and is the peer's identity for every
//! authorization decision made here.
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::ed25519::ED25519_SIGNATURE_SIZE;
use crate::name::Name;
use crate::tlv::TlvWriter;

/// Fixed-width digest of a peer's signing certificate; the peer's stable identity.
pub const THUMBPRINT_SIZE: usize = 32;

pub type Thumbprint = [u8; THUMBPRINT_SIZE];

/// Thumbprint value no real certificate hashes to; marks "no key-maker recorded yet".
pub const NO_THUMBPRINT: Thumbprint = [0; THUMBPRINT_SIZE];

// NDN packet-format tags used for the byte string covered by the signature.
const TAG_NAME: u32 = 7;
const TAG_COMPONENT: u32 = 8;
const TAG_CONTENT: u32 = 21;
const TAG_KEY_DIGEST: u32 = 29;

/// A named, signed unit of data in the sync collection.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Publication {
    name: Name,
    #[serde(with = "serde_bytes")]
    content: Vec<u8>,
    signer: Thumbprint,
    #[serde(with = "serde_bytes")]
    signature: [u8; ED25519_SIGNATURE_SIZE],
}

impl Publication {
    /// Builds and signs a publication with the local identity key.
    pub fn sign(
        name: Name,
        content: Vec<u8>,
        signer: Thumbprint,
        signing_key: &SigningKey,
    ) -> Self {
        let signature = signing_key
            .sign(&signable_bytes(&name, &content, &signer))
            .to_bytes();
        Self {
            name,
            content,
            signer,
            signature,
        }
    }

    /// Checks the signature against the signer's certified public key.
    pub fn verify(&self, public_key: &VerifyingKey) -> Result<(), PublicationError> {
        let signature = Signature::from_bytes(&self.signature);
        public_key
            .verify(
                &signable_bytes(&self.name, &self.content, &self.signer),
                &signature,
            )
            .map_err(|_| PublicationError::BadSignature)
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Thumbprint of the signing certificate, from the signature info.
    pub fn signer(&self) -> &Thumbprint {
        &self.signer
    }
}

fn signable_bytes(name: &Name, content: &[u8], signer: &Thumbprint) -> Vec<u8> {
    let mut components = TlvWriter::new();
    for component in name.components() {
        components.put_bytes(TAG_COMPONENT, component.as_bytes());
    }

    let mut writer = TlvWriter::new();
    writer.put_bytes(TAG_NAME, &components.into_bytes());
    writer.put_bytes(TAG_CONTENT, content);
    writer.put_bytes(TAG_KEY_DIGEST, signer);
    writer.into_bytes()
}

#[derive(Debug, Error)]
pub enum PublicationError {
    #[error("signature does not match signer and publication bytes")]
    BadSignature,
}
