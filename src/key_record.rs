// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-record publication codec.
//!
//! One key-record publication carries the group key creation time, the group public key in the
//! clear, and a bounded run of fixed-size records `thumbprint ‖ sealed secret`, sorted by
//! recipient thumbprint. The name advertises the `[low, high]` range of thumbprint prefixes
//! carried so recipients outside the range can skip the content entirely:
//!
//! ```text
//! <prefix>/kr/<epoch>/<low tp[0..4]>/<high tp[0..4]>/<timestamp µs>
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::sealed_box::SEAL_OVERHEAD;
use crate::crypto::x25519::{PublicKey, PUBLIC_KEY_SIZE};
use crate::group_key::{Timestamp, GROUP_SECRET_KEY_SIZE};
use crate::name::Name;
use crate::publication::{Thumbprint, THUMBPRINT_SIZE};
use crate::tlv::{TlvError, TlvReader, TlvWriter};

pub const TAG_CREATION_TIME: u32 = 36;

pub const TAG_GROUP_PUBLIC_KEY: u32 = 150;

pub const TAG_KEY_RECORDS: u32 = 130;

/// A group secret key after sealing: 32 bytes of key plus the sealed-box overhead.
pub const SEALED_KEY_SIZE: usize = GROUP_SECRET_KEY_SIZE + SEAL_OVERHEAD;

/// Wire size of one record: recipient thumbprint followed by the sealed secret.
pub const KEY_RECORD_SIZE: usize = THUMBPRINT_SIZE + SEALED_KEY_SIZE;

/// Upper bound for an encoded publication, agreed across the trust domain.
pub const MAX_PUBLICATION_SIZE: usize = 1024;

/// Bytes reserved for name, signature and TLV framing inside [`MAX_PUBLICATION_SIZE`].
const ENVELOPE_OVERHEAD: usize = 96;

/// How many records fit in one publication. All members must agree on this constant since it
/// determines how a rekey is split across publications.
pub const MAX_KEY_RECORDS: usize =
    (MAX_PUBLICATION_SIZE - PUBLIC_KEY_SIZE - 8 - ENVELOPE_OVERHEAD) / KEY_RECORD_SIZE;

/// Leading thumbprint bytes used as range endpoints in key-record names.
pub const TP_PREFIX_SIZE: usize = 4;

pub type ThumbprintPrefix = [u8; TP_PREFIX_SIZE];

pub fn thumbprint_prefix(tp: &Thumbprint) -> ThumbprintPrefix {
    tp[..TP_PREFIX_SIZE]
        .try_into()
        .expect("thumbprint is longer than its prefix")
}

/// The group secret key sealed for one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKeyRecord {
    pub recipient: Thumbprint,
    #[serde(with = "serde_bytes")]
    pub sealed_secret: [u8; SEALED_KEY_SIZE],
}

/// Decoded content of a key-record publication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyRecordList {
    pub created_at: Timestamp,
    pub group_public: PublicKey,
    pub records: Vec<SealedKeyRecord>,
}

impl KeyRecordList {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = TlvWriter::new();
        writer.put_number(TAG_CREATION_TIME, self.created_at);
        writer.put_bytes(TAG_GROUP_PUBLIC_KEY, self.group_public.as_bytes());

        let mut records = Vec::with_capacity(self.records.len() * KEY_RECORD_SIZE);
        for record in &self.records {
            records.extend_from_slice(&record.recipient);
            records.extend_from_slice(&record.sealed_secret);
        }
        writer.put_bytes(TAG_KEY_RECORDS, &records);
        writer.into_bytes()
    }

    pub fn decode(content: &[u8]) -> Result<Self, KeyRecordError> {
        let mut reader = TlvReader::new(content);

        let created_at = reader.next_number(TAG_CREATION_TIME)?;

        let public = reader.next_bytes(TAG_GROUP_PUBLIC_KEY)?;
        let group_public = PublicKey::from_bytes(
            public
                .try_into()
                .map_err(|_| KeyRecordError::BadPublicKeyLength(public.len()))?,
        );

        // Absent in the key-maker's anchor record.
        let mut records = Vec::new();
        if let Some(run) = reader.next_bytes_opt(TAG_KEY_RECORDS)? {
            if run.len() % KEY_RECORD_SIZE != 0 {
                return Err(KeyRecordError::RaggedRecordRun(run.len()));
            }
            records.reserve(run.len() / KEY_RECORD_SIZE);
            for chunk in run.chunks_exact(KEY_RECORD_SIZE) {
                records.push(SealedKeyRecord {
                    recipient: chunk[..THUMBPRINT_SIZE]
                        .try_into()
                        .expect("chunk starts with a full thumbprint"),
                    sealed_secret: chunk[THUMBPRINT_SIZE..]
                        .try_into()
                        .expect("chunk ends with a full sealed secret"),
                });
            }
        }

        Ok(Self {
            created_at,
            group_public,
            records,
        })
    }
}

/// The variable tail of a key-record name, relative to the `<prefix>/kr` subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyRecordName {
    pub epoch: u32,
    pub low: ThumbprintPrefix,
    pub high: ThumbprintPrefix,
    pub timestamp: Timestamp,
}

impl KeyRecordName {
    pub fn build(&self, kr_prefix: &Name) -> Name {
        kr_prefix
            .with_number(u64::from(self.epoch))
            .with_bytes(self.low.to_vec())
            .with_bytes(self.high.to_vec())
            .with_number(self.timestamp)
    }

    pub fn parse(name: &Name, kr_prefix: &Name) -> Result<Self, KeyRecordError> {
        if !kr_prefix.is_prefix_of(name) || name.len() != kr_prefix.len() + 4 {
            return Err(KeyRecordError::BadName);
        }

        let component = |index: usize| {
            name.component(kr_prefix.len() + index)
                .expect("length checked above")
        };

        let epoch = component(0).as_number()?;
        let epoch = u32::try_from(epoch).map_err(|_| KeyRecordError::BadEpoch(epoch))?;
        let low: ThumbprintPrefix = component(1)
            .as_bytes()
            .try_into()
            .map_err(|_| KeyRecordError::BadName)?;
        let high: ThumbprintPrefix = component(2)
            .as_bytes()
            .try_into()
            .map_err(|_| KeyRecordError::BadName)?;
        let timestamp = component(3).as_number()?;

        Ok(Self {
            epoch,
            low,
            high,
            timestamp,
        })
    }
}

/// Builds `<prefix>/mr/<timestamp µs>`; membership requests have no content, the signer
/// thumbprint in the signature info is the whole message.
pub fn membership_request_name(mr_prefix: &Name, timestamp: Timestamp) -> Name {
    mr_prefix.with_number(timestamp)
}

#[derive(Debug, Error)]
pub enum KeyRecordError {
    #[error(transparent)]
    Tlv(#[from] TlvError),

    #[error("group public key has {0} bytes")]
    BadPublicKeyLength(usize),

    #[error("record run of {0} bytes is not a whole number of records")]
    RaggedRecordRun(usize),

    #[error("name does not lie in the key-record subtree")]
    BadName,

    #[error("epoch {0} does not fit in 32 bits")]
    BadEpoch(u64),
}
