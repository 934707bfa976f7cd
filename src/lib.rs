// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sgkey` distributes an X25519 subscriber-group key pair to the authorized subscribers of a
//! trust domain over a publish/subscribe synchronization transport.
//!
//! Any peer of the domain may encrypt towards the group using the broadcast public key, but only
//! peers whose signing chain carries the subscriber capability receive the secret half. An
//! elected **key-maker** mints the pair, seals the secret key individually for every enrolled
//! member with an anonymous sealed box (ephemeral X25519 + AEAD, see
//! [the libsodium construction](https://libsodium.gitbook.io/doc/advanced/ed25519-curve25519))
//! and publishes range-addressed **key records**. Prospective subscribers advertise themselves
//! with signed **membership requests**, detect omission from newer key ranges and retry.
//! Split-brain key-makers after a partition heal converge deterministically: the larger signer
//! thumbprint wins.
//!
//! ## Integration
//!
//! The crate is transport-agnostic: [`distributor::Distributor`] is a pure state machine fed with
//! [`distributor::Event`]s and answering with [`distributor::Command`]s (publications to submit,
//! subscriptions, timers, key hand-overs). The surrounding event loop supplies the clock, the
//! certificate store ([`traits::CertStore`]) and executes commands against the sync transport.
//! All processing is single-threaded and run-to-completion; there is no internal locking.
//!
//! Out of scope here: the sync transport itself, certificate-chain validation and the key-maker
//! election sub-protocol (only its completion is reported to the engine).
pub mod crypto;
pub mod distributor;
pub mod group_key;
pub mod key_record;
pub mod name;
pub mod publication;
pub mod tlv;
pub mod traits;

pub use crypto::{Rng, RngError};
pub use distributor::{
    Command, Distributor, DistributorConfig, DistributorError, DistributorScope, DistributorState,
    Epoch, Event, TimerKind, Topic,
};
pub use group_key::{GroupKey, GroupKeyPair, Timestamp};
pub use name::{Component, Name};
pub use publication::{Publication, Thumbprint, THUMBPRINT_SIZE};
