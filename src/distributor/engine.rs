// SPDX-License-Identifier: MIT OR Apache-2.0

//! The subscriber-group key distributor.
//!
//! One distributor instance runs per peer and per key collection. Depending on the capabilities
//! carried on the peer's signing chain it acts as:
//!
//! - a **publisher**, watching key records only for the group public key,
//! - a **subscriber**, soliciting enrollment with membership requests and unsealing its copy of
//!   the group secret key from received key records, or
//! - a **key-maker**, the election winner that mints the group key pair, seals the secret half
//!   for every enrolled member and republishes on rotation or member arrival.
//!
//! The engine is a pure state machine: every entry point consumes the state, never blocks and
//! returns the updated state together with the [`Command`]s the surrounding event loop must carry
//! out (publications to hand to the sync transport, subscriptions, timers, key hand-overs).
//! Conflicting key-makers after a partition heal resolve deterministically: the larger signer
//! thumbprint wins and the loser re-enrolls as a plain subscriber.
use std::marker::PhantomData;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::ed25519::{public_key_to_x25519, signing_key_to_x25519, Ed25519Error};
use crate::crypto::x25519;
use crate::crypto::{sealed_box, Rng, RngError};
use crate::distributor::member_table::MemberTable;
use crate::group_key::{GroupKey, GroupKeyPair, Timestamp, GROUP_SECRET_KEY_SIZE};
use crate::key_record::{
    membership_request_name, thumbprint_prefix, KeyRecordList, KeyRecordName, SealedKeyRecord,
    MAX_KEY_RECORDS,
};
use crate::name::Name;
use crate::publication::{Publication, Thumbprint, NO_THUMBPRINT};
use crate::traits::CertStore;

/// Election term counter; starts at 1 with the first elected key-maker.
pub type Epoch = u32;

/// How long the sync transport keeps a membership request alive.
pub const MEMBERSHIP_REQUEST_LIFETIME: Duration = Duration::from_millis(6000);

/// How long the sync transport keeps an election-candidate publication alive.
pub const ELECTION_CANDIDATE_LIFETIME: Duration = Duration::from_millis(1000);

/// Wait before re-requesting membership after being left out of a newer key's range.
pub const DEFERRED_REQUEST_DELAY: Duration = Duration::from_millis(2000);

/// Whether this distributor serves PDU-level or publication-level keys.
///
/// The two levels use distinct key-maker capabilities so a trust schema can authorize them
/// independently, and give the election different settle windows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DistributorScope {
    Pdu,
    Publication,
}

impl DistributorScope {
    /// Name of the capability whose single-digit argument is the election priority.
    pub fn key_maker_capability(&self) -> &'static str {
        match self {
            DistributorScope::Pdu => "KM",
            DistributorScope::Publication => "KMP",
        }
    }

    pub fn election_window(&self) -> Duration {
        match self {
            DistributorScope::Pdu => Duration::from_millis(500),
            DistributorScope::Publication => Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DistributorConfig {
    /// Name subtree of this distributor's collection, e.g. `/<domain>/keys/pubs`.
    pub prefix: Name,

    /// Capability argument that marks a signing chain as subscriber of this collection.
    pub collection: String,

    pub scope: DistributorScope,

    pub rekey_interval: Duration,

    /// Spread added to the rekey interval so domains do not rekey in lock-step.
    pub rekey_randomize: Duration,

    /// Grace period added to the key-record lifetime so expiring records outlive the rotation.
    pub expiration_grace: Duration,
}

impl DistributorConfig {
    pub fn new(prefix: Name, collection: impl Into<String>, scope: DistributorScope) -> Self {
        Self {
            prefix,
            collection: collection.into(),
            scope,
            rekey_interval: Duration::from_secs(3600),
            rekey_randomize: Duration::from_secs(10),
            expiration_grace: Duration::from_secs(60),
        }
    }

    /// How long a distributed key stays current; also the membership-request refresh interval.
    pub fn key_lifetime(&self) -> Duration {
        self.rekey_interval + self.rekey_randomize
    }

    fn record_lifetime(&self) -> Duration {
        self.key_lifetime() + self.expiration_grace
    }
}

/// Topics the engine asks the transport to (un)subscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    KeyRecords,
    MembershipRequests,
}

/// Timers the engine arms; starting a kind replaces any pending timer of the same kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Periodic rekey. Never cancelled; the handler self-gates on the key-maker flag.
    Rekey,

    /// Re-publish an unanswered membership request.
    RequestRefresh,

    /// One-shot membership request after being omitted from a newer key's range.
    DeferredRequest,
}

/// Everything that can wake the engine.
#[derive(Clone, Debug)]
pub enum Event {
    /// A publication arrived in the key-record subtree.
    KeyRecordReceived(Publication),

    /// A publication arrived in the membership-request subtree (key-maker only).
    MembershipRequestReceived(Publication),

    /// The election sub-protocol settled.
    ElectionCompleted { elected: bool, epoch: Epoch },

    TimerFired(TimerKind),

    /// The transport confirmed delivery of a publication submitted with confirmation.
    DeliveryConfirmed(Name),
}

/// Side effects the event loop must apply, in order.
#[derive(Clone, Debug)]
pub enum Command {
    Publish(Publication),

    /// Publish and report delivery back via [`Event::DeliveryConfirmed`].
    PublishWithConfirmation(Publication),

    Subscribe(Topic),

    Unsubscribe(Topic),

    /// Enter the key-maker election with the given priority.
    JoinElection { priority: u8, window: Duration },

    StartTimer { kind: TimerKind, delay: Duration },

    CancelTimer(TimerKind),

    /// The local view of the group key advanced.
    NewKey(GroupKey),

    /// Initialization finished; emitted exactly once per instance.
    Connected,
}

/// Subscriber-group key distributor engine.
///
/// All functions are associated functions taking the state by value, mirroring the
/// single-threaded cooperative model: one event is processed to completion before the next.
pub struct Distributor<CS> {
    _marker: PhantomData<CS>,
}

#[derive(Debug)]
pub struct DistributorState<CS: CertStore> {
    pub(crate) config: DistributorConfig,
    pub(crate) kr_prefix: Name,
    pub(crate) mr_prefix: Name,
    pub(crate) election_prefix: Name,
    pub(crate) certs: CS,

    /// Thumbprint of the local signing certificate.
    pub(crate) my_tp: Thumbprint,

    /// Largest key-maker thumbprint seen so far in this epoch.
    pub(crate) km_tp: Thumbprint,

    /// Local identity converted for opening sealed boxes; present iff subscriber.
    pub(crate) decrypt_public: Option<x25519::PublicKey>,
    pub(crate) decrypt_secret: Option<x25519::SecretKey>,

    /// The pair this key-maker mints and reseals; `None` on every other role.
    pub(crate) group_key: Option<GroupKeyPair>,

    /// Creation time of the currently adopted key; adoption is strictly monotone.
    pub(crate) current_created_at: Timestamp,

    pub(crate) members: MemberTable,
    pub(crate) epoch: Epoch,
    pub(crate) is_key_maker: bool,
    pub(crate) is_subscriber: bool,
    pub(crate) init: bool,
    pub(crate) request_pending: bool,
}

impl<CS: CertStore> DistributorState<CS> {
    pub fn thumbprint(&self) -> &Thumbprint {
        &self.my_tp
    }

    pub fn recorded_key_maker(&self) -> &Thumbprint {
        &self.km_tp
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_key_maker(&self) -> bool {
        self.is_key_maker
    }

    pub fn is_subscriber(&self) -> bool {
        self.is_subscriber
    }

    pub fn current_created_at(&self) -> Timestamp {
        self.current_created_at
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_pending_request(&self) -> bool {
        self.request_pending
    }

    pub fn topic_prefix(&self, topic: Topic) -> &Name {
        match topic {
            Topic::KeyRecords => &self.kr_prefix,
            Topic::MembershipRequests => &self.mr_prefix,
        }
    }

    /// Per-publication lifetime the sync transport should apply in this collection.
    pub fn publication_lifetime(&self, name: &Name) -> Duration {
        if self.mr_prefix.is_prefix_of(name) {
            MEMBERSHIP_REQUEST_LIFETIME
        } else if self.election_prefix.is_prefix_of(name) {
            ELECTION_CANDIDATE_LIFETIME
        } else {
            self.config.record_lifetime()
        }
    }
}

pub type DistributorResult<CS> =
    Result<(DistributorState<CS>, Vec<Command>), DistributorError>;

impl<CS: CertStore> Distributor<CS> {
    /// Builds the initial state for the local identity.
    ///
    /// Determines the subscriber role from the signing chain and derives the X25519 form of the
    /// identity key for later sealed-box opening. A local identity whose key cannot be converted
    /// is a configuration error, not a droppable peer.
    pub fn init(config: DistributorConfig, certs: CS) -> Result<DistributorState<CS>, DistributorError> {
        let my_tp = certs.local_thumbprint();
        if !certs.contains(&my_tp) {
            return Err(DistributorError::MissingLocalCertificate);
        }

        let mut y = DistributorState {
            kr_prefix: config.prefix.with_str("kr"),
            mr_prefix: config.prefix.with_str("mr"),
            election_prefix: config.prefix.with_str("km").with_str("cand"),
            config,
            certs,
            my_tp,
            km_tp: NO_THUMBPRINT,
            decrypt_public: None,
            decrypt_secret: None,
            group_key: None,
            current_created_at: 0,
            members: MemberTable::new(),
            epoch: 0,
            is_key_maker: false,
            is_subscriber: false,
            init: true,
            request_pending: false,
        };

        y.is_subscriber = Self::subscriber_capability(&y, &my_tp);
        if y.is_subscriber {
            Self::derive_decrypt_keys(&mut y)?;
        }
        Ok(y)
    }

    /// Wires the distributor into the collection once active peers are known.
    ///
    /// Identities holding both the subscriber and a non-zero key-maker capability join the
    /// election and subscribe on its completion; everyone else watches key records right away.
    pub fn setup(y: DistributorState<CS>) -> (DistributorState<CS>, Vec<Command>) {
        let priority = Self::key_maker_priority(&y, &y.my_tp);
        let commands = if y.is_subscriber && priority > 0 {
            vec![Command::JoinElection {
                priority,
                window: y.config.scope.election_window(),
            }]
        } else {
            vec![Command::Subscribe(Topic::KeyRecords)]
        };
        (y, commands)
    }

    /// Feeds one event through the engine.
    pub fn process(
        y: DistributorState<CS>,
        event: Event,
        now: Timestamp,
        rng: &Rng,
    ) -> DistributorResult<CS> {
        match event {
            Event::KeyRecordReceived(p) => Self::on_key_record(y, &p, now),
            Event::MembershipRequestReceived(p) => Self::on_membership_request(y, &p, now, rng),
            Event::ElectionCompleted { elected, epoch } => {
                Self::on_election_completed(y, elected, epoch, now, rng)
            }
            Event::TimerFired(TimerKind::Rekey) => Self::on_rekey_timer(y, now, rng),
            Event::TimerFired(TimerKind::RequestRefresh)
            | Event::TimerFired(TimerKind::DeferredRequest) => {
                Self::publish_membership_request(y, now)
            }
            Event::DeliveryConfirmed(_) => {
                // Only the key-maker's anchor record asks for confirmation.
                let mut y = y;
                let mut commands = Vec::new();
                Self::init_done(&mut y, &mut commands);
                Ok((y, commands))
            }
        }
    }

    /// Handles a publication in the key-record subtree.
    ///
    /// The admission gates run in a fixed order and the first matching one returns: signer
    /// authority, key-maker conflict, init-state enrollment, epoch discipline, key-maker drift,
    /// range addressing, freshness, and finally unsealing.
    fn on_key_record(
        mut y: DistributorState<CS>,
        p: &Publication,
        now: Timestamp,
    ) -> DistributorResult<CS> {
        let mut commands = Vec::new();

        // Only identities holding the key-maker capability may sign key records.
        if Self::key_maker_priority(&y, p.signer()) == 0 {
            warn!(
                signer = %hex::encode(&p.signer()[..4]),
                "ignoring key record signed by unauthorized identity"
            );
            return Ok((y, commands));
        }

        if y.is_key_maker {
            // Another peer also claims to be key-maker; the larger thumbprint wins.
            if y.my_tp < *p.signer() {
                debug!(
                    winner = %hex::encode(&p.signer()[..4]),
                    "conceding key-maker role to larger thumbprint"
                );
                y.is_key_maker = false;
                y.km_tp = *p.signer();
                y.group_key = None;
                // Accept whatever key the winner currently distributes.
                y.current_created_at = 0;
                commands.push(Command::Unsubscribe(Topic::MembershipRequests));
                let (y, more) = Self::publish_membership_request(y, now)?;
                commands.extend(more);
                return Ok((y, commands));
            }
            return Ok((y, commands));
        }

        // A key record seen during initialization may predate our request; make sure the
        // key-maker learns about us before we look for our sealed secret.
        if y.init && y.is_subscriber && !y.request_pending {
            let (y, more) = Self::publish_membership_request(y, now)?;
            commands.extend(more);
            return Ok((y, commands));
        }

        let parts = match KeyRecordName::parse(p.name(), &y.kr_prefix) {
            Ok(parts) => parts,
            Err(err) => {
                debug!(name = %p.name(), %err, "dropping key record with malformed name");
                return Ok((y, commands));
            }
        };

        if parts.epoch != y.epoch {
            // One-shot election profile: re-elections beyond the first epoch are not supported
            // yet, records from them (and from superseded epochs) are ignored.
            if parts.epoch < y.epoch || parts.epoch > 1 {
                debug!(epoch = parts.epoch, ours = y.epoch, "dropping key record from foreign epoch");
                return Ok((y, commands));
            }
            y.epoch = parts.epoch;
            y.km_tp = NO_THUMBPRINT;
        }

        // A larger signer supersedes the recorded key-maker (partition heal); take its next key
        // unconditionally.
        if y.km_tp < *p.signer() {
            y.km_tp = *p.signer();
            y.current_created_at = 0;
        }

        let list = match KeyRecordList::decode(p.content()) {
            Ok(list) => list,
            Err(err) => {
                debug!(name = %p.name(), %err, "dropping malformed key record");
                return Ok((y, commands));
            }
        };

        // Range gate: the name advertises which thumbprints the record run covers.
        if y.is_subscriber {
            let my_prefix = thumbprint_prefix(&y.my_tp);
            if my_prefix < parts.low || parts.high < my_prefix {
                if list.created_at > y.current_created_at && !y.request_pending {
                    // A newer key is circulating without us; re-assert our membership.
                    commands.push(Command::StartTimer {
                        kind: TimerKind::DeferredRequest,
                        delay: DEFERRED_REQUEST_DELAY,
                    });
                }
                return Ok((y, commands));
            }
        }

        if list.created_at <= y.current_created_at {
            return Ok((y, commands));
        }

        if !y.is_subscriber {
            // Publishers adopt the public key only.
            y.current_created_at = list.created_at;
            commands.push(Command::NewKey(GroupKey {
                public: list.group_public,
                secret: None,
                created_at: list.created_at,
            }));
            Self::init_done(&mut y, &mut commands);
            return Ok((y, commands));
        }

        let Some(record) = list.records.iter().find(|r| r.recipient == y.my_tp) else {
            return Ok((y, commands));
        };

        let public = y
            .decrypt_public
            .as_ref()
            .expect("subscriber state carries converted identity keys");
        let secret = y
            .decrypt_secret
            .as_ref()
            .expect("subscriber state carries converted identity keys");
        let opened = match sealed_box::open(&record.sealed_secret, public, secret) {
            Ok(opened) => opened,
            Err(err) => {
                debug!(name = %p.name(), %err, "could not open sealed group key");
                return Ok((y, commands));
            }
        };
        let Ok(secret_bytes) = <[u8; GROUP_SECRET_KEY_SIZE]>::try_from(opened) else {
            debug!(name = %p.name(), "sealed record opened to wrong key size");
            return Ok((y, commands));
        };

        y.current_created_at = list.created_at;
        commands.push(Command::NewKey(GroupKey {
            public: list.group_public,
            secret: Some(x25519::SecretKey::from_bytes(secret_bytes)),
            created_at: list.created_at,
        }));
        // The request is answered; stop refreshing it. A deferred re-request armed by an
        // earlier chunk of the same rekey is moot as well.
        y.request_pending = false;
        commands.push(Command::CancelTimer(TimerKind::RequestRefresh));
        commands.push(Command::CancelTimer(TimerKind::DeferredRequest));
        Self::init_done(&mut y, &mut commands);
        Ok((y, commands))
    }

    /// Handles a membership request (key-maker only).
    ///
    /// Enrolls the requester and, when a group key already exists, answers with a single-record
    /// key record addressed to it alone; a full rekey is not needed for one arrival.
    fn on_membership_request(
        mut y: DistributorState<CS>,
        p: &Publication,
        now: Timestamp,
        rng: &Rng,
    ) -> DistributorResult<CS> {
        let commands = Vec::new();

        // Left-over subscription after losing the role; requests are the winner's business.
        if !y.is_key_maker {
            return Ok((y, commands));
        }
        if y.members.at_capacity() {
            warn!("member table at capacity, ignoring membership request");
            return Ok((y, commands));
        }

        let tp = *p.signer();
        if !Self::subscriber_capability(&y, &tp) {
            debug!(
                signer = %hex::encode(&tp[..4]),
                "ignoring membership request without subscriber capability"
            );
            return Ok((y, commands));
        }
        let Some(certified) = y.certs.public_key(&tp) else {
            debug!(signer = %hex::encode(&tp[..4]), "no certificate for requester");
            return Ok((y, commands));
        };
        let sealing_key = match public_key_to_x25519(certified.as_bytes()) {
            Ok(key) => key,
            Err(err) => {
                debug!(signer = %hex::encode(&tp[..4]), %err, "requester key does not convert");
                return Ok((y, commands));
            }
        };
        y.members.insert(tp, sealing_key);

        // Before the first rekey there is nothing to hand out; the initial key will cover the
        // new member.
        let Some(pair) = y.group_key.clone() else {
            return Ok((y, commands));
        };

        let mut commands = commands;
        let sealed = match sealed_box::seal(pair.secret().as_bytes(), &sealing_key, rng) {
            Ok(sealed) => sealed,
            Err(err) => {
                warn!(signer = %hex::encode(&tp[..4]), %err, "could not seal group key");
                return Ok((y, commands));
            }
        };
        let record = SealedKeyRecord {
            recipient: tp,
            sealed_secret: sealed
                .try_into()
                .expect("sealing a group secret yields a fixed-size box"),
        };
        let name = KeyRecordName {
            epoch: y.epoch,
            low: thumbprint_prefix(&tp),
            high: thumbprint_prefix(&tp),
            timestamp: now,
        }
        .build(&y.kr_prefix);
        let content = KeyRecordList {
            created_at: pair.created_at(),
            group_public: *pair.public(),
            records: vec![record],
        }
        .encode();
        let publication = Self::sign_publication(&y, name, content)?;
        commands.push(Command::Publish(publication));

        // A key-maker with a key and at least one member has finished initializing.
        Self::init_done(&mut y, &mut commands);
        Ok((y, commands))
    }

    /// Election settled; everyone watches key records, the winner additionally serves requests
    /// and mints the first key.
    fn on_election_completed(
        mut y: DistributorState<CS>,
        elected: bool,
        epoch: Epoch,
        now: Timestamp,
        rng: &Rng,
    ) -> DistributorResult<CS> {
        y.is_key_maker = elected;
        y.epoch = epoch;

        // Subscribing even when not elected detects conflicting key-makers later.
        let mut commands = vec![Command::Subscribe(Topic::KeyRecords)];
        if !elected {
            return Ok((y, commands));
        }

        y.km_tp = y.my_tp;
        commands.push(Command::Subscribe(Topic::MembershipRequests));
        let (y, more) = Self::rekey(y, now, rng)?;
        commands.extend(more);
        commands.push(Command::StartTimer {
            kind: TimerKind::Rekey,
            delay: y.config.rekey_interval,
        });
        Ok((y, commands))
    }

    /// Periodic rekey tick. The timer is never cancelled, so a peer that lost the role in the
    /// meantime lets it pass without effect.
    fn on_rekey_timer(
        y: DistributorState<CS>,
        now: Timestamp,
        rng: &Rng,
    ) -> DistributorResult<CS> {
        if !y.is_key_maker {
            return Ok((y, Vec::new()));
        }
        let (y, mut commands) = Self::rekey(y, now, rng)?;
        commands.push(Command::StartTimer {
            kind: TimerKind::Rekey,
            delay: y.config.rekey_interval,
        });
        Ok((y, commands))
    }

    /// Mints a fresh group key pair, seals it for every live member and publishes the sorted
    /// record run split across range-addressed publications.
    fn rekey(mut y: DistributorState<CS>, now: Timestamp, rng: &Rng) -> DistributorResult<CS> {
        let mut commands = Vec::new();

        let pair = GroupKeyPair::generate(rng, now)?;
        y.current_created_at = now;
        y.members.sweep_expired(&y.certs, now);

        // Members iterate in thumbprint order, so each chunk covers a contiguous range and the
        // name endpoints let uncovered recipients skip early.
        let mut sealed_records = Vec::with_capacity(y.members.len());
        for (tp, sealing_key) in y.members.iter() {
            match sealed_box::seal(pair.secret().as_bytes(), sealing_key, rng) {
                Ok(sealed) => sealed_records.push(SealedKeyRecord {
                    recipient: *tp,
                    sealed_secret: sealed
                        .try_into()
                        .expect("sealing a group secret yields a fixed-size box"),
                }),
                Err(err) => {
                    warn!(member = %hex::encode(&tp[..4]), %err, "could not seal for member");
                }
            }
        }

        // Flip local encryption to the new pair before remote peers learn it; the old pair still
        // decrypts traffic already in flight.
        y.group_key = Some(pair.clone());
        commands.push(Command::NewKey(GroupKey {
            public: *pair.public(),
            secret: Some(pair.secret().clone()),
            created_at: now,
        }));

        if sealed_records.is_empty() {
            // No subscribers yet: publish an anchor record carrying only the public key so
            // publishers see the key-maker exists. Confirmation of its delivery ends init.
            let name = KeyRecordName {
                epoch: y.epoch,
                low: thumbprint_prefix(&y.my_tp),
                high: thumbprint_prefix(&y.my_tp),
                timestamp: now,
            }
            .build(&y.kr_prefix);
            let content = KeyRecordList {
                created_at: now,
                group_public: *pair.public(),
                records: Vec::new(),
            }
            .encode();
            let publication = Self::sign_publication(&y, name, content)?;
            commands.push(Command::PublishWithConfirmation(publication));
            return Ok((y, commands));
        }

        for chunk in sealed_records.chunks(MAX_KEY_RECORDS) {
            let first = chunk.first().expect("chunks are never empty");
            let last = chunk.last().expect("chunks are never empty");
            let name = KeyRecordName {
                epoch: y.epoch,
                low: thumbprint_prefix(&first.recipient),
                high: thumbprint_prefix(&last.recipient),
                timestamp: now,
            }
            .build(&y.kr_prefix);
            let content = KeyRecordList {
                created_at: now,
                group_public: *pair.public(),
                records: chunk.to_vec(),
            }
            .encode();
            let publication = Self::sign_publication(&y, name, content)?;
            commands.push(Command::Publish(publication));
        }

        Self::init_done(&mut y, &mut commands);
        Ok((y, commands))
    }

    /// Publishes a signed membership request and arms its refresh timer.
    ///
    /// Re-publishing while one is outstanding restarts the refresh cycle, so at most one refresh
    /// timer is ever live.
    fn publish_membership_request(
        mut y: DistributorState<CS>,
        now: Timestamp,
    ) -> DistributorResult<CS> {
        let mut commands = vec![Command::CancelTimer(TimerKind::RequestRefresh)];
        if !y.is_subscriber {
            return Ok((y, commands));
        }

        let name = membership_request_name(&y.mr_prefix, now);
        let publication = Self::sign_publication(&y, name, Vec::new())?;
        y.request_pending = true;
        commands.push(Command::Publish(publication));
        commands.push(Command::StartTimer {
            kind: TimerKind::RequestRefresh,
            delay: y.config.key_lifetime(),
        });
        Ok((y, commands))
    }

    /// Stops sealing the group key for a member.
    ///
    /// With `rekey` set the current key is replaced immediately so the removed member cannot
    /// decrypt anything newer; the periodic schedule is left untouched.
    pub fn remove_member(
        mut y: DistributorState<CS>,
        tp: &Thumbprint,
        rekey: bool,
        now: Timestamp,
        rng: &Rng,
    ) -> DistributorResult<CS> {
        y.members.remove(tp);
        if rekey && y.is_key_maker {
            return Self::rekey(y, now, rng);
        }
        Ok((y, Vec::new()))
    }

    /// Processes a rotated local signing key.
    ///
    /// The converted decrypt keys are rebuilt and role membership re-checked; a signing chain
    /// that gained or lost the subscriber or key-maker capability mid-session is a fatal
    /// configuration error.
    pub fn update_signing_key(
        mut y: DistributorState<CS>,
        now: Timestamp,
    ) -> DistributorResult<CS> {
        y.my_tp = y.certs.local_thumbprint();

        let is_subscriber = Self::subscriber_capability(&y, &y.my_tp);
        if y.is_subscriber && !is_subscriber {
            return Err(DistributorError::SubscriberCapabilityChanged);
        }
        y.is_subscriber = is_subscriber;
        if !y.is_subscriber {
            // Publish-only identity; nothing further to update.
            return Ok((y, Vec::new()));
        }

        Self::derive_decrypt_keys(&mut y)?;

        if y.init {
            return Ok((y, Vec::new()));
        }
        if !y.is_key_maker {
            // Members must be re-enrolled under the new thumbprint.
            return Self::publish_membership_request(y, now);
        }
        if Self::key_maker_priority(&y, &y.my_tp) > 0 {
            y.km_tp = y.my_tp;
            Ok((y, Vec::new()))
        } else {
            Err(DistributorError::KeyMakerCapabilityChanged)
        }
    }

    fn derive_decrypt_keys(y: &mut DistributorState<CS>) -> Result<(), DistributorError> {
        let certified = y
            .certs
            .public_key(&y.my_tp)
            .ok_or(DistributorError::MissingLocalCertificate)?;
        y.decrypt_public = Some(public_key_to_x25519(certified.as_bytes())?);
        let signing_key = y
            .certs
            .signing_key(&y.my_tp)
            .ok_or(DistributorError::MissingSigningKey)?;
        y.decrypt_secret = Some(signing_key_to_x25519(&signing_key));
        Ok(())
    }

    fn sign_publication(
        y: &DistributorState<CS>,
        name: Name,
        content: Vec<u8>,
    ) -> Result<Publication, DistributorError> {
        let signing_key = y
            .certs
            .signing_key(&y.my_tp)
            .ok_or(DistributorError::MissingSigningKey)?;
        Ok(Publication::sign(name, content, y.my_tp, &signing_key))
    }

    fn init_done(y: &mut DistributorState<CS>, commands: &mut Vec<Command>) {
        if y.init {
            y.init = false;
            commands.push(Command::Connected);
        }
    }

    /// True when the signing chain carries the subscriber capability for this collection.
    fn subscriber_capability(y: &DistributorState<CS>, tp: &Thumbprint) -> bool {
        y.certs
            .capability(tp, "SG")
            .is_some_and(|argument| argument == y.config.collection)
    }

    /// Election priority from the signing chain; 0 when absent, malformed or disabled.
    fn key_maker_priority(y: &DistributorState<CS>, tp: &Thumbprint) -> u8 {
        y.certs
            .capability(tp, y.config.scope.key_maker_capability())
            .and_then(|argument| {
                let mut digits = argument.bytes();
                match (digits.next(), digits.next()) {
                    (Some(digit @ b'0'..=b'9'), None) => Some(digit - b'0'),
                    _ => None,
                }
            })
            .unwrap_or(0)
    }
}

#[derive(Debug, Error)]
pub enum DistributorError {
    #[error("certificate store has no certificate for the local identity")]
    MissingLocalCertificate,

    #[error("certificate store has no signing key for the local identity")]
    MissingSigningKey,

    #[error("subscriber capability changed mid-session, signing chain is untrustworthy")]
    SubscriberCapabilityChanged,

    #[error("key-maker capability changed mid-session, signing chain is untrustworthy")]
    KeyMakerCapabilityChanged,

    #[error("local identity key cannot be converted for sealed-box use: {0}")]
    LocalKeyConversion(#[from] Ed25519Error),

    #[error(transparent)]
    Rng(#[from] RngError),
}
