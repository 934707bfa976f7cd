// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory collaborators for driving distributors through whole scenarios: a toy certificate
//! authority, per-peer cert-store views and a deterministic pub/sub fabric with a manual clock,
//! a timer wheel and retained publications.
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::crypto::sha2::sha2_256;
use crate::crypto::Rng;
use crate::distributor::engine::{
    Command, Distributor, DistributorConfig, DistributorState, Epoch, Event, TimerKind, Topic,
};
use crate::group_key::{GroupKey, Timestamp};
use crate::name::Name;
use crate::publication::{Publication, Thumbprint};
use crate::traits::CertStore;

/// Capability set carried on a test identity's signing chain.
#[derive(Clone, Debug, Default)]
pub struct Capabilities(HashMap<String, String>);

impl Capabilities {
    /// Publish-only identity.
    pub fn none() -> Self {
        Self::default()
    }

    /// Subscriber of the given collection.
    pub fn subscriber(collection: &str) -> Self {
        Self::default().with("SG", collection)
    }

    /// Subscriber that is eligible to make keys (publication-level capability).
    pub fn key_maker(collection: &str, priority: u8) -> Self {
        Self::subscriber(collection).with("KMP", &priority.to_string())
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Clone, Debug)]
struct TestCert {
    signing_key: SigningKey,
    capabilities: HashMap<String, String>,
    valid_until: Timestamp,
}

/// Issues test certificates and hands out per-peer store views.
#[derive(Clone, Debug, Default)]
pub struct CertAuthority {
    certs: HashMap<Thumbprint, TestCert>,
}

impl CertAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity and returns its certificate thumbprint.
    pub fn issue(
        &mut self,
        signing_key: SigningKey,
        capabilities: Capabilities,
        valid_until: Timestamp,
    ) -> Thumbprint {
        let tp = sha2_256(&[
            signing_key.verifying_key().as_bytes(),
            &valid_until.to_be_bytes(),
        ]);
        self.certs.insert(
            tp,
            TestCert {
                signing_key,
                capabilities: capabilities.0,
                valid_until,
            },
        );
        tp
    }

    /// Snapshot of the store as seen by one peer.
    pub fn store_for(&self, local: Thumbprint) -> MemoryCertStore {
        MemoryCertStore {
            local,
            certs: self.certs.clone(),
        }
    }
}

/// Cert-store view holding every certificate the authority issued.
#[derive(Clone, Debug)]
pub struct MemoryCertStore {
    local: Thumbprint,
    certs: HashMap<Thumbprint, TestCert>,
}

impl MemoryCertStore {
    /// Drops a capability from a chain, modelling a signing-chain change mid-session.
    pub fn revoke_capability(&mut self, tp: &Thumbprint, name: &str) {
        if let Some(cert) = self.certs.get_mut(tp) {
            cert.capabilities.remove(name);
        }
    }
}

impl CertStore for MemoryCertStore {
    fn local_thumbprint(&self) -> Thumbprint {
        self.local
    }

    fn signing_key(&self, tp: &Thumbprint) -> Option<SigningKey> {
        self.certs.get(tp).map(|cert| cert.signing_key.clone())
    }

    fn contains(&self, tp: &Thumbprint) -> bool {
        self.certs.contains_key(tp)
    }

    fn public_key(&self, tp: &Thumbprint) -> Option<VerifyingKey> {
        self.certs
            .get(tp)
            .map(|cert| cert.signing_key.verifying_key())
    }

    fn valid_until(&self, tp: &Thumbprint) -> Option<Timestamp> {
        self.certs.get(tp).map(|cert| cert.valid_until)
    }

    fn capability(&self, tp: &Thumbprint, name: &str) -> Option<String> {
        self.certs
            .get(tp)?
            .capabilities
            .get(name)
            .cloned()
    }
}

struct Peer {
    state: Option<DistributorState<MemoryCertStore>>,
    subscriptions: HashSet<Topic>,
    timers: HashMap<TimerKind, Timestamp>,
    election_priority: Option<u8>,
    adopted_keys: Vec<GroupKey>,
    connected_signals: usize,
}

struct Retained {
    publication: Publication,
    from: Thumbprint,
    confirm: bool,
    expires: Timestamp,
}

/// Deterministic single-threaded pub/sub fabric.
///
/// Publications are retained for their advertised lifetime and replayed to late subscribers,
/// duplicates are collapsed by name, and timers fire in timestamp order under a manual clock.
pub struct Fabric {
    pub rng: Rng,
    now: Timestamp,
    peers: BTreeMap<Thumbprint, Peer>,
    queue: VecDeque<usize>,
    retained: Vec<Retained>,
    delivered: HashSet<(Thumbprint, Name)>,
}

/// An arbitrary but fixed scenario start time (µs since the UNIX epoch).
pub const START_TIME: Timestamp = 1_700_000_000_000_000;

impl Fabric {
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            rng: Rng::from_seed(seed),
            now: START_TIME,
            peers: BTreeMap::new(),
            queue: VecDeque::new(),
            retained: Vec::new(),
            delivered: HashSet::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Initializes a peer's distributor, runs its setup and applies the resulting commands.
    pub fn add_peer(
        &mut self,
        authority: &CertAuthority,
        tp: Thumbprint,
        config: DistributorConfig,
    ) {
        let state = Distributor::init(config, authority.store_for(tp))
            .expect("test identities initialize");
        let (state, commands) = Distributor::setup(state);
        self.peers.insert(
            tp,
            Peer {
                state: Some(state),
                subscriptions: HashSet::new(),
                timers: HashMap::new(),
                election_priority: None,
                adopted_keys: Vec::new(),
                connected_signals: 0,
            },
        );
        self.apply(tp, commands);
        self.run();
    }

    /// Settles the election externally: every candidate learns whether it won.
    pub fn complete_election(&mut self, winner: Thumbprint, epoch: Epoch) {
        let candidates: Vec<Thumbprint> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.election_priority.is_some())
            .map(|(tp, _)| *tp)
            .collect();
        for tp in candidates {
            self.feed(
                tp,
                Event::ElectionCompleted {
                    elected: tp == winner,
                    epoch,
                },
            );
        }
        self.run();
    }

    /// Reports a single peer's election outcome, e.g. to model partitioned elections.
    pub fn complete_election_for(&mut self, tp: Thumbprint, elected: bool, epoch: Epoch) {
        self.feed(tp, Event::ElectionCompleted { elected, epoch });
        self.run();
    }

    /// Moves the clock forward, firing due timers in order and draining the fabric after each.
    pub fn advance(&mut self, duration: Duration) {
        let target = self.now + duration.as_micros() as Timestamp;
        loop {
            let due = self
                .peers
                .iter()
                .flat_map(|(tp, peer)| {
                    peer.timers
                        .iter()
                        .map(|(kind, fire_at)| (*fire_at, *tp, *kind))
                })
                .filter(|(fire_at, _, _)| *fire_at <= target)
                .min();
            let Some((fire_at, tp, kind)) = due else {
                break;
            };
            self.now = fire_at;
            self.peer_mut(&tp).timers.remove(&kind);
            self.feed(tp, Event::TimerFired(kind));
            self.run();
        }
        self.now = target;
    }

    /// Delivers queued publications until the fabric is quiet.
    pub fn run(&mut self) {
        while let Some(index) = self.queue.pop_front() {
            let (publication, from, confirm) = {
                let retained = &self.retained[index];
                (
                    retained.publication.clone(),
                    retained.from,
                    retained.confirm,
                )
            };

            let targets: Vec<(Thumbprint, Topic)> = self
                .peers
                .iter()
                .filter(|(tp, _)| **tp != from)
                .filter_map(|(tp, peer)| {
                    Some((*tp, self.matching_topic(peer, publication.name())?))
                })
                .collect();

            let mut delivered_to_any = false;
            for (tp, topic) in targets {
                if !self.delivered.insert((tp, publication.name().clone())) {
                    continue;
                }
                delivered_to_any = true;
                let event = match topic {
                    Topic::KeyRecords => Event::KeyRecordReceived(publication.clone()),
                    Topic::MembershipRequests => {
                        Event::MembershipRequestReceived(publication.clone())
                    }
                };
                self.feed(tp, event);
            }

            if confirm && delivered_to_any {
                self.feed(from, Event::DeliveryConfirmed(publication.name().clone()));
            }
        }
    }

    pub fn state(&self, tp: &Thumbprint) -> &DistributorState<MemoryCertStore> {
        self.peers
            .get(tp)
            .expect("peer exists")
            .state
            .as_ref()
            .expect("state is parked between events")
    }

    /// Keys this peer adopted, in adoption order.
    pub fn adopted_keys(&self, tp: &Thumbprint) -> &[GroupKey] {
        &self.peers.get(tp).expect("peer exists").adopted_keys
    }

    /// How many times `connected(true)` fired for this peer.
    pub fn connected_signals(&self, tp: &Thumbprint) -> usize {
        self.peers.get(tp).expect("peer exists").connected_signals
    }

    pub fn armed_timers(&self, tp: &Thumbprint) -> Vec<TimerKind> {
        self.peers
            .get(tp)
            .expect("peer exists")
            .timers
            .keys()
            .copied()
            .collect()
    }

    /// All retained key-record publications, for asserting on ranges and record counts.
    pub fn published_key_records(&self) -> Vec<&Publication> {
        self.retained
            .iter()
            .filter(|retained| {
                let peer = self.peers.get(&retained.from).expect("publisher exists");
                let state = peer.state.as_ref().expect("state is parked");
                state
                    .topic_prefix(Topic::KeyRecords)
                    .is_prefix_of(retained.publication.name())
            })
            .map(|retained| &retained.publication)
            .collect()
    }

    /// Asks the key-maker to drop a member, optionally rekeying immediately.
    pub fn remove_member(&mut self, key_maker: Thumbprint, member: &Thumbprint, rekey: bool) {
        let state = self
            .peer_mut(&key_maker)
            .state
            .take()
            .expect("state is parked between events");
        let (state, commands) = Distributor::remove_member(state, member, rekey, self.now, &self.rng)
            .expect("removing a member does not fail");
        self.peer_mut(&key_maker).state = Some(state);
        self.apply(key_maker, commands);
        self.run();
    }

    /// Injects a publication as if some peer published it, e.g. a hand-crafted key record.
    pub fn inject(&mut self, from: Thumbprint, publication: Publication, lifetime: Duration) {
        self.retain(publication, from, false, lifetime);
        self.run();
    }

    fn matching_topic(&self, peer: &Peer, name: &Name) -> Option<Topic> {
        let state = peer.state.as_ref().expect("state is parked");
        peer.subscriptions
            .iter()
            .copied()
            .find(|topic| state.topic_prefix(*topic).is_prefix_of(name))
    }

    fn feed(&mut self, tp: Thumbprint, event: Event) {
        let state = self
            .peer_mut(&tp)
            .state
            .take()
            .expect("state is parked between events");
        let (state, commands) =
            Distributor::process(state, event, self.now, &self.rng).expect("processing succeeds");
        self.peer_mut(&tp).state = Some(state);
        self.apply(tp, commands);
    }

    fn apply(&mut self, tp: Thumbprint, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Publish(publication) => {
                    let lifetime = self.publication_lifetime(&tp, publication.name());
                    self.retain(publication, tp, false, lifetime);
                }
                Command::PublishWithConfirmation(publication) => {
                    let lifetime = self.publication_lifetime(&tp, publication.name());
                    self.retain(publication, tp, true, lifetime);
                }
                Command::Subscribe(topic) => {
                    self.peer_mut(&tp).subscriptions.insert(topic);
                    self.replay_retained(tp, topic);
                }
                Command::Unsubscribe(topic) => {
                    self.peer_mut(&tp).subscriptions.remove(&topic);
                }
                Command::JoinElection { priority, .. } => {
                    self.peer_mut(&tp).election_priority = Some(priority);
                }
                Command::StartTimer { kind, delay } => {
                    let fire_at = self.now + delay.as_micros() as Timestamp;
                    self.peer_mut(&tp).timers.insert(kind, fire_at);
                }
                Command::CancelTimer(kind) => {
                    self.peer_mut(&tp).timers.remove(&kind);
                }
                Command::NewKey(key) => {
                    self.peer_mut(&tp).adopted_keys.push(key);
                }
                Command::Connected => {
                    self.peer_mut(&tp).connected_signals += 1;
                }
            }
        }
    }

    fn retain(&mut self, publication: Publication, from: Thumbprint, confirm: bool, lifetime: Duration) {
        self.retained.push(Retained {
            publication,
            from,
            confirm,
            expires: self.now + lifetime.as_micros() as Timestamp,
        });
        self.queue.push_back(self.retained.len() - 1);
    }

    /// Late subscribers receive the retained publications that are still alive, the way the
    /// sync transport replays collection state.
    fn replay_retained(&mut self, tp: Thumbprint, topic: Topic) {
        let now = self.now;
        let replayable: Vec<usize> = self
            .retained
            .iter()
            .enumerate()
            .filter(|(_, retained)| retained.from != tp && retained.expires > now)
            .filter(|(_, retained)| {
                let peer = self.peers.get(&tp).expect("peer exists");
                let state = peer.state.as_ref().expect("state is parked");
                state
                    .topic_prefix(topic)
                    .is_prefix_of(retained.publication.name())
            })
            .map(|(index, _)| index)
            .collect();
        self.queue.extend(replayable);
    }

    fn publication_lifetime(&self, tp: &Thumbprint, name: &Name) -> Duration {
        let peer = self.peers.get(tp).expect("peer exists");
        peer.state
            .as_ref()
            .expect("state is parked")
            .publication_lifetime(name)
    }

    fn peer_mut(&mut self, tp: &Thumbprint) -> &mut Peer {
        self.peers.get_mut(tp).expect("peer exists")
    }
}
