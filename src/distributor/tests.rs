// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use proptest::prelude::*;

use crate::crypto::ed25519::public_key_to_x25519;
use crate::crypto::{sealed_box, x25519, Rng};
use crate::distributor::engine::{
    Command, Distributor, DistributorConfig, DistributorError, DistributorScope, Epoch, TimerKind,
    Topic, DEFERRED_REQUEST_DELAY, ELECTION_CANDIDATE_LIFETIME, MEMBERSHIP_REQUEST_LIFETIME,
};
use crate::distributor::test_utils::{Capabilities, CertAuthority, Fabric, START_TIME};
use crate::group_key::{GroupKeyPair, Timestamp};
use crate::key_record::{
    thumbprint_prefix, KeyRecordList, KeyRecordName, SealedKeyRecord, MAX_KEY_RECORDS,
};
use crate::name::Name;
use crate::publication::{Publication, Thumbprint};
use crate::traits::CertStore;

const FAR_FUTURE: Timestamp = START_TIME + 10 * 365 * 24 * 3600 * 1_000_000;

fn config() -> DistributorConfig {
    DistributorConfig::new(
        Name::from_str_path("/domain/keys/pubs"),
        "pubs",
        DistributorScope::Publication,
    )
}

fn identity(rng: &Rng) -> SigningKey {
    SigningKey::from_bytes(&rng.random_array().expect("rng yields key material"))
}

fn sealed_record_for(
    recipient: Thumbprint,
    sealing_key: &x25519::PublicKey,
    pair: &GroupKeyPair,
    rng: &Rng,
) -> SealedKeyRecord {
    let sealed = sealed_box::seal(pair.secret().as_bytes(), sealing_key, rng).unwrap();
    SealedKeyRecord {
        recipient,
        sealed_secret: sealed.try_into().unwrap(),
    }
}

#[allow(clippy::too_many_arguments)]
fn key_record_publication(
    signer: &Thumbprint,
    signing_key: &SigningKey,
    epoch: Epoch,
    low: &Thumbprint,
    high: &Thumbprint,
    list: &KeyRecordList,
    name_timestamp: Timestamp,
) -> Publication {
    let name = KeyRecordName {
        epoch,
        low: thumbprint_prefix(low),
        high: thumbprint_prefix(high),
        timestamp: name_timestamp,
    }
    .build(&config().prefix.with_str("kr"));
    Publication::sign(name, list.encode(), *signer, signing_key)
}

// A lone key-maker anchors the collection so a publish-only peer learns the public key; neither
// peer needs a membership exchange.
#[test]
fn lone_publisher_and_key_maker() {
    let mut fabric = Fabric::new([1; 32]);
    let mut authority = CertAuthority::new();
    let maker = authority.issue(
        identity(&fabric.rng),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let publisher = authority.issue(identity(&fabric.rng), Capabilities::none(), FAR_FUTURE);

    fabric.add_peer(&authority, maker, config());
    fabric.add_peer(&authority, publisher, config());
    fabric.complete_election(maker, 1);

    // The publisher adopted the public key only and never asked for membership.
    let adopted = fabric.adopted_keys(&publisher);
    assert_eq!(adopted.len(), 1);
    assert!(adopted[0].secret.is_none());
    assert!(!fabric.state(&publisher).has_pending_request());

    // The key-maker held the full pair from the moment it was minted.
    let makers = fabric.adopted_keys(&maker);
    assert_eq!(makers.len(), 1);
    assert!(makers[0].secret.is_some());
    assert_eq!(makers[0].public, adopted[0].public);

    // Init finished exactly once on each side: the maker on confirmed delivery of its anchor,
    // the publisher on adoption.
    assert_eq!(fabric.connected_signals(&maker), 1);
    assert_eq!(fabric.connected_signals(&publisher), 1);
    assert_eq!(fabric.state(&maker).member_count(), 0);
}

#[test]
fn subscriber_joins_after_first_rekey() {
    let mut fabric = Fabric::new([2; 32]);
    let mut authority = CertAuthority::new();
    let maker = authority.issue(
        identity(&fabric.rng),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let joiner = authority.issue(
        identity(&fabric.rng),
        Capabilities::subscriber("pubs"),
        FAR_FUTURE,
    );

    fabric.add_peer(&authority, maker, config());
    fabric.complete_election(maker, 1);

    // The joiner sees the retained anchor record, requests membership and receives a key record
    // addressed to it alone, carrying the unchanged creation time of the existing key.
    fabric.add_peer(&authority, joiner, config());

    assert_eq!(fabric.state(&maker).member_count(), 1);
    let maker_keys = fabric.adopted_keys(&maker);
    let joiner_keys = fabric.adopted_keys(&joiner);
    assert_eq!(joiner_keys.len(), 1);
    assert!(joiner_keys[0].secret.is_some());
    assert_eq!(joiner_keys[0].public, maker_keys[0].public);
    assert_eq!(joiner_keys[0].created_at, maker_keys[0].created_at);

    // The request was answered: no pending request, no armed request timers.
    assert!(!fabric.state(&joiner).has_pending_request());
    assert!(fabric.armed_timers(&joiner).is_empty());
    assert_eq!(fabric.connected_signals(&joiner), 1);
}

// Split-brain healing: two key-makers from partitioned elections; on heal the smaller thumbprint
// concedes, re-enrolls and both sides converge on the larger one.
#[test]
fn split_brain_heals_to_larger_thumbprint() {
    let mut fabric = Fabric::new([3; 32]);
    let mut authority = CertAuthority::new();
    let first = authority.issue(
        identity(&fabric.rng),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let second = authority.issue(
        identity(&fabric.rng),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let (loser, winner) = if first < second {
        (first, second)
    } else {
        (second, first)
    };

    fabric.add_peer(&authority, loser, config());
    fabric.add_peer(&authority, winner, config());

    // Both sides of the partition elected themselves at epoch 1.
    fabric.complete_election_for(loser, true, 1);
    fabric.complete_election_for(winner, true, 1);

    assert!(!fabric.state(&loser).is_key_maker());
    assert!(fabric.state(&winner).is_key_maker());
    assert_eq!(fabric.state(&loser).recorded_key_maker(), &winner);
    assert_eq!(fabric.state(&winner).recorded_key_maker(), &winner);

    // The loser re-enrolled as a plain subscriber and now holds the winner's key.
    assert_eq!(fabric.state(&winner).member_count(), 1);
    let loser_keys = fabric.adopted_keys(&loser);
    let winner_keys = fabric.adopted_keys(&winner);
    assert_eq!(
        loser_keys.last().unwrap().public,
        winner_keys.last().unwrap().public
    );
    assert!(loser_keys.last().unwrap().secret.is_some());

    assert_eq!(fabric.connected_signals(&loser), 1);
    assert_eq!(fabric.connected_signals(&winner), 1);
}

// A subscriber left out of a newer key's range re-requests membership after a short delay and
// the key-maker answers with a record addressed to it alone.
#[test]
fn omitted_subscriber_retries_after_delay() {
    let mut fabric = Fabric::new([4; 32]);
    let mut authority = CertAuthority::new();
    let maker = authority.issue(
        identity(&fabric.rng),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let member = authority.issue(
        identity(&fabric.rng),
        Capabilities::subscriber("pubs"),
        FAR_FUTURE,
    );

    fabric.add_peer(&authority, maker, config());
    fabric.complete_election(maker, 1);
    fabric.add_peer(&authority, member, config());
    assert_eq!(fabric.state(&maker).member_count(), 1);
    let first_created_at = fabric.adopted_keys(&member)[0].created_at;

    // The key-maker drops the member and replaces the key immediately; the resulting record
    // (an anchor, the table is empty) does not cover the member's thumbprint.
    fabric.advance(Duration::from_secs(1));
    fabric.remove_member(maker, &member, true);
    let removal_time = fabric.now();
    assert_eq!(fabric.state(&maker).member_count(), 0);
    assert!(fabric
        .armed_timers(&member)
        .contains(&TimerKind::DeferredRequest));

    // No record for the removed member was issued with the new key.
    for publication in fabric.published_key_records() {
        let parts =
            KeyRecordName::parse(publication.name(), fabric.state(&maker).topic_prefix(Topic::KeyRecords))
                .unwrap();
        if parts.timestamp == removal_time {
            let list = KeyRecordList::decode(publication.content()).unwrap();
            assert!(list.records.is_empty());
        }
    }

    // After the deferred delay the member re-requests, is re-admitted and adopts the new key.
    fabric.advance(DEFERRED_REQUEST_DELAY);
    assert_eq!(fabric.state(&maker).member_count(), 1);
    let adopted = fabric.adopted_keys(&member);
    let latest = adopted.last().unwrap();
    assert!(latest.created_at > first_created_at);
    assert_eq!(
        latest.public,
        fabric.adopted_keys(&maker).last().unwrap().public
    );

    // Adoption times stayed strictly increasing throughout.
    assert!(adopted.windows(2).all(|w| w[0].created_at < w[1].created_at));
    assert_eq!(fabric.connected_signals(&member), 1);
}

// A member whose certificate expired is swept from the table at rekey time and no record is
// sealed for it.
#[test]
fn expired_member_swept_at_rekey() {
    let mut fabric = Fabric::new([5; 32]);
    let mut authority = CertAuthority::new();
    let maker = authority.issue(
        identity(&fabric.rng),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let ephemeral = authority.issue(
        identity(&fabric.rng),
        Capabilities::subscriber("pubs"),
        START_TIME + 60 * 1_000_000,
    );

    fabric.add_peer(&authority, maker, config());
    fabric.complete_election(maker, 1);
    fabric.add_peer(&authority, ephemeral, config());
    assert_eq!(fabric.state(&maker).member_count(), 1);

    // The certificate expires long before the periodic rekey fires.
    fabric.advance(config().rekey_interval);
    let rekey_time = fabric.now();

    assert_eq!(fabric.state(&maker).member_count(), 0);
    let rekey_records: Vec<_> = fabric
        .published_key_records()
        .into_iter()
        .filter(|publication| {
            KeyRecordName::parse(
                publication.name(),
                fabric.state(&maker).topic_prefix(Topic::KeyRecords),
            )
            .unwrap()
            .timestamp
                == rekey_time
        })
        .collect();
    assert_eq!(rekey_records.len(), 1);
    let list = KeyRecordList::decode(rekey_records[0].content()).unwrap();
    assert!(list.records.is_empty());

    // The swept member still holds only the key it adopted while enrolled.
    assert_eq!(fabric.adopted_keys(&ephemeral).len(), 1);
}

// Two key records, the newer first: the older one is dropped without any callback.
#[test]
fn stale_key_records_are_ignored() {
    let mut fabric = Fabric::new([6; 32]);
    let mut authority = CertAuthority::new();
    let maker_key = identity(&fabric.rng);
    let maker = authority.issue(
        maker_key.clone(),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let subscriber = authority.issue(
        identity(&fabric.rng),
        Capabilities::subscriber("pubs"),
        FAR_FUTURE,
    );
    fabric.add_peer(&authority, subscriber, config());

    let store = authority.store_for(subscriber);
    let sealing_key =
        public_key_to_x25519(store.public_key(&subscriber).unwrap().as_bytes()).unwrap();
    let lifetime = Duration::from_secs(3600);

    // First record seen in init state only triggers the membership request.
    let primer = GroupKeyPair::generate(&fabric.rng, 1).unwrap();
    let primer_list = KeyRecordList {
        created_at: 1,
        group_public: *primer.public(),
        records: Vec::new(),
    };
    fabric.inject(
        maker,
        key_record_publication(&maker, &maker_key, 1, &maker, &maker, &primer_list, START_TIME),
        lifetime,
    );
    assert!(fabric.state(&subscriber).has_pending_request());
    assert!(fabric.adopted_keys(&subscriber).is_empty());

    // A record with creation time 10 is adopted.
    let newer = GroupKeyPair::generate(&fabric.rng, 10).unwrap();
    let newer_list = KeyRecordList {
        created_at: 10,
        group_public: *newer.public(),
        records: vec![sealed_record_for(subscriber, &sealing_key, &newer, &fabric.rng)],
    };
    fabric.inject(
        maker,
        key_record_publication(
            &maker,
            &maker_key,
            1,
            &subscriber,
            &subscriber,
            &newer_list,
            START_TIME + 1,
        ),
        lifetime,
    );

    // A record with creation time 5 arriving later is silently dropped.
    let older = GroupKeyPair::generate(&fabric.rng, 5).unwrap();
    let older_list = KeyRecordList {
        created_at: 5,
        group_public: *older.public(),
        records: vec![sealed_record_for(subscriber, &sealing_key, &older, &fabric.rng)],
    };
    fabric.inject(
        maker,
        key_record_publication(
            &maker,
            &maker_key,
            1,
            &subscriber,
            &subscriber,
            &older_list,
            START_TIME + 2,
        ),
        lifetime,
    );

    let adopted = fabric.adopted_keys(&subscriber);
    assert_eq!(adopted.len(), 1);
    assert_eq!(adopted[0].created_at, 10);
    assert_eq!(adopted[0].public, *newer.public());
    assert_eq!(fabric.state(&subscriber).current_created_at(), 10);
    assert_eq!(fabric.connected_signals(&subscriber), 1);
}

// A rekey over many members emits sorted, range-addressed chunks whose union covers exactly the
// member set, none exceeding the per-publication record limit.
#[test]
fn rekey_splits_sorted_records_across_ranges() {
    let mut fabric = Fabric::new([7; 32]);
    let mut authority = CertAuthority::new();
    let maker = authority.issue(
        identity(&fabric.rng),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let members: Vec<Thumbprint> = (0..17)
        .map(|_| {
            authority.issue(
                identity(&fabric.rng),
                Capabilities::subscriber("pubs"),
                FAR_FUTURE,
            )
        })
        .collect();

    fabric.add_peer(&authority, maker, config());
    fabric.complete_election(maker, 1);
    for member in &members {
        fabric.add_peer(&authority, *member, config());
    }
    assert_eq!(fabric.state(&maker).member_count(), members.len());

    fabric.advance(config().rekey_interval);
    let rekey_time = fabric.now();

    let kr_prefix = fabric
        .state(&maker)
        .topic_prefix(Topic::KeyRecords)
        .clone();
    let chunks: Vec<KeyRecordList> = fabric
        .published_key_records()
        .into_iter()
        .filter(|publication| {
            KeyRecordName::parse(publication.name(), &kr_prefix)
                .unwrap()
                .timestamp
                == rekey_time
        })
        .map(|publication| {
            let parts = KeyRecordName::parse(publication.name(), &kr_prefix).unwrap();
            let list = KeyRecordList::decode(publication.content()).unwrap();

            // Record runs are sorted and the advertised range matches their endpoints.
            assert!(list.records.len() <= MAX_KEY_RECORDS);
            assert!(!list.records.is_empty());
            assert!(list
                .records
                .windows(2)
                .all(|w| w[0].recipient < w[1].recipient));
            assert_eq!(
                parts.low,
                thumbprint_prefix(&list.records.first().unwrap().recipient)
            );
            assert_eq!(
                parts.high,
                thumbprint_prefix(&list.records.last().unwrap().recipient)
            );
            list
        })
        .collect();

    assert_eq!(chunks.len(), members.len().div_ceil(MAX_KEY_RECORDS));
    let covered: BTreeSet<Thumbprint> = chunks
        .iter()
        .flat_map(|list| list.records.iter().map(|record| record.recipient))
        .collect();
    assert_eq!(covered, members.iter().copied().collect());

    // Every member unsealed the new key; the deferred re-request timers armed by foreign chunks
    // were cancelled again on adoption.
    for member in &members {
        let latest = fabric.adopted_keys(member).last().unwrap().clone();
        assert_eq!(latest.created_at, rekey_time);
        assert!(latest.secret.is_some());
        assert!(fabric.armed_timers(member).is_empty());
    }
}

// An unanswered membership request is refreshed on the key-lifetime timer, with at most one
// refresh timer live at any point.
#[test]
fn unanswered_request_is_refreshed() {
    let mut fabric = Fabric::new([8; 32]);
    let mut authority = CertAuthority::new();
    let maker_key = identity(&fabric.rng);
    let maker = authority.issue(
        maker_key.clone(),
        Capabilities::key_maker("pubs", 5),
        FAR_FUTURE,
    );
    let subscriber = authority.issue(
        identity(&fabric.rng),
        Capabilities::subscriber("pubs"),
        FAR_FUTURE,
    );
    fabric.add_peer(&authority, subscriber, config());

    // A key record from a key-maker that then stops answering.
    let pair = GroupKeyPair::generate(&fabric.rng, 1).unwrap();
    let list = KeyRecordList {
        created_at: 1,
        group_public: *pair.public(),
        records: Vec::new(),
    };
    fabric.inject(
        maker,
        key_record_publication(&maker, &maker_key, 1, &maker, &maker, &list, START_TIME),
        Duration::from_secs(3600),
    );

    assert!(fabric.state(&subscriber).has_pending_request());
    assert_eq!(
        fabric.armed_timers(&subscriber),
        vec![TimerKind::RequestRefresh]
    );

    for _ in 0..3 {
        fabric.advance(config().key_lifetime());
        assert!(fabric.state(&subscriber).has_pending_request());
        assert_eq!(
            fabric.armed_timers(&subscriber),
            vec![TimerKind::RequestRefresh]
        );
    }
    assert_eq!(fabric.connected_signals(&subscriber), 0);
}

// Key records signed by an identity without the key-maker capability are dropped before any
// other processing.
#[test]
fn unauthorized_key_records_are_dropped() {
    let mut fabric = Fabric::new([9; 32]);
    let mut authority = CertAuthority::new();
    let impostor_key = identity(&fabric.rng);
    let impostor = authority.issue(
        impostor_key.clone(),
        Capabilities::subscriber("pubs"),
        FAR_FUTURE,
    );
    let subscriber = authority.issue(
        identity(&fabric.rng),
        Capabilities::subscriber("pubs"),
        FAR_FUTURE,
    );
    fabric.add_peer(&authority, subscriber, config());

    let pair = GroupKeyPair::generate(&fabric.rng, 10).unwrap();
    let list = KeyRecordList {
        created_at: 10,
        group_public: *pair.public(),
        records: Vec::new(),
    };
    fabric.inject(
        impostor,
        key_record_publication(
            &impostor,
            &impostor_key,
            1,
            &impostor,
            &impostor,
            &list,
            START_TIME,
        ),
        Duration::from_secs(3600),
    );

    // Not even the init-state membership request fires for an unauthorized record.
    assert!(fabric.adopted_keys(&subscriber).is_empty());
    assert!(!fabric.state(&subscriber).has_pending_request());
    assert_eq!(fabric.connected_signals(&subscriber), 0);
}

#[test]
fn election_is_joined_only_with_positive_priority() {
    let rng = Rng::from_seed([10; 32]);
    let mut authority = CertAuthority::new();

    let eligible = authority.issue(identity(&rng), Capabilities::key_maker("pubs", 7), FAR_FUTURE);
    let disabled = authority.issue(identity(&rng), Capabilities::key_maker("pubs", 0), FAR_FUTURE);
    let malformed = authority.issue(
        identity(&rng),
        Capabilities::subscriber("pubs").with("KMP", "55"),
        FAR_FUTURE,
    );
    let plain = authority.issue(identity(&rng), Capabilities::subscriber("pubs"), FAR_FUTURE);

    let state = Distributor::init(config(), authority.store_for(eligible)).unwrap();
    let (_, commands) = Distributor::setup(state);
    assert!(matches!(
        commands.as_slice(),
        [Command::JoinElection { priority: 7, .. }]
    ));

    for tp in [disabled, malformed, plain] {
        let state = Distributor::init(config(), authority.store_for(tp)).unwrap();
        let (_, commands) = Distributor::setup(state);
        assert!(matches!(
            commands.as_slice(),
            [Command::Subscribe(Topic::KeyRecords)]
        ));
    }
}

// A signing chain that loses a role capability mid-session is a fatal configuration error, not
// something to limp along with.
#[test]
fn capability_change_is_fatal() {
    let rng = Rng::from_seed([11; 32]);
    let mut authority = CertAuthority::new();
    let subscriber = authority.issue(
        identity(&rng),
        Capabilities::subscriber("pubs"),
        FAR_FUTURE,
    );
    let maker = authority.issue(identity(&rng), Capabilities::key_maker("pubs", 5), FAR_FUTURE);

    let mut y = Distributor::init(config(), authority.store_for(subscriber)).unwrap();
    y.certs.revoke_capability(&subscriber, "SG");
    assert!(matches!(
        Distributor::update_signing_key(y, START_TIME),
        Err(DistributorError::SubscriberCapabilityChanged)
    ));

    let mut y = Distributor::init(config(), authority.store_for(maker)).unwrap();
    y.init = false;
    y.is_key_maker = true;
    y.certs.revoke_capability(&maker, "KMP");
    assert!(matches!(
        Distributor::update_signing_key(y, START_TIME),
        Err(DistributorError::KeyMakerCapabilityChanged)
    ));
}

// A rotated signing key on an enrolled member triggers re-enrollment under the new identity.
#[test]
fn signing_key_update_reenrolls_member() {
    let rng = Rng::from_seed([12; 32]);
    let mut authority = CertAuthority::new();
    let member = authority.issue(identity(&rng), Capabilities::subscriber("pubs"), FAR_FUTURE);

    let mut y = Distributor::init(config(), authority.store_for(member)).unwrap();
    y.init = false;
    let (y, commands) = Distributor::update_signing_key(y, START_TIME).unwrap();

    assert!(y.has_pending_request());
    assert!(commands
        .iter()
        .any(|command| matches!(command, Command::Publish(_))));
    assert!(commands.iter().any(|command| matches!(
        command,
        Command::StartTimer {
            kind: TimerKind::RequestRefresh,
            ..
        }
    )));
}

#[test]
fn publication_lifetimes_by_subtree() {
    let rng = Rng::from_seed([13; 32]);
    let mut authority = CertAuthority::new();
    let peer = authority.issue(identity(&rng), Capabilities::subscriber("pubs"), FAR_FUTURE);
    let y = Distributor::init(config(), authority.store_for(peer)).unwrap();

    let prefix = config().prefix;
    assert_eq!(
        y.publication_lifetime(&prefix.with_str("mr").with_number(1)),
        MEMBERSHIP_REQUEST_LIFETIME
    );
    assert_eq!(
        y.publication_lifetime(&prefix.with_str("km").with_str("cand").with_number(1)),
        ELECTION_CANDIDATE_LIFETIME
    );
    assert_eq!(
        y.publication_lifetime(&prefix.with_str("kr").with_number(1)),
        config().key_lifetime() + config().expiration_grace
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Adoption is monotone in creation time no matter in which order records arrive: the adopted
    // sequence equals the strictly increasing run of maxima.
    #[test]
    fn adoption_is_monotone(
        seed in any::<[u8; 32]>(),
        creation_times in proptest::collection::vec(0u64..1000, 1..10),
    ) {
        let mut fabric = Fabric::new(seed);
        let mut authority = CertAuthority::new();
        let maker_key = identity(&fabric.rng);
        let maker = authority.issue(
            maker_key.clone(),
            Capabilities::key_maker("pubs", 5),
            FAR_FUTURE,
        );
        let subscriber = authority.issue(
            identity(&fabric.rng),
            Capabilities::subscriber("pubs"),
            FAR_FUTURE,
        );
        fabric.add_peer(&authority, subscriber, config());

        let store = authority.store_for(subscriber);
        let sealing_key =
            public_key_to_x25519(store.public_key(&subscriber).unwrap().as_bytes()).unwrap();

        // Primer: consumed by the init-state membership request.
        let primer = GroupKeyPair::generate(&fabric.rng, 1).unwrap();
        let primer_list = KeyRecordList {
            created_at: 1,
            group_public: *primer.public(),
            records: Vec::new(),
        };
        fabric.inject(
            maker,
            key_record_publication(&maker, &maker_key, 1, &maker, &maker, &primer_list, START_TIME),
            std::time::Duration::from_secs(3600),
        );

        for (index, created_at) in creation_times.iter().enumerate() {
            let pair = GroupKeyPair::generate(&fabric.rng, *created_at).unwrap();
            let list = KeyRecordList {
                created_at: *created_at,
                group_public: *pair.public(),
                records: vec![sealed_record_for(subscriber, &sealing_key, &pair, &fabric.rng)],
            };
            fabric.inject(
                maker,
                key_record_publication(
                    &maker,
                    &maker_key,
                    1,
                    &subscriber,
                    &subscriber,
                    &list,
                    START_TIME + 1 + index as u64,
                ),
                std::time::Duration::from_secs(3600),
            );
        }

        let mut expected = Vec::new();
        let mut best = 0u64;
        for created_at in &creation_times {
            if *created_at > best {
                best = *created_at;
                expected.push(*created_at);
            }
        }

        let adopted: Vec<u64> = fabric
            .adopted_keys(&subscriber)
            .iter()
            .map(|key| key.created_at)
            .collect();
        prop_assert_eq!(adopted, expected);
    }
}
