// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distribution of the subscriber-group key pair over the sync transport.
pub mod engine;
pub mod member_table;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;

pub use engine::{
    Command, Distributor, DistributorConfig, DistributorError, DistributorResult,
    DistributorScope, DistributorState, Epoch, Event, TimerKind, Topic,
    DEFERRED_REQUEST_DELAY, ELECTION_CANDIDATE_LIFETIME, MEMBERSHIP_REQUEST_LIFETIME,
};
pub use member_table::{MemberTable, MAX_MEMBERS};
