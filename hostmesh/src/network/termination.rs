// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Bookkeeping for the termination barrier.
//!
//! Termination runs in numbered rounds. In each round every host broadcasts a
//! marker carrying whether it sent anything since its previous marker, then
//! waits for every peer's marker of that round. Transports deliver in order per
//! sender, so a peer's marker arrives after everything that peer sent ahead of
//! it. The group is quiescent after the first round in which no host reports
//! activity.

use std::collections::BTreeMap;

use crate::serialization::DeserializeBuffer;
use crate::{Network, NetworkErr};

#[derive(Debug, Default, Clone, Copy)]
struct RoundTally {
    markers: u32,
    active: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Termination {
    requested: bool,
    sent_since_marker: bool,
    rounds: BTreeMap<u32, RoundTally>,
}

impl Termination {
    /// Whether any peer has started the barrier
    pub(crate) fn requested(&self) -> bool {
        self.requested
    }

    pub(crate) fn note_activity(&mut self) {
        self.sent_since_marker = true;
    }

    /// Read and clear this host's activity flag
    pub(crate) fn take_activity(&mut self) -> bool {
        std::mem::take(&mut self.sent_since_marker)
    }

    /// The number of peer markers received for `round`
    pub(crate) fn markers(&self, round: u32) -> u32 {
        self.rounds.get(&round).map_or(0, |tally| tally.markers)
    }

    /// Close out `round`, returning whether any peer reported activity in it
    pub(crate) fn finish_round(&mut self, round: u32) -> bool {
        self.rounds.remove(&round).is_some_and(|tally| tally.active)
    }

    fn record(&mut self, round: u32, active: bool) {
        self.requested = true;
        let tally = self.rounds.entry(round).or_default();
        tally.markers += 1;
        tally.active |= active;
    }
}

/// The landing pad for termination markers
pub(crate) fn marker_pad(network: &mut Network, buf: &mut DeserializeBuffer) -> Result<(), NetworkErr> {
    let (round, active) = buf.read::<(u32, bool)>()?;
    log::trace!(
        "Host {} got termination marker {round} (active = {active}) from host {:?}",
        network.id(),
        network.message_source()
    );
    network.termination.record(round, active);
    Ok(())
}
