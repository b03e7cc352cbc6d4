/* This file is part of govbudget
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Immutable spending proposal descriptors plus their per-voter vote map
//! (§3, §4.2).

use std::collections::HashMap;

use darkfi_serial::{serialize, SerialDecodable, SerialEncodable};

use crate::{
    chain::{OutPoint, Script},
    hash::Hash256,
    time::Timestamp,
    vote::{check_replacement_timing, Direction, ProposalVote},
};

/// Wire/storage representation of a proposal: immutable descriptor fields
/// plus the votes collected so far. `valid`/`invalid_reason`/`allotted` are
/// recomputed by [`Proposal::update_valid`] and the tally respectively and
/// are never trusted from the wire — see [`ProposalBroadcast`] for what
/// actually crosses the network.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct Proposal {
    pub name: String,
    pub url: String,
    pub payee_script: Script,
    pub amount: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub collateral_txid: Hash256,
    pub created_time: Timestamp,

    /// Latest accepted vote per voter outpoint (Invariant 2).
    pub votes: HashMap<OutPoint, ProposalVote>,

    pub valid: bool,
    pub invalid_reason: Option<String>,

    /// Amount selected into the active budget on the last tally.
    /// Recomputed every `get_budget` call, never persisted.
    #[skip_serialize]
    pub allotted: u64,
}

/// The immutable fields as they arrive over the wire (`mprop`, §6):
/// a fresh proposal always starts with no votes and `valid = false` until
/// the manager runs [`Proposal::update_valid`] on it.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct ProposalBroadcast {
    pub name: String,
    pub url: String,
    pub payee_script: Script,
    pub amount: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub collateral_txid: Hash256,
    pub created_time: Timestamp,
}

impl From<ProposalBroadcast> for Proposal {
    fn from(b: ProposalBroadcast) -> Self {
        Self {
            name: b.name,
            url: b.url,
            payee_script: b.payee_script,
            amount: b.amount,
            start_block: b.start_block,
            end_block: b.end_block,
            collateral_txid: b.collateral_txid,
            created_time: b.created_time,
            votes: HashMap::new(),
            valid: false,
            invalid_reason: None,
            allotted: 0,
        }
    }
}

impl Proposal {
    /// Deterministic identity hash over the immutable fields only (§3):
    /// adding or removing votes never changes it.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        buf.extend_from_slice(&serialize(&self.name));
        buf.extend_from_slice(&serialize(&self.url));
        buf.extend_from_slice(&serialize(&self.payee_script));
        buf.extend_from_slice(&serialize(&self.amount));
        buf.extend_from_slice(&serialize(&self.start_block));
        buf.extend_from_slice(&serialize(&self.end_block));
        buf.extend_from_slice(&serialize(&self.collateral_txid));
        buf.extend_from_slice(&serialize(&self.created_time));
        Hash256::double_sha256(&buf)
    }

    /// `end_block = floor(start_block / C) · C + (C+1)·payment_count` (§3).
    pub fn expected_end_block(start_block: u64, cycle_length: u64, payment_count: u64) -> u64 {
        (start_block / cycle_length) * cycle_length + (cycle_length + 1) * payment_count
    }

    /// `payment_count` implied by this proposal's declared `end_block`,
    /// inverting [`Proposal::expected_end_block`]. Matches the on-chain
    /// behavior noted in the Open Questions rather than the reference
    /// comment suggesting a subtraction of half a cycle.
    pub fn payment_count(&self, cycle_length: u64) -> u64 {
        let cycle_start = (self.start_block / cycle_length) * cycle_length;
        (self.end_block.saturating_sub(cycle_start)) / (cycle_length + 1)
    }

    /// Invariant 2: rejects if not strictly newer, under the update floor,
    /// or more than an hour ahead of the adjusted clock.
    pub fn add_or_update_vote(
        &mut self,
        vote: ProposalVote,
        min_update_interval: i64,
        adjusted_now: Timestamp,
    ) -> Result<(), &'static str> {
        if let Some(existing) = self.votes.get(&vote.voter_outpoint) {
            check_replacement_timing(existing.time, vote.time, min_update_interval, adjusted_now)?;
        } else if vote.time.0 > adjusted_now.0 + crate::time::MAX_FUTURE_DRIFT_SECS {
            return Err("vote time is too far in the future")
        }
        self.votes.insert(vote.voter_outpoint, vote);
        Ok(())
    }

    fn votes_with_direction<'a>(
        &'a self,
        direction: Direction,
        is_valid_voter: impl Fn(&OutPoint) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ProposalVote> + 'a {
        self.votes
            .values()
            .filter(move |v| is_valid_voter(&v.voter_outpoint))
            .filter(move |v| v.direction == direction as u32)
    }

    pub fn yeas(&self, is_valid_voter: impl Fn(&OutPoint) -> bool) -> u64 {
        self.votes_with_direction(Direction::Yes, is_valid_voter).count() as u64
    }

    pub fn nays(&self, is_valid_voter: impl Fn(&OutPoint) -> bool) -> u64 {
        self.votes_with_direction(Direction::No, is_valid_voter).count() as u64
    }

    pub fn abstains(&self, is_valid_voter: impl Fn(&OutPoint) -> bool) -> u64 {
        self.votes_with_direction(Direction::Abstain, is_valid_voter).count() as u64
    }

    /// `yes - no`, possibly negative.
    pub fn net_yes(&self, is_valid_voter: impl Fn(&OutPoint) -> bool) -> i64 {
        self.yeas(&is_valid_voter) as i64 - self.nays(&is_valid_voter) as i64
    }

    /// Invariant 6: `no − yes > enabled_masternodes / 10`.
    pub fn is_heavily_downvoted(&self, enabled_masternodes: u64, is_valid_voter: impl Fn(&OutPoint) -> bool) -> bool {
        let yes = self.yeas(&is_valid_voter) as i64;
        let no = self.nays(&is_valid_voter) as i64;
        (no - yes) > (enabled_masternodes / 10) as i64
    }

    /// Invariant 4: established iff `created_time + window ≤ now`.
    pub fn is_established(&self, establishment_window: i64, adjusted_now: Timestamp) -> bool {
        self.created_time.0 + establishment_window <= adjusted_now.0
    }

    /// Basic well-formedness: sane amount, a P2PKH-style payee, and a
    /// start/end pair consistent with some integral `payment_count ≥ 1`.
    pub fn is_well_formed(&self, min_amount: u64, cycle_length: u64) -> bool {
        if self.amount < min_amount {
            return false
        }
        if !self.payee_script.is_normal_payment() {
            return false
        }
        if self.end_block <= self.start_block {
            return false
        }
        let pc = self.payment_count(cycle_length);
        pc >= 1 && Self::expected_end_block(self.start_block, cycle_length, pc) == self.end_block
    }

    /// Invariant 5: passing at `[cycle_start, cycle_end]` iff valid,
    /// the proposal's own window covers the cycle, the yes/no margin is
    /// met, and it's established.
    pub fn is_passing(
        &self,
        cycle_start: u64,
        cycle_end: u64,
        enabled_masternodes: u64,
        establishment_window: i64,
        adjusted_now: Timestamp,
        is_valid_voter: impl Fn(&OutPoint) -> bool,
    ) -> bool {
        if !self.valid {
            return false
        }
        if self.start_block > cycle_start || self.end_block < cycle_end {
            return false
        }
        if !self.is_established(establishment_window, adjusted_now) {
            return false
        }
        self.net_yes(is_valid_voter) > (enabled_masternodes / 10) as i64
    }

    /// Re-derives `valid`/`invalid_reason` (§4.2 `update_valid`). Collateral
    /// validity is checked separately by the caller (the collateral
    /// validator needs chain access the proposal doesn't have) and passed
    /// in as `collateral_ok`.
    pub fn update_valid(
        &mut self,
        height: u64,
        enabled_masternodes: u64,
        min_amount: u64,
        cycle_length: u64,
        collateral_ok: bool,
        is_valid_voter: impl Fn(&OutPoint) -> bool,
    ) {
        if self.is_heavily_downvoted(enabled_masternodes, &is_valid_voter) {
            self.valid = false;
            self.invalid_reason = Some("heavily downvoted".to_string());
            return
        }
        if !self.is_well_formed(min_amount, cycle_length) {
            self.valid = false;
            self.invalid_reason = Some("malformed".to_string());
            return
        }
        if self.end_block < height {
            self.valid = false;
            self.invalid_reason = Some("expired".to_string());
            return
        }
        if !collateral_ok {
            self.valid = false;
            self.invalid_reason = Some("invalid collateral".to_string());
            return
        }
        self.valid = true;
        self.invalid_reason = None;
    }
}

/// Sort order used when building the cycle's selection (§4.2): descending
/// net yes, ties broken by the greater collateral txid.
pub fn selection_order(a: &Proposal, b: &Proposal, a_net_yes: i64, b_net_yes: i64) -> std::cmp::Ordering {
    b_net_yes.cmp(&a_net_yes).then_with(|| b.collateral_txid.cmp(&a.collateral_txid))
}
