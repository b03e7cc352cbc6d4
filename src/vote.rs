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

//! Signed endorsements from a masternode (§3, §4.4): one shape for
//! proposals (carries a yes/no/abstain direction), one for finalized
//! budgets (no direction — a budget is voted on as a single unit).

use darkfi_serial::{serialize, SerialDecodable, SerialEncodable};

use crate::{
    chain::{OutPoint, Signature},
    hash::Hash256,
    time::Timestamp,
};

/// A proposal vote's direction. Finalized-budget votes carry no direction:
/// a budget is accepted or not, never partially endorsed.
///
/// Carried on the wire as a plain `u32` (matching `Function` in the money
/// contract's own wire format) rather than derived directly, since the
/// derive macros in this ecosystem target structs, not enum discriminants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Direction {
    Yes = 1,
    No = 2,
    Abstain = 3,
}

impl Direction {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Direction::Yes),
            2 => Some(Direction::No),
            3 => Some(Direction::Abstain),
            _ => None,
        }
    }
}

/// A vote on a spending proposal.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct ProposalVote {
    pub voter_outpoint: OutPoint,
    pub target_hash: Hash256,
    /// Wire representation of [`Direction`]; use [`Direction::from_u32`] to decode.
    pub direction: u32,
    pub time: Timestamp,
    pub signature: Signature,
}

impl ProposalVote {
    /// `H(voter_outpoint ‖ target_hash ‖ direction ‖ time)` (§4.4).
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        buf.extend_from_slice(&serialize(&self.voter_outpoint));
        buf.extend_from_slice(&serialize(&self.target_hash));
        buf.extend_from_slice(&serialize(&self.direction));
        buf.extend_from_slice(&serialize(&self.time));
        Hash256::double_sha256(&buf)
    }

    /// The message actually signed by the voter's masternode key (§4.4).
    pub fn signed_message(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}",
            self.voter_outpoint.short_string(),
            self.target_hash.to_hex(),
            self.direction,
            self.time.0,
        )
        .into_bytes()
    }
}

/// A vote on a finalized budget.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct FinalizedVote {
    pub voter_outpoint: OutPoint,
    pub target_hash: Hash256,
    pub time: Timestamp,
    pub signature: Signature,
}

impl FinalizedVote {
    /// `H(voter_outpoint ‖ target_hash ‖ time)`, no direction (§4.4).
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        buf.extend_from_slice(&serialize(&self.voter_outpoint));
        buf.extend_from_slice(&serialize(&self.target_hash));
        buf.extend_from_slice(&serialize(&self.time));
        Hash256::double_sha256(&buf)
    }

    pub fn signed_message(&self) -> Vec<u8> {
        format!("{}{}{}", self.voter_outpoint.short_string(), self.target_hash.to_hex(), self.time.0)
            .into_bytes()
    }
}

/// Checks shared by both vote shapes when a replacement vote comes in for
/// a (voter, target) pair that already has one (Invariant 2).
///
/// Returns `Ok(())` if `new_time` may replace `old_time`, given the
/// network's minimum update interval and the adjusted clock.
pub fn check_replacement_timing(
    old_time: Timestamp,
    new_time: Timestamp,
    min_update_interval: i64,
    adjusted_now: Timestamp,
) -> Result<(), &'static str> {
    if new_time <= old_time {
        return Err("vote time does not advance on the prior vote")
    }
    if new_time.0 - old_time.0 < min_update_interval {
        return Err("vote arrived before the minimum update interval elapsed")
    }
    if new_time.0 > adjusted_now.0 + crate::time::MAX_FUTURE_DRIFT_SECS {
        return Err("vote time is too far in the future")
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Signature;

    fn outpoint(b: u8) -> OutPoint {
        OutPoint { txid: Hash256([b; 32]), vout: 0 }
    }

    #[test]
    fn proposal_vote_hash_changes_with_direction() {
        let base = ProposalVote {
            voter_outpoint: outpoint(1),
            target_hash: Hash256([2; 32]),
            direction: Direction::Yes as u32,
            time: Timestamp(1000),
            signature: Signature(vec![]),
        };
        let mut flipped = base.clone();
        flipped.direction = Direction::No as u32;
        assert_ne!(base.hash(), flipped.hash());
    }

    #[test]
    fn replacement_timing_rejects_non_advancing_time() {
        let old = Timestamp(1000);
        let new = Timestamp(1000);
        assert!(check_replacement_timing(old, new, 3600, Timestamp(2000)).is_err());
    }

    #[test]
    fn replacement_timing_rejects_under_floor_update() {
        let old = Timestamp(1000);
        let new = Timestamp(1100);
        assert!(check_replacement_timing(old, new, 3600, Timestamp(2000)).is_err());
    }

    #[test]
    fn replacement_timing_rejects_future_drift() {
        let old = Timestamp(1000);
        let now = Timestamp(2000);
        let new = Timestamp(now.0 + crate::time::MAX_FUTURE_DRIFT_SECS + 1);
        assert!(check_replacement_timing(old, new, 3600, now).is_err());
    }

    #[test]
    fn replacement_timing_accepts_valid_update() {
        let old = Timestamp(1000);
        let now = Timestamp(10_000);
        let new = Timestamp(old.0 + 3600);
        assert!(check_replacement_timing(old, new, 3600, now).is_ok());
    }
}
