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

//! A finalized budget: one cycle's proposed payout schedule, submitted as a
//! single collateralized item and voted on as a unit (§3, §4.3).

use std::collections::HashMap;

use darkfi_serial::{serialize, SerialDecodable, SerialEncodable};

use crate::{
    chain::{OutPoint, Script},
    hash::Hash256,
    rng::RandomSource,
    time::Timestamp,
    vote::FinalizedVote,
};

/// One payment line inside a finalized budget.
#[derive(Clone, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub struct Payment {
    pub proposal_hash: Hash256,
    pub payee_script: Script,
    pub amount: u64,
}

/// Outcome of checking a candidate superblock transaction against a
/// finalized budget's payment schedule (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentCheck {
    Valid,
    Invalid,
    DoublePayment,
}

/// A finalized budget. `auto_checked` and `payment_history` are local
/// bookkeeping never sent over the wire — see [`FinalizedBudgetBroadcast`]
/// for the wire shape.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct FinalizedBudget {
    pub name: String,
    pub start_block: u64,
    pub payments: Vec<Payment>,
    pub collateral_txid: Hash256,
    pub created_time: Timestamp,

    pub votes: HashMap<OutPoint, FinalizedVote>,

    /// Whether we've already run the auto-vote comparison against our own
    /// tally for this budget. Latches so we only ever auto-vote once.
    #[skip_serialize]
    pub auto_checked: bool,

    /// `proposal_hash -> height` of payments already made this cycle, used
    /// to detect double payment and pruned once the cycle rolls over.
    #[skip_serialize]
    pub payment_history: HashMap<Hash256, u64>,
}

/// The immutable fields as they arrive over the wire (`fbs`, §6).
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct FinalizedBudgetBroadcast {
    pub name: String,
    pub start_block: u64,
    pub payments: Vec<Payment>,
    pub collateral_txid: Hash256,
    pub created_time: Timestamp,
}

impl From<FinalizedBudgetBroadcast> for FinalizedBudget {
    fn from(b: FinalizedBudgetBroadcast) -> Self {
        Self {
            name: b.name,
            start_block: b.start_block,
            payments: b.payments,
            collateral_txid: b.collateral_txid,
            created_time: b.created_time,
            votes: HashMap::new(),
            auto_checked: false,
            payment_history: HashMap::new(),
        }
    }
}

impl FinalizedBudget {
    /// Hash over the immutable payment schedule only (§3): votes never
    /// affect it.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        buf.extend_from_slice(&serialize(&self.name));
        buf.extend_from_slice(&serialize(&self.start_block));
        buf.extend_from_slice(&serialize(&self.payments));
        buf.extend_from_slice(&serialize(&self.collateral_txid));
        buf.extend_from_slice(&serialize(&self.created_time));
        Hash256::double_sha256(&buf)
    }

    pub fn total_amount(&self) -> u64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Invariant 2, the finalized-budget-vote shape.
    pub fn add_or_update_vote(
        &mut self,
        vote: FinalizedVote,
        min_update_interval: i64,
        adjusted_now: Timestamp,
    ) -> Result<(), &'static str> {
        if let Some(existing) = self.votes.get(&vote.voter_outpoint) {
            crate::vote::check_replacement_timing(existing.time, vote.time, min_update_interval, adjusted_now)?;
        } else if vote.time.0 > adjusted_now.0 + crate::time::MAX_FUTURE_DRIFT_SECS {
            return Err("vote time is too far in the future")
        }
        self.votes.insert(vote.voter_outpoint, vote);
        Ok(())
    }

    pub fn vote_count(&self, is_valid_voter: impl Fn(&OutPoint) -> bool) -> u64 {
        self.votes.keys().filter(|o| is_valid_voter(o)).count() as u64
    }

    /// Invariant 7: at most `max_payments`, every `proposal_hash` distinct
    /// and naming a proposal actually in the active set, total amount no
    /// more than the cycle budget. No slack: the ±10% band elsewhere in
    /// §4.5 is a block-validation vote-count acceptance band, not license
    /// to overspend the cycle budget itself.
    pub fn is_well_formed(
        &self,
        max_payments: usize,
        cycle_budget: u64,
        known_proposal_hashes: impl Fn(&Hash256) -> bool,
    ) -> bool {
        if self.payments.is_empty() || self.payments.len() > max_payments {
            return false
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.payments {
            if !seen.insert(p.proposal_hash) {
                return false
            }
            if !known_proposal_hashes(&p.proposal_hash) {
                return false
            }
        }
        self.total_amount() <= cycle_budget
    }

    /// §4.3 auto-vote/auto-check: resorts both this budget's payments and
    /// the manager's own freshly-selected schedule by descending proposal
    /// hash and compares them element-wise, so tally ties don't make the
    /// comparison order-sensitive. Runs at most once per budget (gated by
    /// `auto_checked`), and only fires with probability `1/firing_divisor`
    /// on top of that to throttle how many masternodes vote in the same
    /// block.
    pub fn maybe_auto_vote(
        &mut self,
        our_schedule: &[Payment],
        firing_divisor: u32,
        rng: &dyn RandomSource,
    ) -> bool {
        if self.auto_checked {
            return false
        }
        self.auto_checked = true;
        if rng.next_below(firing_divisor) != 0 {
            return false
        }
        let mut ours = self.payments.clone();
        let mut theirs = our_schedule.to_vec();
        ours.sort_by(|a, b| b.proposal_hash.cmp(&a.proposal_hash));
        theirs.sort_by(|a, b| b.proposal_hash.cmp(&a.proposal_hash));
        ours == theirs
    }

    /// Checks a candidate superblock transaction's outputs against the
    /// schedule (§4.3): `i = height − start_block` must select a payment
    /// slot; a payment already made earlier in `cycle_start`'s cycle is a
    /// double payment; otherwise some output (scanned tail-inward) must
    /// exactly match the i-th payment.
    pub fn check_block_transaction(
        &mut self,
        outputs: &[(Script, u64)],
        height: u64,
        cycle_start: u64,
    ) -> PaymentCheck {
        let idx = match height.checked_sub(self.start_block) {
            Some(i) if (i as usize) < self.payments.len() => i as usize,
            _ => return PaymentCheck::Invalid,
        };

        self.prune_payment_history(cycle_start);

        let payment = self.payments[idx].clone();
        if self.payment_history.contains_key(&payment.proposal_hash) {
            return PaymentCheck::DoublePayment
        }

        let matched = outputs.iter().rev().any(|(s, v)| *s == payment.payee_script && *v == payment.amount);
        if !matched {
            return PaymentCheck::Invalid
        }

        self.payment_history.insert(payment.proposal_hash, height);
        PaymentCheck::Valid
    }

    /// Drops payment-history entries from before `cycle_start`: a payment
    /// can only ever double-pay within the same cycle.
    pub fn prune_payment_history(&mut self, cycle_start: u64) {
        self.payment_history.retain(|_, &mut h| h >= cycle_start);
    }
}

/// Selection order among competing finalized budgets for the same cycle
/// (§4.3): highest vote count wins, ties broken by the greater collateral
/// txid — the same tiebreak rule proposals use.
pub fn selection_order(a: &FinalizedBudget, b: &FinalizedBudget, a_votes: u64, b_votes: u64) -> std::cmp::Ordering {
    b_votes.cmp(&a_votes).then_with(|| b.collateral_txid.cmp(&a.collateral_txid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chain::Signature, rng::FixedRandomSource};

    fn payment(n: u8, amount: u64) -> Payment {
        Payment { proposal_hash: Hash256([n; 32]), payee_script: Script(vec![0x76, n]), amount }
    }

    fn budget(payments: Vec<Payment>, collateral: u8) -> FinalizedBudget {
        FinalizedBudget {
            name: "main".to_string(),
            start_block: 43_200,
            payments,
            collateral_txid: Hash256([collateral; 32]),
            created_time: Timestamp(0),
            votes: HashMap::new(),
            auto_checked: false,
            payment_history: HashMap::new(),
        }
    }

    #[test]
    fn hash_is_unaffected_by_votes() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let before = b.hash();
        b.votes.insert(
            OutPoint { txid: Hash256([5; 32]), vout: 0 },
            FinalizedVote {
                voter_outpoint: OutPoint { txid: Hash256([5; 32]), vout: 0 },
                target_hash: before,
                time: Timestamp(1),
                signature: Signature(vec![]),
            },
        );
        assert_eq!(before, b.hash());
    }

    #[test]
    fn well_formed_rejects_duplicate_proposal_hash() {
        let b = budget(vec![payment(1, 100), payment(1, 200)], 9);
        assert!(!b.is_well_formed(100, 1_000_000, |_| true));
    }

    #[test]
    fn well_formed_accepts_total_exactly_at_budget() {
        let b = budget(vec![payment(1, 1_000)], 9);
        assert!(b.is_well_formed(100, 1_000, |_| true));
    }

    #[test]
    fn well_formed_rejects_total_over_budget() {
        let b = budget(vec![payment(1, 1_001)], 9);
        assert!(!b.is_well_formed(100, 1_000, |_| true));
    }

    #[test]
    fn auto_vote_latches_after_first_check() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let schedule = vec![payment(1, 100)];
        let rng = FixedRandomSource::always_fire();
        assert!(b.maybe_auto_vote(&schedule, 4, &rng));
        assert!(b.auto_checked);
        assert!(!b.maybe_auto_vote(&schedule, 4, &rng));
    }

    #[test]
    fn auto_vote_rejects_mismatched_schedule() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let rng = FixedRandomSource::always_fire();
        assert!(!b.maybe_auto_vote(&[payment(2, 100)], 4, &rng));
    }

    #[test]
    fn block_transaction_detects_double_payment_next_cycle() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let outs = vec![(Script(vec![0x76, 1]), 100u64)];
        assert_eq!(b.check_block_transaction(&outs, 43_200, 0), PaymentCheck::Valid);
        // Same cycle, asked again: already paid.
        assert_eq!(b.check_block_transaction(&outs, 43_200, 0), PaymentCheck::DoublePayment);
    }

    #[test]
    fn block_transaction_resets_across_cycle_boundary() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let outs = vec![(Script(vec![0x76, 1]), 100u64)];
        assert_eq!(b.check_block_transaction(&outs, 43_200, 0), PaymentCheck::Valid);
        // A later cycle prunes the earlier payment_history entry.
        assert_eq!(b.check_block_transaction(&outs, 43_200, 86_400), PaymentCheck::Valid);
    }

    #[test]
    fn block_transaction_rejects_height_outside_payment_range() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let outs = vec![(Script(vec![0x76, 1]), 100u64)];
        assert_eq!(b.check_block_transaction(&outs, 43_199, 0), PaymentCheck::Invalid);
    }

    #[test]
    fn block_transaction_rejects_unknown_output() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let outs = vec![(Script(vec![0x76, 2]), 100u64)];
        assert_eq!(b.check_block_transaction(&outs, 43_200, 0), PaymentCheck::Invalid);
    }

    #[test]
    fn prune_drops_entries_before_cycle_start() {
        let mut b = budget(vec![payment(1, 100)], 9);
        b.payment_history.insert(Hash256([1; 32]), 100);
        b.prune_payment_history(43_200);
        assert!(b.payment_history.is_empty());
    }

    #[test]
    fn selection_order_breaks_ties_on_collateral_txid() {
        let a = budget(vec![payment(1, 100)], 1);
        let b = budget(vec![payment(1, 100)], 2);
        assert_eq!(selection_order(&a, &b, 5, 5), std::cmp::Ordering::Greater);
    }

    #[test]
    fn vote_replacement_rejects_non_advancing_time() {
        let mut b = budget(vec![payment(1, 100)], 9);
        let voter = OutPoint { txid: Hash256([5; 32]), vout: 0 };
        let target = b.hash();
        b.votes.insert(
            voter,
            FinalizedVote { voter_outpoint: voter, target_hash: target, time: Timestamp(100), signature: Signature(vec![]) },
        );
        let replacement =
            FinalizedVote { voter_outpoint: voter, target_hash: target, time: Timestamp(100), signature: Signature(vec![]) };
        assert!(b.add_or_update_vote(replacement, 3600, Timestamp(10_000)).is_err());
    }
}
