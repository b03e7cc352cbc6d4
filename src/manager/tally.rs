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

//! Tally, selection and block-payee/block-validation entry points (§4.5).

use crate::{chain::OutPoint, finalized_budget::Payment, hash::Hash256, proposal::Proposal, schedule::cycle_budget};

use super::BudgetManager;

/// Outcome of validating a candidate superblock transaction (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockValidation {
    Valid,
    Invalid,
    /// Neither the leading budget nor any budget in its acceptance band
    /// cleared the 5% vote threshold: treat as a non-payment block.
    VoteThreshold,
}

impl BudgetManager {
    /// `get_budget(height)` (§4.5): the proposals selected into the next
    /// cycle's payout, in the order they were accepted.
    pub async fn get_budget(&self, height: u64) -> Vec<Proposal> {
        let (cycle_start, cycle_end) = self.cycle_bounds(height);
        let budget = cycle_budget(cycle_start, self.config.cycle_length, self.network);
        let enabled = self.directory.enabled_count(0).await;
        let now = self.chain.adjusted_time();

        let mut candidates: Vec<Proposal> = {
            let state = self.cs_proposals.lock().await;
            state.active.values().cloned().collect()
        };
        let voters = self.valid_voter_set(candidates.iter().flat_map(|p| p.votes.keys().copied())).await;
        let is_valid_voter = |op: &OutPoint| voters.contains(op);

        candidates.sort_by(|a, b| {
            crate::proposal::selection_order(a, b, a.net_yes(is_valid_voter), b.net_yes(is_valid_voter))
        });

        let mut selected = Vec::new();
        let mut allotted_total: u128 = 0;
        for mut proposal in candidates {
            let passing = proposal.is_passing(
                cycle_start,
                cycle_end,
                enabled,
                self.config.establishment_window,
                now,
                is_valid_voter,
            );
            if !passing {
                continue
            }
            let candidate_total = allotted_total + proposal.amount as u128;
            if candidate_total > budget as u128 {
                continue
            }
            allotted_total = candidate_total;
            proposal.allotted = proposal.amount;
            selected.push(proposal);
        }
        selected
    }

    /// The cycle budget (§6), a closed-form function of the cycle's start height.
    pub fn cycle_budget(&self, cycle_start: u64) -> u64 {
        cycle_budget(cycle_start, self.config.cycle_length, self.network)
    }

    /// The leading finalized budget covering `height`, and its vote count.
    async fn leading_budget(&self, height: u64) -> Option<(Hash256, u64)> {
        let snapshot: Vec<(Hash256, crate::finalized_budget::FinalizedBudget)> = {
            let state = self.cs_budgets.lock().await;
            state.active.iter().map(|(h, b)| (*h, b.clone())).collect()
        };
        let voters = self.valid_voter_set(snapshot.iter().flat_map(|(_, b)| b.votes.keys().copied())).await;
        let is_valid_voter = |op: &OutPoint| voters.contains(op);

        let mut best: Option<(Hash256, u64)> = None;
        let mut best_budget = None;
        for (hash, budget) in &snapshot {
            if budget.start_block > height {
                continue
            }
            let end = budget.start_block + budget.payments.len() as u64;
            if height >= end {
                continue
            }
            let votes = budget.vote_count(is_valid_voter);
            let replace = match (&best, best_budget) {
                (None, _) => true,
                (Some((_, best_votes)), Some(bb)) => {
                    crate::finalized_budget::selection_order(budget, bb, votes, *best_votes) == std::cmp::Ordering::Less
                }
                _ => unreachable!(),
            };
            if replace {
                best = Some((*hash, votes));
                best_budget = Some(budget);
            }
        }
        best
    }

    /// `IsBudgetPaymentBlock` (§4.5): `V* > enabled_masternodes / 20`.
    pub async fn is_budget_payment_block(&self, height: u64) -> bool {
        let enabled = self.directory.enabled_count(0).await;
        match self.leading_budget(height).await {
            Some((_, votes)) => votes > enabled / 20,
            None => false,
        }
    }

    /// `fill_block_payee` (§4.5): the `(payee_script, amount)` a superblock
    /// at `height` is expected to pay, or `None` if this isn't a payment block.
    pub async fn fill_block_payee(&self, height: u64) -> Option<Payment> {
        if !self.is_budget_payment_block(height).await {
            return None
        }
        let (hash, _) = self.leading_budget(height).await?;
        let state = self.cs_budgets.lock().await;
        let budget = state.active.get(&hash)?;
        let idx = (height - budget.start_block) as usize;
        budget.payments.get(idx).cloned()
    }

    /// `IsTransactionValid`-equivalent for a candidate superblock transaction (§4.5).
    pub async fn check_block_transaction(&self, outputs: &[(crate::chain::Script, u64)], height: u64) -> BlockValidation {
        let enabled = self.directory.enabled_count(0).await;
        let leader_votes = match self.leading_budget(height).await {
            Some((_, v)) => v,
            None => return BlockValidation::VoteThreshold,
        };
        if leader_votes <= enabled / 20 {
            return BlockValidation::VoteThreshold
        }

        let five_percent = enabled / 20;
        let band_floor = leader_votes.saturating_sub(2 * five_percent);
        let (cycle_start, _) = self.cycle_bounds(height);

        let snapshot: Vec<(Hash256, crate::finalized_budget::FinalizedBudget)> = {
            let state = self.cs_budgets.lock().await;
            state.active.iter().map(|(h, b)| (*h, b.clone())).collect()
        };
        let voters = self.valid_voter_set(snapshot.iter().flat_map(|(_, b)| b.votes.keys().copied())).await;
        let is_valid_voter = |op: &OutPoint| voters.contains(op);
        let in_band: Vec<Hash256> = snapshot
            .iter()
            .filter(|(_, b)| b.vote_count(is_valid_voter) > band_floor)
            .map(|(h, _)| *h)
            .collect();
        if in_band.is_empty() {
            return BlockValidation::VoteThreshold
        }

        let mut state = self.cs_budgets.lock().await;
        for hash in in_band {
            if let Some(budget) = state.active.get_mut(&hash) {
                if budget.check_block_transaction(outputs, height, cycle_start) == crate::finalized_budget::PaymentCheck::Valid {
                    return BlockValidation::Valid
                }
            }
        }
        BlockValidation::Invalid
    }
}
