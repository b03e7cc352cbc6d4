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

//! Periodic maintenance (§4.5 `check_and_remove`, §4.7 steps 5-7):
//! revalidate and drop stale active items, age out the ask-throttle table,
//! and promote items out of the immature queues once their collateral
//! matures.

use log::debug;

use crate::{
    chain::OutPoint,
    collateral::{validate_collateral, CollateralOutcome},
};

use super::BudgetManager;

impl BudgetManager {
    /// `check_and_remove` (§4.5): revalidate every active item at the
    /// current height, drop those that fail, and run auto-check on every
    /// active finalized budget.
    pub async fn check_and_remove(&self) {
        let height = self.best_height();
        let enabled = self.directory.enabled_count(0).await;

        let proposal_voter_keys: Vec<OutPoint> = {
            let state = self.cs_proposals.lock().await;
            state.active.values().flat_map(|p| p.votes.keys().copied()).collect()
        };
        let proposal_voters = self.valid_voter_set(proposal_voter_keys).await;
        let is_valid_voter = |op: &OutPoint| proposal_voters.contains(op);

        {
            let mut state = self.cs_proposals.lock().await;
            let hashes: Vec<_> = state.active.keys().copied().collect();
            for hash in hashes {
                if let Some(proposal) = state.active.get_mut(&hash) {
                    proposal.update_valid(
                        height,
                        enabled,
                        self.config.min_proposal_amount,
                        self.config.cycle_length,
                        true,
                        is_valid_voter,
                    );
                    if !proposal.valid {
                        debug!(
                            target: "governance::manager::maintenance",
                            "dropping proposal {hash}: {}",
                            proposal.invalid_reason.as_deref().unwrap_or("unknown")
                        );
                        state.active.remove(&hash);
                    }
                }
            }
        }

        let (cycle_start, _) = self.cycle_bounds(height);
        let obsolete_before = cycle_start.saturating_sub(2 * self.config.cycle_length);

        let our_schedule: Vec<crate::finalized_budget::Payment> = self
            .get_budget(height)
            .await
            .iter()
            .map(|p| crate::finalized_budget::Payment {
                proposal_hash: p.hash(),
                payee_script: p.payee_script.clone(),
                amount: p.allotted,
            })
            .collect();

        let known_hashes: std::collections::HashSet<_> = our_schedule.iter().map(|p| p.proposal_hash).collect();

        {
            let mut state = self.cs_budgets.lock().await;
            let hashes: Vec<_> = state.active.keys().copied().collect();
            for hash in hashes {
                if let Some(budget) = state.active.get_mut(&hash) {
                    let block_end = budget.start_block + budget.payments.len() as u64;
                    if block_end < obsolete_before {
                        debug!(target: "governance::manager::maintenance", "dropping obsolete finalized budget {hash}");
                        state.active.remove(&hash);
                        continue
                    }
                    let cycle_budget = self.cycle_budget(budget.start_block);
                    if !budget.is_well_formed(self.config.max_payments, cycle_budget, |h| known_hashes.contains(h)) {
                        state.active.remove(&hash);
                        continue
                    }
                    if self.config.mode == crate::config::BudgetMode::Auto {
                        budget.maybe_auto_vote(&our_schedule, 4, self.rng.as_ref());
                    }
                }
            }
        }
    }

    /// Ages out `ask_throttle` entries older than `ask_throttle_secs` (§4.7 step 6).
    pub async fn age_out_ask_throttle(&self) {
        let now = self.chain.adjusted_time();
        let floor = self.config.ask_throttle_secs;
        {
            let mut votes = self.cs_votes.lock().await;
            votes.ask_throttle.retain(|_, t| now.0 - t.0 < floor);
        }
        {
            let mut finalized = self.cs_finalizedvotes.lock().await;
            finalized.ask_throttle.retain(|_, t| now.0 - t.0 < floor);
        }
    }

    /// Promotes items from the immature queues whose collateral has now
    /// matured to `required_confs` (§4.7 step 7).
    pub async fn promote_immature(&self) {
        let proposal_hashes: Vec<_> = {
            let state = self.cs_proposals.lock().await;
            state.immature.keys().copied().collect()
        };
        for hash in proposal_hashes {
            let collateral_txid = {
                let state = self.cs_proposals.lock().await;
                state.immature.get(&hash).map(|p| p.proposal.collateral_txid)
            };
            let Some(collateral_txid) = collateral_txid else { continue };
            let outcome = validate_collateral(
                self.chain.as_ref(),
                &collateral_txid,
                &hash,
                self.config.proposal_fee,
                self.config.required_confs,
            )
            .await;
            if let CollateralOutcome::Valid { .. } = outcome {
                let mut state = self.cs_proposals.lock().await;
                if let Some(immature) = state.immature.remove(&hash) {
                    state.active.insert(hash, immature.proposal);
                }
            }
        }

        let budget_hashes: Vec<_> = {
            let state = self.cs_budgets.lock().await;
            state.immature.keys().copied().collect()
        };
        for hash in budget_hashes {
            let collateral_txid = {
                let state = self.cs_budgets.lock().await;
                state.immature.get(&hash).map(|b| b.budget.collateral_txid)
            };
            let Some(collateral_txid) = collateral_txid else { continue };
            let outcome = validate_collateral(
                self.chain.as_ref(),
                &collateral_txid,
                &hash,
                self.config.finalization_fee,
                self.config.required_confs,
            )
            .await;
            if let CollateralOutcome::Valid { .. } = outcome {
                let mut state = self.cs_budgets.lock().await;
                if let Some(immature) = state.immature.remove(&hash) {
                    state.active.insert(hash, immature.budget);
                }
            }
        }
    }
}
