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

//! Submit Final Budget (§4.8): once per cycle, within a finalization
//! window before the next cycle start, the local masternode (mode
//! "suggest") constructs its own finalized budget from its tally and
//! broadcasts it collateralized.

use darkfi_serial::serialize;
use log::{debug, info};

use crate::{
    error::Result,
    finalized_budget::{FinalizedBudget, Payment},
    manager::BudgetManager,
    net::{messages::FinalizedBudgetMessage, P2pMessage},
};

impl BudgetManager {
    /// Whether `height` falls inside the finalization window before the
    /// next cycle boundary (§4.8): `max(2C/30, 64)` blocks.
    pub fn in_finalization_window(&self, height: u64) -> bool {
        let (cycle_start, _) = self.cycle_bounds(height);
        cycle_start.saturating_sub(height) <= self.config.finalization_window_blocks()
    }

    /// Builds, collateralizes and broadcasts our own finalized budget for
    /// the upcoming cycle, and inserts it into the active set. A no-op if
    /// we have no wallet, aren't in the finalization window, or our tally
    /// selects no proposals.
    pub async fn submit_final_budget(&self, height: u64) -> Result<Option<crate::hash::Hash256>> {
        let Some(wallet) = self.wallet.clone() else { return Ok(None) };
        if !self.in_finalization_window(height) {
            return Ok(None)
        }

        let (cycle_start, _) = self.cycle_bounds(height);
        let selected = self.get_budget(height).await;
        if selected.is_empty() {
            debug!(target: "governance::manager::submit", "no passing proposals, skipping finalized budget submission");
            return Ok(None)
        }

        let payments: Vec<Payment> = selected
            .iter()
            .map(|p| Payment { proposal_hash: p.hash(), payee_script: p.payee_script.clone(), amount: p.allotted })
            .collect();

        let mut budget = FinalizedBudget {
            name: "main".to_string(),
            start_block: cycle_start,
            payments,
            collateral_txid: crate::hash::Hash256::zero(),
            created_time: self.chain.adjusted_time(),
            votes: std::collections::HashMap::new(),
            auto_checked: false,
            payment_history: std::collections::HashMap::new(),
        };
        let hash = budget.hash();

        let collateral_txid = wallet.create_collateral_tx(hash, self.config.finalization_fee).await?;
        budget.collateral_txid = collateral_txid;

        {
            let mut state = self.cs_budgets.lock().await;
            state.seen.insert(hash);
            state.active.insert(hash, budget.clone());
        }

        self.transport
            .broadcast(
                FinalizedBudgetMessage::COMMAND,
                serialize(&FinalizedBudgetMessage {
                    name: budget.name.clone(),
                    start_block: budget.start_block,
                    payments: budget.payments.clone(),
                    collateral_txid: budget.collateral_txid,
                    created_time: budget.created_time,
                }),
            )
            .await;
        info!(target: "governance::manager::submit", "submitted finalized budget {hash} for cycle starting at {cycle_start}");

        Ok(Some(hash))
    }
}
