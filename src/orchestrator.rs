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

//! New-block orchestrator (§4.7): the single per-tip entry point a host
//! daemon calls on every new chain tip. Drives maintenance, finalized-budget
//! submission and periodic re-broadcast off the manager's own tick counter
//! rather than off wall-clock time, so it stays deterministic under tests.

use log::debug;

use crate::{
    config::BudgetMode,
    manager::BudgetManager,
    net::{
        messages::{FinalizedBudgetMessage, InventoryKind, ProposalMessage},
        InventoryItem, P2pMessage,
    },
};

impl BudgetManager {
    /// Runs one orchestrator pass for the new tip at `height` (§4.7).
    pub async fn on_new_block(&self, height: u64) {
        self.set_best_height(height);

        if self.config.mode == BudgetMode::Suggest {
            if let Err(e) = self.submit_final_budget(height).await {
                debug!(target: "governance::orchestrator", "submit_final_budget failed: {e}");
            }
        }

        if height % self.config.maintenance_period != 0 {
            return
        }

        let tick = self.next_maintenance_tick();
        if self.transport.is_synced() {
            if tick % self.config.rebroadcast_period == 0 {
                self.force_rebroadcast().await;
            }
            self.push_partial_sync().await;
        }

        self.check_and_remove().await;
        self.age_out_ask_throttle().await;
        self.promote_immature().await;
    }

    /// Clears every seen-set so the next relay round re-announces
    /// everything we hold, then pushes a partial inventory sync to every
    /// connected peer (§4.7 step 4, §4.6).
    async fn force_rebroadcast(&self) {
        {
            let mut state = self.cs_proposals.lock().await;
            state.seen.clear();
        }
        {
            let mut state = self.cs_budgets.lock().await;
            state.seen.clear();
        }
        {
            let mut state = self.cs_votes.lock().await;
            state.seen.clear();
        }
        {
            let mut state = self.cs_finalizedvotes.lock().await;
            state.seen.clear();
        }

        let proposal_hashes: Vec<_> = self.cs_proposals.lock().await.active.keys().copied().collect();
        let budget_hashes: Vec<_> = self.cs_budgets.lock().await.active.keys().copied().collect();

        for peer in self.transport.connected_peers().await {
            if self.transport.has_full_synced(&peer).await {
                continue
            }
            for hash in &proposal_hashes {
                self.transport
                    .send(
                        &peer,
                        ProposalMessage::COMMAND,
                        darkfi_serial::serialize(&InventoryItem { kind: InventoryKind::Proposal, hash: *hash }),
                    )
                    .await;
            }
            for hash in &budget_hashes {
                self.transport
                    .send(
                        &peer,
                        FinalizedBudgetMessage::COMMAND,
                        darkfi_serial::serialize(&InventoryItem { kind: InventoryKind::FinalizedBudget, hash: *hash }),
                    )
                    .await;
            }
            self.transport.mark_full_synced(&peer).await;
        }
        debug!(target: "governance::orchestrator", "forced rebroadcast of {} proposals, {} finalized budgets", proposal_hashes.len(), budget_hashes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::{OutPoint, Script, Signature},
        config::Config,
        hash::Hash256,
        manager::ingest::tests::{FakeChain, FakeDirectory, FakeTransport},
        net::PeerId,
        proposal::Proposal,
        rng::OsRandomSource,
        schedule::{Network, COIN},
        time::Timestamp,
    };
    use std::{collections::HashMap, sync::Arc};

    #[test]
    fn maintenance_pass_only_runs_on_the_configured_period() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            for i in 0..100u8 {
                directory.register(OutPoint { txid: Hash256([i; 32]), vout: 0 });
            }
            let transport = Arc::new(FakeTransport::default());
            let config = Config { maintenance_period: 14, ..Config::default() };
            let manager = BudgetManager::new(
                config,
                Network::Testnet { fixed_subsidy: 100 * COIN },
                chain,
                directory,
                None,
                transport,
                Arc::new(OsRandomSource),
            );

            let mut p = Proposal {
                name: "p".to_string(),
                url: "https://example.invalid".to_string(),
                payee_script: Script(vec![0x76, 1]),
                amount: 50 * COIN,
                start_block: 0,
                end_block: Proposal::expected_end_block(0, manager.config.cycle_length, 1),
                collateral_txid: Hash256([9; 32]),
                created_time: Timestamp(0),
                votes: HashMap::new(),
                valid: true,
                invalid_reason: None,
                allotted: 0,
            };
            for i in 0..15u8 {
                p.votes.insert(
                    OutPoint { txid: Hash256([i; 32]), vout: 0 },
                    crate::vote::ProposalVote {
                        voter_outpoint: OutPoint { txid: Hash256([i; 32]), vout: 0 },
                        target_hash: p.hash(),
                        direction: crate::vote::Direction::No as u32,
                        time: Timestamp(0),
                        signature: Signature(vec![]),
                    },
                );
            }
            let hash = p.hash();
            {
                let mut state = manager.cs_proposals.lock().await;
                state.active.insert(hash, p);
            }

            // Not a multiple of the maintenance period: the heavily-downvoted
            // proposal must survive untouched.
            manager.on_new_block(1).await;
            assert!(manager.get_proposal(&hash).await.is_some());

            manager.on_new_block(14).await;
            assert!(manager.get_proposal(&hash).await.is_none());
        });
    }

    #[test]
    fn forced_rebroadcast_marks_connected_peers_full_synced() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            transport.peers.lock().unwrap().push(PeerId("peer-a".to_string()));
            let config = Config { maintenance_period: 1, rebroadcast_period: 1, ..Config::default() };
            let manager = BudgetManager::new(
                config,
                Network::Testnet { fixed_subsidy: 100 * COIN },
                chain,
                directory,
                None,
                transport.clone(),
                Arc::new(OsRandomSource),
            );

            manager.on_new_block(1).await;
            assert!(transport.full_synced.lock().unwrap().contains(&PeerId("peer-a".to_string())));
        });
    }
}
