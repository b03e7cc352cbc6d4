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

//! Ingestion pipeline (§4.5): dedup, collateral check, seen-set, item
//! validation, active-set insertion, relay, orphan reconciliation — for
//! each of the five peer message types.

use darkfi_serial::serialize;
use log::{debug, warn};

use crate::{
    collateral::{validate_collateral, CollateralOutcome},
    error::{Error, Result},
    finalized_budget::FinalizedBudget,
    hash::Hash256,
    net::{
        messages::{FinalizedBudgetMessage, FinalizedVoteMessage, ProposalMessage, ProposalVoteMessage},
        BudgetVoteSyncMessage, InventoryItem, InventoryKind, P2pMessage, PeerId, SyncStatusCountMessage,
        BAN_SCORE_BAD_SIGNATURE, BAN_SCORE_REPEAT_FULL_SYNC,
    },
    proposal::Proposal,
    time::Timestamp,
    vote::{Direction, FinalizedVote, ProposalVote},
};

use super::{BudgetManager, ImmatureFinalizedBudget, ImmatureProposal, Outcome};

impl BudgetManager {
    /// `mprop`: ingest a proposal broadcast from `peer`.
    pub async fn submit_proposal(&self, peer: &PeerId, msg: ProposalMessage) -> Result<Outcome> {
        let mut proposal = Proposal::from(crate::proposal::ProposalBroadcast {
            name: msg.name,
            url: msg.url,
            payee_script: msg.payee_script,
            amount: msg.amount,
            start_block: msg.start_block,
            end_block: msg.end_block,
            collateral_txid: msg.collateral_txid,
            created_time: msg.created_time,
        });
        let hash = proposal.hash();

        {
            let state = self.cs_proposals.lock().await;
            if state.seen.contains(&hash) {
                return Ok(Outcome::Duplicate)
            }
        }

        let outcome = validate_collateral(
            self.chain.as_ref(),
            &proposal.collateral_txid,
            &hash,
            self.config.proposal_fee,
            self.config.required_confs,
        )
        .await;

        match outcome {
            CollateralOutcome::Valid { block_time, .. } => {
                if proposal.created_time.0 == 0 {
                    if let Some(t) = block_time {
                        proposal.created_time = t;
                    }
                }
            }
            CollateralOutcome::Immature { .. } => {
                let mut state = self.cs_proposals.lock().await;
                state.seen.insert(hash);
                state.immature.insert(hash, ImmatureProposal { proposal });
                return Ok(Outcome::ParkedImmature)
            }
            CollateralOutcome::Invalid(reason) => return Err(Error::InvalidCollateral(reason)),
        }

        {
            let mut state = self.cs_proposals.lock().await;
            state.seen.insert(hash);
        }

        let height = self.best_height();
        let enabled = self.directory.enabled_count(0).await;
        let voters = self.valid_voter_set(proposal.votes.keys().copied()).await;
        proposal.update_valid(
            height,
            enabled,
            self.config.min_proposal_amount,
            self.config.cycle_length,
            true,
            |op| voters.contains(op),
        );

        {
            let mut state = self.cs_proposals.lock().await;
            state.active.insert(hash, proposal);
        }

        self.transport
            .broadcast(ProposalMessage::COMMAND, serialize(&InventoryItem { kind: InventoryKind::Proposal, hash }))
            .await;
        debug!(target: "governance::manager::ingest", "accepted proposal {hash} from {peer:?}");

        self.reconcile_orphan_proposal_votes(hash).await;
        Ok(Outcome::Inserted)
    }

    /// `mvote`: ingest a vote on a proposal from `peer`.
    pub async fn submit_proposal_vote(&self, peer: &PeerId, msg: ProposalVoteMessage) -> Result<Outcome> {
        let vote = ProposalVote {
            voter_outpoint: msg.voter_outpoint,
            target_hash: msg.target_hash,
            direction: msg.direction,
            time: msg.time,
            signature: msg.signature,
        };
        if Direction::from_u32(vote.direction).is_none() {
            return Err(Error::MalformedItem("unrecognized vote direction".to_string()))
        }

        let vote_hash = vote.hash();
        {
            let state = self.cs_votes.lock().await;
            if state.seen.contains(&vote_hash) {
                return Ok(Outcome::Duplicate)
            }
        }

        let public_key = self.directory.public_key(&vote.voter_outpoint).await;
        let Some(public_key) = public_key else {
            debug!(target: "governance::manager::ingest", "vote from unknown voter {}", vote.voter_outpoint);
            return Err(Error::BadSignature)
        };
        if !self.verify_signature(&public_key, &vote.signed_message(), &vote.signature) {
            if self.transport.is_synced() {
                self.transport.increase_ban_score(peer, BAN_SCORE_BAD_SIGNATURE).await;
            }
            return Err(Error::BadSignature)
        }

        {
            let mut state = self.cs_votes.lock().await;
            state.seen.insert(vote_hash);
        }

        let mut proposals = self.cs_proposals.lock().await;
        match proposals.active.get_mut(&vote.target_hash) {
            Some(proposal) => {
                proposal
                    .add_or_update_vote(vote, self.config.min_update_interval, self.chain.adjusted_time())
                    .map_err(|e| Error::RateLimited(e.to_string()))?;
                drop(proposals);
                self.transport
                    .broadcast(
                        ProposalVoteMessage::COMMAND,
                        serialize(&InventoryItem { kind: InventoryKind::ProposalVote, hash: vote_hash }),
                    )
                    .await;
                Ok(Outcome::Inserted)
            }
            None => {
                drop(proposals);
                self.park_orphan_proposal_vote(peer, vote).await;
                Ok(Outcome::ParkedOrphan)
            }
        }
    }

    /// `fbs`: ingest a finalized budget broadcast from `peer`.
    pub async fn submit_finalized_budget(&self, peer: &PeerId, msg: FinalizedBudgetMessage) -> Result<Outcome> {
        let mut budget = FinalizedBudget::from(crate::finalized_budget::FinalizedBudgetBroadcast {
            name: msg.name,
            start_block: msg.start_block,
            payments: msg.payments,
            collateral_txid: msg.collateral_txid,
            created_time: msg.created_time,
        });
        let hash = budget.hash();

        {
            let state = self.cs_budgets.lock().await;
            if state.seen.contains(&hash) {
                return Ok(Outcome::Duplicate)
            }
        }

        let outcome = validate_collateral(
            self.chain.as_ref(),
            &budget.collateral_txid,
            &hash,
            self.config.finalization_fee,
            self.config.required_confs,
        )
        .await;

        match outcome {
            CollateralOutcome::Valid { block_time, .. } => {
                if budget.created_time.0 == 0 {
                    if let Some(t) = block_time {
                        budget.created_time = t;
                    }
                }
            }
            CollateralOutcome::Immature { .. } => {
                let mut state = self.cs_budgets.lock().await;
                state.seen.insert(hash);
                state.immature.insert(hash, ImmatureFinalizedBudget { budget });
                return Ok(Outcome::ParkedImmature)
            }
            CollateralOutcome::Invalid(reason) => return Err(Error::InvalidCollateral(reason)),
        }

        {
            let mut state = self.cs_budgets.lock().await;
            state.seen.insert(hash);
        }

        let cycle_budget = crate::schedule::cycle_budget(budget.start_block, self.config.cycle_length, self.network);
        let proposals = self.cs_proposals.lock().await;
        let known_hashes: std::collections::HashSet<Hash256> = proposals.active.keys().copied().collect();
        drop(proposals);
        if !budget.is_well_formed(self.config.max_payments, cycle_budget, |h| known_hashes.contains(h)) {
            return Err(Error::MalformedItem("finalized budget failed well-formedness checks".to_string()))
        }

        {
            let mut state = self.cs_budgets.lock().await;
            state.active.insert(hash, budget);
        }

        self.transport
            .broadcast(FinalizedBudgetMessage::COMMAND, serialize(&InventoryItem { kind: InventoryKind::FinalizedBudget, hash }))
            .await;
        debug!(target: "governance::manager::ingest", "accepted finalized budget {hash} from {peer:?}");

        self.reconcile_orphan_finalized_votes(hash).await;
        Ok(Outcome::Inserted)
    }

    /// `fbvote`: ingest a vote on a finalized budget from `peer`.
    pub async fn submit_finalized_vote(&self, peer: &PeerId, msg: FinalizedVoteMessage) -> Result<Outcome> {
        let vote = FinalizedVote { voter_outpoint: msg.voter_outpoint, target_hash: msg.target_hash, time: msg.time, signature: msg.signature };
        let vote_hash = vote.hash();

        {
            let state = self.cs_finalizedvotes.lock().await;
            if state.seen.contains(&vote_hash) {
                return Ok(Outcome::Duplicate)
            }
        }

        let public_key = self.directory.public_key(&vote.voter_outpoint).await;
        let Some(public_key) = public_key else {
            return Err(Error::BadSignature)
        };
        if !self.verify_signature(&public_key, &vote.signed_message(), &vote.signature) {
            if self.transport.is_synced() {
                self.transport.increase_ban_score(peer, BAN_SCORE_BAD_SIGNATURE).await;
            }
            return Err(Error::BadSignature)
        }

        {
            let mut state = self.cs_finalizedvotes.lock().await;
            state.seen.insert(vote_hash);
        }

        let mut budgets = self.cs_budgets.lock().await;
        match budgets.active.get_mut(&vote.target_hash) {
            Some(budget) => {
                budget
                    .add_or_update_vote(vote, self.config.min_update_interval, self.chain.adjusted_time())
                    .map_err(|e| Error::RateLimited(e.to_string()))?;
                drop(budgets);
                self.transport
                    .broadcast(
                        FinalizedVoteMessage::COMMAND,
                        serialize(&InventoryItem { kind: InventoryKind::FinalizedVote, hash: vote_hash }),
                    )
                    .await;
                Ok(Outcome::Inserted)
            }
            None => {
                drop(budgets);
                self.park_orphan_finalized_vote(peer, vote).await;
                Ok(Outcome::ParkedOrphan)
            }
        }
    }

    /// `mnvs`: a peer asks for every vote on `msg.target` (or a full sync,
    /// everything we hold, if `target` is zero). A full request may only be
    /// served once per peer on mainnet (§4.6); a repeat raises its ban score
    /// instead of being served again.
    pub async fn handle_vote_sync_request(&self, peer: &PeerId, msg: BudgetVoteSyncMessage) -> Result<()> {
        let full = msg.target == Hash256::default();
        if full && self.network == crate::schedule::Network::Mainnet {
            if self.transport.has_full_synced(peer).await {
                self.transport.increase_ban_score(peer, BAN_SCORE_REPEAT_FULL_SYNC).await;
                return Ok(())
            }
        }
        self.sync(peer, msg.target, !full).await;
        if full {
            self.transport.mark_full_synced(peer).await;
        }
        Ok(())
    }

    /// `sync(peer, target, partial)` (§4.6): walks the active proposal and
    /// finalized-budget sets (or only `target` when it names one), pushes
    /// an [`InventoryItem`] for each, and for a full sync also streams every
    /// vote on it so a peer starting from nothing doesn't need a
    /// round-trip per item. A partial sync only announces inventory,
    /// leaving vote payloads to the existing ask-and-relay path
    /// (`ask_for_target`/orphan reconciliation). Each of the four
    /// categories is terminated with a [`SyncStatusCountMessage`].
    async fn sync(&self, peer: &PeerId, target: Hash256, partial: bool) {
        let proposals: Vec<Proposal> = {
            let state = self.cs_proposals.lock().await;
            if target == Hash256::default() {
                state.active.values().cloned().collect()
            } else {
                state.active.get(&target).cloned().into_iter().collect()
            }
        };
        let budgets: Vec<FinalizedBudget> = {
            let state = self.cs_budgets.lock().await;
            if target == Hash256::default() {
                state.active.values().cloned().collect()
            } else {
                state.active.get(&target).cloned().into_iter().collect()
            }
        };

        let mut proposal_votes = 0u64;
        for proposal in &proposals {
            let hash = proposal.hash();
            self.transport.send(peer, ProposalMessage::COMMAND, serialize(&InventoryItem { kind: InventoryKind::Proposal, hash })).await;
            if !partial {
                for vote in proposal.votes.values() {
                    let msg = ProposalVoteMessage {
                        voter_outpoint: vote.voter_outpoint,
                        target_hash: vote.target_hash,
                        direction: vote.direction,
                        time: vote.time,
                        signature: vote.signature.clone(),
                    };
                    self.transport.send(peer, ProposalVoteMessage::COMMAND, serialize(&msg)).await;
                    proposal_votes += 1;
                }
            }
        }
        self.transport
            .send(peer, SyncStatusCountMessage::COMMAND, serialize(&SyncStatusCountMessage { kind: InventoryKind::Proposal, count: proposals.len() as u64 }))
            .await;
        self.transport
            .send(
                peer,
                SyncStatusCountMessage::COMMAND,
                serialize(&SyncStatusCountMessage { kind: InventoryKind::ProposalVote, count: proposal_votes }),
            )
            .await;

        let mut budget_votes = 0u64;
        for budget in &budgets {
            let hash = budget.hash();
            self.transport
                .send(peer, FinalizedBudgetMessage::COMMAND, serialize(&InventoryItem { kind: InventoryKind::FinalizedBudget, hash }))
                .await;
            if !partial {
                for vote in budget.votes.values() {
                    let msg = FinalizedVoteMessage {
                        voter_outpoint: vote.voter_outpoint,
                        target_hash: vote.target_hash,
                        time: vote.time,
                        signature: vote.signature.clone(),
                    };
                    self.transport.send(peer, FinalizedVoteMessage::COMMAND, serialize(&msg)).await;
                    budget_votes += 1;
                }
            }
        }
        self.transport
            .send(
                peer,
                SyncStatusCountMessage::COMMAND,
                serialize(&SyncStatusCountMessage { kind: InventoryKind::FinalizedBudget, count: budgets.len() as u64 }),
            )
            .await;
        self.transport
            .send(
                peer,
                SyncStatusCountMessage::COMMAND,
                serialize(&SyncStatusCountMessage { kind: InventoryKind::FinalizedVote, count: budget_votes }),
            )
            .await;
    }

    /// Pushes an always-served partial sync to every connected peer that
    /// hasn't already received a full one (§4.7 step 4).
    pub(crate) async fn push_partial_sync(&self) {
        for peer in self.transport.connected_peers().await {
            if !self.transport.has_full_synced(&peer).await {
                self.sync(&peer, Hash256::default(), true).await;
            }
        }
    }

    async fn park_orphan_proposal_vote(&self, peer: &PeerId, vote: ProposalVote) {
        let target = vote.target_hash;
        let mut state = self.cs_votes.lock().await;
        state.orphans.entry(target).or_default().push(vote);
        self.ask_for_target(peer, target, &mut state.ask_throttle).await;
    }

    async fn park_orphan_finalized_vote(&self, peer: &PeerId, vote: FinalizedVote) {
        let target = vote.target_hash;
        let mut state = self.cs_finalizedvotes.lock().await;
        state.orphans.entry(target).or_default().push(vote);
        self.ask_for_target(peer, target, &mut state.ask_throttle).await;
    }

    /// Sends `mnvs(target)` to `peer`, throttled to once per
    /// `ask_throttle_secs` (§4.5, Testable property 9).
    async fn ask_for_target(
        &self,
        peer: &PeerId,
        target: Hash256,
        throttle: &mut std::collections::HashMap<Hash256, Timestamp>,
    ) {
        let now = self.chain.adjusted_time();
        if let Some(last) = throttle.get(&target) {
            if now.0 - last.0 < self.config.ask_throttle_secs {
                return
            }
        }
        throttle.insert(target, now);
        self.transport
            .send(peer, BudgetVoteSyncMessage::COMMAND, serialize(&BudgetVoteSyncMessage { target }))
            .await;
    }

    /// Promotes orphaned proposal votes now that `target` has arrived.
    async fn reconcile_orphan_proposal_votes(&self, target: Hash256) {
        let orphaned = {
            let mut state = self.cs_votes.lock().await;
            state.orphans.remove(&target).unwrap_or_default()
        };
        if orphaned.is_empty() {
            return
        }
        let mut proposals = self.cs_proposals.lock().await;
        if let Some(proposal) = proposals.active.get_mut(&target) {
            let now = self.chain.adjusted_time();
            for vote in orphaned {
                let _ = proposal.add_or_update_vote(vote, self.config.min_update_interval, now);
            }
        }
    }

    /// Promotes orphaned finalized-budget votes now that `target` has arrived.
    async fn reconcile_orphan_finalized_votes(&self, target: Hash256) {
        let orphaned = {
            let mut state = self.cs_finalizedvotes.lock().await;
            state.orphans.remove(&target).unwrap_or_default()
        };
        if orphaned.is_empty() {
            return
        }
        let mut budgets = self.cs_budgets.lock().await;
        if let Some(budget) = budgets.active.get_mut(&target) {
            let now = self.chain.adjusted_time();
            for vote in orphaned {
                let _ = budget.add_or_update_vote(vote, self.config.min_update_interval, now);
            }
        }
    }

    /// Placeholder signature check: real verification needs the chain's
    /// signature scheme (out of scope, §1); wired through so the ingestion
    /// pipeline's control flow around `BadSignature` is exercised and so a
    /// concrete scheme can be dropped in without touching callers.
    pub(crate) fn verify_signature(
        &self,
        public_key: &crate::chain::PublicKey,
        message: &[u8],
        signature: &crate::chain::Signature,
    ) -> bool {
        !public_key.0.is_empty() && !signature.0.is_empty() && !message.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::{
        ChainTransaction, ChainTxLookup, ChainView, MasternodeDirectory, OutPoint, PublicKey, Script, Signature, TxOutput, Wallet,
    };
    use async_trait::async_trait;
    use std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex as StdMutex},
    };

    #[derive(Default)]
    pub struct FakeChain {
        pub txs: StdMutex<HashMap<Hash256, ChainTxLookup>>,
        pub now: StdMutex<i64>,
        pub height: StdMutex<u64>,
    }

    impl FakeChain {
        pub fn insert_confirmed(&self, txid: Hash256, outputs: Vec<TxOutput>, confirmations: u32) {
            self.txs.lock().unwrap().insert(
                txid,
                ChainTxLookup { tx: ChainTransaction { outputs, locktime: 0 }, confirmations, block_time: Some(Timestamp(1_000)) },
            );
        }
    }

    #[async_trait]
    impl ChainView for FakeChain {
        async fn get_transaction(&self, txid: &Hash256) -> Option<ChainTxLookup> {
            self.txs.lock().unwrap().get(txid).map(|l| ChainTxLookup { tx: l.tx.clone(), confirmations: l.confirmations, block_time: l.block_time })
        }
        fn adjusted_time(&self) -> Timestamp {
            Timestamp(*self.now.lock().unwrap())
        }
        fn best_height(&self) -> u64 {
            *self.height.lock().unwrap()
        }
    }

    #[derive(Default)]
    pub struct FakeDirectory {
        pub enabled: StdMutex<HashSet<OutPoint>>,
        pub keys: StdMutex<HashMap<OutPoint, PublicKey>>,
    }

    impl FakeDirectory {
        pub fn register(&self, outpoint: OutPoint) {
            self.enabled.lock().unwrap().insert(outpoint);
            self.keys.lock().unwrap().insert(outpoint, PublicKey(vec![1]));
        }
    }

    #[async_trait]
    impl MasternodeDirectory for FakeDirectory {
        async fn is_enabled(&self, outpoint: &OutPoint) -> bool {
            self.enabled.lock().unwrap().contains(outpoint)
        }
        async fn public_key(&self, outpoint: &OutPoint) -> Option<PublicKey> {
            self.keys.lock().unwrap().get(outpoint).cloned()
        }
        async fn enabled_count(&self, _min_protocol: u32) -> u64 {
            self.enabled.lock().unwrap().len() as u64
        }
    }

    pub struct FakeWallet;
    #[async_trait]
    impl Wallet for FakeWallet {
        fn our_outpoint(&self) -> Option<OutPoint> {
            None
        }
        fn sign(&self, _message: &[u8]) -> Result<Signature> {
            Ok(Signature(vec![1]))
        }
        async fn create_collateral_tx(&self, _item_hash: Hash256, _fee: u64) -> Result<Hash256> {
            Ok(Hash256::zero())
        }
    }

    #[derive(Default)]
    pub struct FakeTransport {
        pub broadcasts: StdMutex<Vec<&'static str>>,
        pub sent: StdMutex<Vec<(PeerId, &'static str)>>,
        pub ban_scores: StdMutex<HashMap<PeerId, u32>>,
        pub peers: StdMutex<Vec<PeerId>>,
        pub full_synced: StdMutex<HashSet<PeerId>>,
    }

    #[async_trait]
    impl crate::net::P2pTransport for FakeTransport {
        async fn send(&self, peer: &PeerId, command: &'static str, _payload: Vec<u8>) {
            self.sent.lock().unwrap().push((peer.clone(), command));
        }
        async fn broadcast(&self, command: &'static str, _payload: Vec<u8>) {
            self.broadcasts.lock().unwrap().push(command);
        }
        async fn increase_ban_score(&self, peer: &PeerId, amount: u32) {
            *self.ban_scores.lock().unwrap().entry(peer.clone()).or_insert(0) += amount;
        }
        async fn has_full_synced(&self, peer: &PeerId) -> bool {
            self.full_synced.lock().unwrap().contains(peer)
        }
        async fn mark_full_synced(&self, peer: &PeerId) {
            self.full_synced.lock().unwrap().insert(peer.clone());
        }
        fn is_synced(&self) -> bool {
            true
        }
        async fn connected_peers(&self) -> Vec<PeerId> {
            self.peers.lock().unwrap().clone()
        }
    }

    fn manager_with(chain: Arc<FakeChain>, directory: Arc<FakeDirectory>, transport: Arc<FakeTransport>) -> BudgetManager {
        use crate::{config::Config, rng::OsRandomSource, schedule::Network};
        BudgetManager::new(
            Config::default(),
            Network::Testnet { fixed_subsidy: crate::schedule::COIN },
            chain,
            directory,
            Some(Arc::new(FakeWallet)),
            transport,
            Arc::new(OsRandomSource),
        )
    }

    fn sample_proposal_message() -> (ProposalMessage, Hash256) {
        let collateral_txid = Hash256([9; 32]);
        let msg = ProposalMessage {
            name: "road-fund".to_string(),
            url: "https://example.invalid".to_string(),
            payee_script: Script(vec![0x76, 0x01]),
            amount: 50 * crate::schedule::COIN,
            start_block: 86_400,
            end_block: Proposal::expected_end_block(86_400, 43_200, 1),
            collateral_txid,
            created_time: Timestamp(0),
        };
        (msg, collateral_txid)
    }

    #[test]
    fn proposal_with_mature_collateral_is_accepted() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            let (msg, txid) = sample_proposal_message();
            let commitment_hash = Proposal::from(crate::proposal::ProposalBroadcast {
                name: msg.name.clone(),
                url: msg.url.clone(),
                payee_script: msg.payee_script.clone(),
                amount: msg.amount,
                start_block: msg.start_block,
                end_block: msg.end_block,
                collateral_txid: msg.collateral_txid,
                created_time: msg.created_time,
            })
            .hash();
            chain.insert_confirmed(
                txid,
                vec![TxOutput { script: Script::op_return_commitment(&commitment_hash), value: 60 * crate::schedule::COIN }],
                10,
            );

            let manager = manager_with(chain, directory, transport.clone());
            let peer = PeerId("p1".to_string());
            let outcome = manager.submit_proposal(&peer, msg).await.unwrap();
            assert_eq!(outcome, Outcome::Inserted);
            assert!(manager.get_proposal(&commitment_hash).await.is_some());
            assert_eq!(*transport.broadcasts.lock().unwrap(), vec!["mprop"]);
        });
    }

    #[test]
    fn duplicate_proposal_is_rejected_as_duplicate() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            let (msg, txid) = sample_proposal_message();
            let commitment_hash = Proposal::from(crate::proposal::ProposalBroadcast {
                name: msg.name.clone(),
                url: msg.url.clone(),
                payee_script: msg.payee_script.clone(),
                amount: msg.amount,
                start_block: msg.start_block,
                end_block: msg.end_block,
                collateral_txid: msg.collateral_txid,
                created_time: msg.created_time,
            })
            .hash();
            chain.insert_confirmed(
                txid,
                vec![TxOutput { script: Script::op_return_commitment(&commitment_hash), value: 60 * crate::schedule::COIN }],
                10,
            );
            let manager = manager_with(chain, directory, transport);
            let peer = PeerId("p1".to_string());
            manager.submit_proposal(&peer, msg.clone()).await.unwrap();
            let second = manager.submit_proposal(&peer, msg).await.unwrap();
            assert_eq!(second, Outcome::Duplicate);
        });
    }

    #[test]
    fn immature_collateral_is_parked() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            let (msg, txid) = sample_proposal_message();
            let commitment_hash = Proposal::from(crate::proposal::ProposalBroadcast {
                name: msg.name.clone(),
                url: msg.url.clone(),
                payee_script: msg.payee_script.clone(),
                amount: msg.amount,
                start_block: msg.start_block,
                end_block: msg.end_block,
                collateral_txid: msg.collateral_txid,
                created_time: msg.created_time,
            })
            .hash();
            chain.insert_confirmed(
                txid,
                vec![TxOutput { script: Script::op_return_commitment(&commitment_hash), value: 60 * crate::schedule::COIN }],
                1,
            );
            let manager = manager_with(chain, directory, transport);
            let peer = PeerId("p1".to_string());
            let outcome = manager.submit_proposal(&peer, msg).await.unwrap();
            assert_eq!(outcome, Outcome::ParkedImmature);
        });
    }

    #[test]
    fn vote_for_unknown_target_is_parked_orphan_and_throttled() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let voter = OutPoint { txid: Hash256([3; 32]), vout: 0 };
            directory.register(voter);
            let transport = Arc::new(FakeTransport::default());
            let directory_handle = directory.clone();
            let manager = manager_with(chain, directory, transport.clone());
            let peer = PeerId("p1".to_string());

            let msg = ProposalVoteMessage {
                voter_outpoint: voter,
                target_hash: Hash256([7; 32]),
                direction: Direction::Yes as u32,
                time: Timestamp(10),
                signature: Signature(vec![1]),
            };
            let outcome = manager.submit_proposal_vote(&peer, msg.clone()).await.unwrap();
            assert_eq!(outcome, Outcome::ParkedOrphan);
            assert_eq!(transport.sent.lock().unwrap().len(), 1);

            // A second orphan vote for the same target within the window must not re-ask,
            // even once the vote hash itself differs (a later timestamp on the same vote).
            let second_voter = OutPoint { txid: Hash256([4; 32]), vout: 0 };
            directory_handle.register(second_voter);
            let msg2 = ProposalVoteMessage { voter_outpoint: second_voter, time: Timestamp(20), ..msg };
            manager.submit_proposal_vote(&peer, msg2).await.unwrap();
            assert_eq!(transport.sent.lock().unwrap().len(), 1);
        });
    }

    #[test]
    fn full_sync_request_streams_items_and_votes_then_marks_full_synced() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            let manager = manager_with(chain, directory, transport.clone());

            let mut proposal = Proposal {
                name: "p".to_string(),
                url: "https://example.invalid".to_string(),
                payee_script: Script(vec![0x76, 1]),
                amount: 50 * crate::schedule::COIN,
                start_block: 0,
                end_block: Proposal::expected_end_block(0, manager.config.cycle_length, 1),
                collateral_txid: Hash256([9; 32]),
                created_time: Timestamp(0),
                votes: HashMap::new(),
                valid: true,
                invalid_reason: None,
                allotted: 0,
            };
            let voter = OutPoint { txid: Hash256([1; 32]), vout: 0 };
            proposal.votes.insert(
                voter,
                ProposalVote { voter_outpoint: voter, target_hash: proposal.hash(), direction: Direction::Yes as u32, time: Timestamp(0), signature: Signature(vec![1]) },
            );
            let hash = proposal.hash();
            {
                let mut state = manager.cs_proposals.lock().await;
                state.active.insert(hash, proposal);
            }

            let peer = PeerId("p1".to_string());
            manager.handle_vote_sync_request(&peer, BudgetVoteSyncMessage { target: Hash256::zero() }).await.unwrap();

            let sent = transport.sent.lock().unwrap();
            let commands: Vec<_> = sent.iter().map(|(_, c)| *c).collect();
            assert_eq!(commands.iter().filter(|c| **c == ProposalMessage::COMMAND).count(), 1);
            assert_eq!(commands.iter().filter(|c| **c == ProposalVoteMessage::COMMAND).count(), 1);
            assert_eq!(commands.iter().filter(|c| **c == SyncStatusCountMessage::COMMAND).count(), 4);
            drop(sent);
            assert!(transport.full_synced.lock().unwrap().contains(&peer));
        });
    }

    #[test]
    fn scoped_sync_request_never_latches_full_sync() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            let manager = manager_with(chain, directory, transport.clone());

            let proposal = Proposal {
                name: "p".to_string(),
                url: "https://example.invalid".to_string(),
                payee_script: Script(vec![0x76, 1]),
                amount: 50 * crate::schedule::COIN,
                start_block: 0,
                end_block: Proposal::expected_end_block(0, manager.config.cycle_length, 1),
                collateral_txid: Hash256([9; 32]),
                created_time: Timestamp(0),
                votes: HashMap::new(),
                valid: true,
                invalid_reason: None,
                allotted: 0,
            };
            let hash = proposal.hash();
            {
                let mut state = manager.cs_proposals.lock().await;
                state.active.insert(hash, proposal);
            }

            let peer = PeerId("p1".to_string());
            manager.handle_vote_sync_request(&peer, BudgetVoteSyncMessage { target: hash }).await.unwrap();
            assert!(!transport.full_synced.lock().unwrap().contains(&peer));
            assert_eq!(transport.sent.lock().unwrap().iter().filter(|(_, c)| *c == ProposalMessage::COMMAND).count(), 1);
        });
    }

    #[test]
    fn repeat_full_sync_request_on_mainnet_raises_ban_score_instead_of_serving() {
        use crate::{config::Config, rng::OsRandomSource, schedule::Network};

        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            let manager = BudgetManager::new(
                Config::default(),
                Network::Mainnet,
                chain,
                directory,
                Some(Arc::new(FakeWallet)),
                transport.clone(),
                Arc::new(OsRandomSource),
            );

            let peer = PeerId("p1".to_string());
            manager.handle_vote_sync_request(&peer, BudgetVoteSyncMessage { target: Hash256::zero() }).await.unwrap();
            assert!(transport.full_synced.lock().unwrap().contains(&peer));
            transport.sent.lock().unwrap().clear();

            manager.handle_vote_sync_request(&peer, BudgetVoteSyncMessage { target: Hash256::zero() }).await.unwrap();
            assert_eq!(*transport.ban_scores.lock().unwrap().get(&peer).unwrap(), crate::net::BAN_SCORE_REPEAT_FULL_SYNC);
            assert!(transport.sent.lock().unwrap().is_empty());
        });
    }

    #[test]
    fn push_partial_sync_skips_peers_already_full_synced() {
        smol::block_on(async {
            let chain = Arc::new(FakeChain::default());
            let directory = Arc::new(FakeDirectory::default());
            let transport = Arc::new(FakeTransport::default());
            transport.peers.lock().unwrap().push(PeerId("synced".to_string()));
            transport.peers.lock().unwrap().push(PeerId("catching-up".to_string()));
            transport.full_synced.lock().unwrap().insert(PeerId("synced".to_string()));
            let manager = manager_with(chain, directory, transport.clone());

            manager.push_partial_sync().await;

            let sent = transport.sent.lock().unwrap();
            assert!(!sent.iter().any(|(p, _)| p == &PeerId("synced".to_string())));
            assert!(sent.iter().any(|(p, _)| p == &PeerId("catching-up".to_string())));
        });
    }
}
