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

//! The registry (§4.5): active sets, seen-sets, orphan queues, ask-throttle,
//! guarded by the four named mutexes of §5. This module only holds state
//! and construction; the operations live in the sibling `ingest`, `tally`
//! and `maintenance` modules so no single file has to hold the whole
//! component's share of the budget.

pub mod ingest;
pub mod maintenance;
pub mod tally;

use std::{
    collections::{HashMap, HashSet},
    sync::{atomic::{AtomicU64, Ordering}, Arc},
};

use smol::lock::Mutex;

use crate::{
    chain::{ChainView, MasternodeDirectory, OutPoint, Wallet},
    finalized_budget::FinalizedBudget,
    hash::Hash256,
    net::P2pTransport,
    proposal::Proposal,
    rng::RandomSource,
    schedule::Network,
    time::Timestamp,
    vote::{FinalizedVote, ProposalVote},
    Config,
};

/// A proposal or finalized budget whose collateral hasn't matured yet.
/// Held outside the active set until `promote_immature` finds it has
/// enough confirmations (§4.7 step 7).
pub struct ImmatureProposal {
    pub proposal: Proposal,
}

pub struct ImmatureFinalizedBudget {
    pub budget: FinalizedBudget,
}

/// State guarded by `cs_proposals` (§5): the active proposal set, its
/// immature staging area, and the seen-set used for relay dedup.
#[derive(Default)]
pub struct ProposalsState {
    pub active: HashMap<Hash256, Proposal>,
    pub immature: HashMap<Hash256, ImmatureProposal>,
    pub seen: HashSet<Hash256>,
}

/// State guarded by `cs_budgets` (§5).
#[derive(Default)]
pub struct BudgetsState {
    pub active: HashMap<Hash256, FinalizedBudget>,
    pub immature: HashMap<Hash256, ImmatureFinalizedBudget>,
    pub seen: HashSet<Hash256>,
}

/// State guarded by `cs_votes` (§5): orphan proposal votes (arrived before
/// their target) plus that category's seen-set and ask-throttle entries.
#[derive(Default)]
pub struct ProposalVotesState {
    pub orphans: HashMap<Hash256, Vec<ProposalVote>>,
    pub seen: HashSet<Hash256>,
    pub ask_throttle: HashMap<Hash256, Timestamp>,
}

/// State guarded by `cs_finalizedvotes` (§5).
#[derive(Default)]
pub struct FinalizedVotesState {
    pub orphans: HashMap<Hash256, Vec<FinalizedVote>>,
    pub seen: HashSet<Hash256>,
    pub ask_throttle: HashMap<Hash256, Timestamp>,
}

/// Outcome of an ingestion entry point (§7): lets a caller decide on
/// relay/ban actions without matching on error strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Duplicate,
    ParkedOrphan,
    ParkedImmature,
}

/// The registry. Cheap to clone (everything behind `Arc`), so a single
/// instance is shared between the orchestrator, the gossip layer and the
/// binary entrypoint.
pub struct BudgetManager {
    pub config: Config,
    pub network: Network,

    pub(crate) chain: Arc<dyn ChainView>,
    pub(crate) directory: Arc<dyn MasternodeDirectory>,
    pub(crate) wallet: Option<Arc<dyn Wallet>>,
    pub(crate) transport: Arc<dyn P2pTransport>,
    pub(crate) rng: Arc<dyn RandomSource>,

    pub(crate) cs_proposals: Arc<Mutex<ProposalsState>>,
    pub(crate) cs_budgets: Arc<Mutex<BudgetsState>>,
    pub(crate) cs_votes: Arc<Mutex<ProposalVotesState>>,
    pub(crate) cs_finalizedvotes: Arc<Mutex<FinalizedVotesState>>,

    best_height: AtomicU64,
    maintenance_ticks: AtomicU64,
}

impl BudgetManager {
    pub fn new(
        config: Config,
        network: Network,
        chain: Arc<dyn ChainView>,
        directory: Arc<dyn MasternodeDirectory>,
        wallet: Option<Arc<dyn Wallet>>,
        transport: Arc<dyn P2pTransport>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let best_height = chain.best_height();
        Self {
            config,
            network,
            chain,
            directory,
            wallet,
            transport,
            rng,
            cs_proposals: Arc::new(Mutex::new(ProposalsState::default())),
            cs_budgets: Arc::new(Mutex::new(BudgetsState::default())),
            cs_votes: Arc::new(Mutex::new(ProposalVotesState::default())),
            cs_finalizedvotes: Arc::new(Mutex::new(FinalizedVotesState::default())),
            best_height: AtomicU64::new(best_height),
            maintenance_ticks: AtomicU64::new(0),
        }
    }

    pub fn best_height(&self) -> u64 {
        self.best_height.load(Ordering::SeqCst)
    }

    /// Updated first in the orchestrator's tick (Ordering guarantee (c), §5).
    pub fn set_best_height(&self, height: u64) {
        self.best_height.store(height, Ordering::SeqCst);
    }

    pub(crate) fn next_maintenance_tick(&self) -> u64 {
        self.maintenance_ticks.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn get_proposal(&self, hash: &Hash256) -> Option<Proposal> {
        self.cs_proposals.lock().await.active.get(hash).cloned()
    }

    pub async fn get_finalized_budget(&self, hash: &Hash256) -> Option<FinalizedBudget> {
        self.cs_budgets.lock().await.active.get(hash).cloned()
    }

    /// `S = ceil(h/C) * C`, the next cycle boundary at or after `h`.
    pub fn cycle_start(&self, height: u64) -> u64 {
        let c = self.config.cycle_length;
        height.div_ceil(c) * c
    }

    /// `[S, S + C - 1]`, the next cycle's span.
    pub fn cycle_bounds(&self, height: u64) -> (u64, u64) {
        let s = self.cycle_start(height);
        (s, s + self.config.cycle_length - 1)
    }

    /// Whether `outpoint` is currently a valid (enabled) voter.
    pub(crate) async fn is_valid_voter(&self, outpoint: &OutPoint) -> bool {
        self.directory.is_enabled(outpoint).await
    }

    /// Resolves every distinct outpoint in `voters` against the directory
    /// and returns the subset currently enabled. The vote-tallying methods
    /// on `Proposal`/`FinalizedBudget` take a synchronous validity
    /// predicate, so callers resolve this set once up front (outside any
    /// `cs_*` lock) and pass `|op| set.contains(op)` into them.
    pub(crate) async fn valid_voter_set(
        &self,
        voters: impl IntoIterator<Item = OutPoint>,
    ) -> HashSet<OutPoint> {
        let mut seen = HashSet::new();
        let mut valid = HashSet::new();
        for outpoint in voters {
            if !seen.insert(outpoint) {
                continue
            }
            if self.directory.is_enabled(&outpoint).await {
                valid.insert(outpoint);
            }
        }
        valid
    }
}
