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

use structopt_toml::{serde::Deserialize, structopt::StructOpt, StructOptToml};

/// How the local node, if it is itself a masternode, participates in
/// finalized-budget production (§4.7, §4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum BudgetMode {
    /// Construct and broadcast our own finalized budget once per cycle.
    Suggest,
    /// Auto-vote yes on a finalized budget that matches our own tally.
    Auto,
    /// Passive: ingest and relay only.
    None,
}

impl Default for BudgetMode {
    fn default() -> Self {
        BudgetMode::None
    }
}

/// Network parameters governing the governance engine.
///
/// Mirrors the host daemon's `Args`/`Settings` shape: a [`StructOpt`] CLI
/// overlay on top of a TOML file, loaded via [`StructOptToml`], with every
/// field defaulted so a bare test network config still loads.
#[derive(Clone, Debug, Deserialize, StructOpt, StructOptToml)]
#[serde(default)]
#[structopt(name = "govbudget")]
pub struct Config {
    /// Length of one governance cycle, in blocks.
    #[structopt(long, default_value = "43200")]
    pub cycle_length: u64,

    /// Confirmations required before a collateral transaction matures.
    #[structopt(long, default_value = "6")]
    pub required_confs: u32,

    /// Minimum time between two accepted votes from the same voter for the
    /// same target, in seconds.
    #[structopt(long, default_value = "3600")]
    pub min_update_interval: i64,

    /// Anti-spam waiting period before a proposal counts as "established", in seconds.
    #[structopt(long, default_value = "1296000")]
    pub establishment_window: i64,

    /// Fee a proposal's collateral transaction must pay, in the smallest unit.
    #[structopt(long, default_value = "5000000000")]
    pub proposal_fee: u64,

    /// Fee a finalized budget's collateral transaction must pay, in the smallest unit.
    #[structopt(long, default_value = "5000000000")]
    pub finalization_fee: u64,

    /// Minimum proposal payment amount, in the smallest unit.
    #[structopt(long, default_value = "10")]
    pub min_proposal_amount: u64,

    /// Maximum number of payments in a single finalized budget.
    #[structopt(long, default_value = "100")]
    pub max_payments: usize,

    /// How often (in blocks) the orchestrator runs its heavy maintenance pass.
    #[structopt(long, default_value = "14")]
    pub maintenance_period: u64,

    /// How often (in maintenance passes) the orchestrator forces a full
    /// re-broadcast by resetting the seen-sets.
    #[structopt(long, default_value = "1440")]
    pub rebroadcast_period: u64,

    /// How stale an ask-throttle entry must be before it is aged out, in seconds.
    #[structopt(long, default_value = "86400")]
    pub ask_throttle_secs: i64,

    /// Participation mode when the local node is itself a masternode.
    #[structopt(skip)]
    pub mode: BudgetMode,

    /// Network tag written into (and checked against) the persistence file.
    #[structopt(long, default_value = "mainnet")]
    pub network_tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cycle_length: 43_200,
            required_confs: 6,
            min_update_interval: 3_600,
            establishment_window: 1_296_000,
            proposal_fee: 50 * crate::schedule::COIN,
            finalization_fee: 50 * crate::schedule::COIN,
            min_proposal_amount: 10,
            max_payments: 100,
            maintenance_period: 14,
            rebroadcast_period: 1_440,
            ask_throttle_secs: 86_400,
            mode: BudgetMode::None,
            network_tag: "mainnet".to_string(),
        }
    }
}

impl Config {
    /// Window, in blocks, before the next cycle start during which the
    /// local node may submit its own finalized budget (§4.8): `max(2·C/30, 64)`.
    pub fn finalization_window_blocks(&self) -> u64 {
        std::cmp::max(2 * self.cycle_length / 30, 64)
    }
}
