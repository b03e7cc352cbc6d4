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

//! Masternode governance engine.
//!
//! Maintains the shared state of spending proposals and finalized-budget
//! ballots, validates them against the chain and against masternode
//! identity, gossips valid items to peers, and on every new block selects
//! the passing proposals and the best-supported finalized budget so that
//! the host chain knows what a superblock's coinstake must pay.

pub mod chain;
pub mod collateral;
pub mod config;
pub mod error;
pub mod finalized_budget;
pub mod hash;
pub mod manager;
pub mod net;
pub mod orchestrator;
pub mod persistence;
pub mod proposal;
pub mod rng;
pub mod schedule;
pub mod submit;
pub mod time;
pub mod vote;

pub use config::Config;
pub use error::{Error, Result};
pub use hash::Hash256;
pub use manager::BudgetManager;
