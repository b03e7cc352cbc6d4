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

//! The five wire message shapes (§6), each tagged with its protocol command
//! string the way the host daemon's own `proto/` messages are, via
//! [`P2pMessage`] rather than `darkfi::impl_p2p_message!` — that macro lives
//! on the transport crate this engine treats as an external interface
//! (§1, §5), not a dependency.

use darkfi_serial::{SerialDecodable, SerialEncodable};

use crate::{
    chain::{OutPoint, Script, Signature},
    finalized_budget::Payment,
    hash::Hash256,
    time::Timestamp,
};

/// A wire message tagged with the short command string peers use to
/// identify it, mirroring `impl_p2p_message!`'s contract without depending
/// on the macro itself.
pub trait P2pMessage: SerialEncodable + SerialDecodable {
    const COMMAND: &'static str;
}

/// `mnvs` — request for every vote on `target`, or all known votes when `target` is zero.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct BudgetVoteSyncMessage {
    pub target: Hash256,
}

impl P2pMessage for BudgetVoteSyncMessage {
    const COMMAND: &'static str = "mnvs";
}

/// `mprop` — a spending proposal broadcast.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct ProposalMessage {
    pub name: String,
    pub url: String,
    pub payee_script: Script,
    pub amount: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub collateral_txid: Hash256,
    pub created_time: Timestamp,
}

impl P2pMessage for ProposalMessage {
    const COMMAND: &'static str = "mprop";
}

/// `mvote` — a vote on a proposal.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct ProposalVoteMessage {
    pub voter_outpoint: OutPoint,
    pub target_hash: Hash256,
    pub direction: u32,
    pub time: Timestamp,
    pub signature: Signature,
}

impl P2pMessage for ProposalVoteMessage {
    const COMMAND: &'static str = "mvote";
}

/// `fbs` — a finalized budget broadcast.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct FinalizedBudgetMessage {
    pub name: String,
    pub start_block: u64,
    pub payments: Vec<Payment>,
    pub collateral_txid: Hash256,
    pub created_time: Timestamp,
}

impl P2pMessage for FinalizedBudgetMessage {
    const COMMAND: &'static str = "fbs";
}

/// `fbvote` — a vote on a finalized budget.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct FinalizedVoteMessage {
    pub voter_outpoint: OutPoint,
    pub target_hash: Hash256,
    pub time: Timestamp,
    pub signature: Signature,
}

impl P2pMessage for FinalizedVoteMessage {
    const COMMAND: &'static str = "fbvote";
}

/// Which category an [`InventoryItem`]/`SYNCSTATUSCOUNT` refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub enum InventoryKind {
    Proposal,
    FinalizedBudget,
    ProposalVote,
    FinalizedVote,
}

/// One entry pushed during `sync()` (§4.6): announces that we hold an item
/// with this hash, without necessarily sending its full payload.
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct InventoryItem {
    pub kind: InventoryKind,
    pub hash: Hash256,
}

/// Terminates one category of a sync response (§4.6, §6).
#[derive(Clone, Debug, SerialEncodable, SerialDecodable)]
pub struct SyncStatusCountMessage {
    pub kind: InventoryKind,
    pub count: u64,
}

impl P2pMessage for SyncStatusCountMessage {
    const COMMAND: &'static str = "ssc";
}
