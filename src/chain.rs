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

//! Interfaces to the engine's external collaborators (§1, §5): the base
//! chain, the masternode directory and the local wallet. None of these are
//! implemented here — production wiring and tests both hand the manager an
//! `Arc<dyn Trait>`.

use async_trait::async_trait;
use darkfi_serial::{SerialDecodable, SerialEncodable};

use crate::{hash::Hash256, time::Timestamp, Result};

/// The OP_RETURN opcode, as a single byte.
pub const OP_RETURN: u8 = 0x6a;
/// Push-32-bytes opcode.
const OP_PUSH32: u8 = 0x20;

/// A locking script. We never interpret anything beyond the two shapes the
/// engine cares about: a normal payment script, or an OP_RETURN commitment.
#[derive(Clone, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// Build the canonical `OP_RETURN ‖ push32(hash)` commitment script (§6).
    pub fn op_return_commitment(hash: &Hash256) -> Self {
        let mut bytes = Vec::with_capacity(2 + 32);
        bytes.push(OP_RETURN);
        bytes.push(OP_PUSH32);
        bytes.extend_from_slice(hash.as_bytes());
        Self(bytes)
    }

    /// `true` if this script is an (intentionally) unspendable OP_RETURN output.
    pub fn is_unspendable(&self) -> bool {
        self.0.first() == Some(&OP_RETURN)
    }

    /// A script counts as a normal payment script iff it isn't an OP_RETURN
    /// and isn't a P2SH script (Proposal `payee_script` is restricted to
    /// P2PKH-style payments, §3).
    pub fn is_normal_payment(&self) -> bool {
        !self.is_unspendable() && !self.is_p2sh()
    }

    /// Very small P2SH sniff: `OP_HASH160 <20 bytes> OP_EQUAL`.
    pub fn is_p2sh(&self) -> bool {
        self.0.len() == 23 && self.0[0] == 0xa9 && self.0[1] == 0x14 && self.0[22] == 0x87
    }

    /// If this is exactly `OP_RETURN ‖ push32(hash)`, return the committed hash.
    pub fn as_op_return_commitment(&self) -> Option<Hash256> {
        if self.0.len() == 34 && self.0[0] == OP_RETURN && self.0[1] == OP_PUSH32 {
            let mut out = [0u8; 32];
            out.copy_from_slice(&self.0[2..34]);
            return Some(Hash256(out))
        }
        None
    }
}

/// One output of an on-chain transaction.
#[derive(Clone, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub struct TxOutput {
    pub script: Script,
    pub value: u64,
}

/// The subset of an on-chain transaction the engine ever looks at.
#[derive(Clone, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub struct ChainTransaction {
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

/// A masternode identity: the unspent output that collateralizes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SerialEncodable, SerialDecodable)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    /// Short `txid[0..8]-vout` form used inside the vote's signed message (§4.4).
    pub fn short_string(&self) -> String {
        format!("{}-{}", &self.txid.to_hex()[..8], self.vout)
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// An Ed25519-style signature over a vote's signed message.
#[derive(Clone, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub struct Signature(pub Vec<u8>);

/// A masternode's advertised public key.
#[derive(Clone, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub struct PublicKey(pub Vec<u8>);

/// Result of looking up a collateral transaction on the chain.
pub struct ChainTxLookup {
    pub tx: ChainTransaction,
    /// Number of confirmations on the currently active chain.
    pub confirmations: u32,
    /// Timestamp of the block that contains it, if confirmed at all.
    pub block_time: Option<Timestamp>,
}

/// The base chain, consumed read-only (§1, out of scope beyond this interface).
#[async_trait]
pub trait ChainView: Send + Sync {
    /// Look up a transaction by id on the currently active chain.
    async fn get_transaction(&self, txid: &Hash256) -> Option<ChainTxLookup>;

    /// The chain's adjusted clock (used for establishment windows and vote
    /// freshness checks, Invariant 2 and 4).
    fn adjusted_time(&self) -> Timestamp;

    /// Height of the current active chain tip.
    fn best_height(&self) -> u64;
}

/// The masternode directory (§1, out of scope beyond this interface).
#[async_trait]
pub trait MasternodeDirectory: Send + Sync {
    /// Whether `outpoint` currently identifies an enabled masternode.
    async fn is_enabled(&self, outpoint: &OutPoint) -> bool;

    /// The advertised public key for an enabled masternode, if any.
    async fn public_key(&self, outpoint: &OutPoint) -> Option<PublicKey>;

    /// Count of enabled masternodes at protocol version ≥ `min_protocol`
    /// (§3 Invariant 5/6 use this as the denominator for vote margins).
    async fn enabled_count(&self, min_protocol: u32) -> u64;
}

/// The local wallet (§1, out of scope beyond this interface). Only used
/// when the local node is itself a masternode in "suggest" mode (§4.8).
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Our own masternode identity, if we are one.
    fn our_outpoint(&self) -> Option<OutPoint>;

    /// Sign `message` with our masternode key.
    fn sign(&self, message: &[u8]) -> Result<Signature>;

    /// Build and broadcast-ready a collateral transaction committing to
    /// `item_hash` via OP_RETURN and paying at least `fee`.
    async fn create_collateral_tx(&self, item_hash: Hash256, fee: u64) -> Result<Hash256>;
}
