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

//! Collateral transaction validation (§4.1): every proposal and finalized
//! budget commits to its own item hash via a dedicated collateral
//! transaction, which must pay a minimum fee, mature to a confirmation
//! depth, and commit via OP_RETURN to exactly the hash being validated.

use crate::{chain::ChainView, hash::Hash256, time::Timestamp};

/// Outcome of validating a collateral transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollateralOutcome {
    Valid {
        confirmations: u32,
        /// Only set when the chain actually knows the block time; the
        /// caller fills `created_time` from this only if it was unset.
        block_time: Option<Timestamp>,
    },
    /// Otherwise well-formed, but not yet confirmed enough: the caller
    /// parks the item in its immature queue rather than rejecting it
    /// outright (§4.5).
    Immature {
        confirmations: u32,
    },
    Invalid(String),
}

impl CollateralOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, CollateralOutcome::Valid { .. })
    }
}

/// Validates `collateral_txid` against the chain: looks it up, checks it
/// has at least one output, a zero locktime, every output either a normal
/// spendable payment or an (intentionally) unspendable OP_RETURN, exactly
/// one OP_RETURN output committing to `expected_hash` with value at least
/// `fee_floor`, and at least `required_confs` confirmations.
pub async fn validate_collateral(
    chain: &dyn ChainView,
    collateral_txid: &Hash256,
    expected_hash: &Hash256,
    fee_floor: u64,
    required_confs: u32,
) -> CollateralOutcome {
    let lookup = match chain.get_transaction(collateral_txid).await {
        Some(l) => l,
        None => return CollateralOutcome::Invalid("collateral transaction not found".to_string()),
    };

    if lookup.tx.outputs.is_empty() {
        return CollateralOutcome::Invalid("collateral transaction has no outputs".to_string())
    }
    if lookup.tx.locktime != 0 {
        return CollateralOutcome::Invalid("collateral transaction has non-zero locktime".to_string())
    }

    let mut commitments = lookup.tx.outputs.iter().filter_map(|o| {
        o.script.as_op_return_commitment().map(|h| (h, o.value))
    });

    let (committed_hash, commitment_value) = match commitments.next() {
        Some(c) => c,
        None => return CollateralOutcome::Invalid("no OP_RETURN commitment output".to_string()),
    };
    if commitments.next().is_some() {
        return CollateralOutcome::Invalid("more than one OP_RETURN commitment output".to_string())
    }
    if committed_hash != *expected_hash {
        return CollateralOutcome::Invalid("commitment does not match the item hash".to_string())
    }
    if commitment_value < fee_floor {
        return CollateralOutcome::Invalid("commitment output pays below the required fee".to_string())
    }

    for output in &lookup.tx.outputs {
        if !output.script.is_unspendable() && output.script.is_p2sh() {
            return CollateralOutcome::Invalid("collateral transaction has a disallowed output script".to_string())
        }
    }

    if lookup.confirmations < required_confs {
        if lookup.confirmations >= 1 {
            return CollateralOutcome::Immature { confirmations: lookup.confirmations }
        }
        return CollateralOutcome::Invalid(format!(
            "only {} confirmations, {} required",
            lookup.confirmations, required_confs
        ))
    }

    CollateralOutcome::Valid { confirmations: lookup.confirmations, block_time: lookup.block_time }
}
