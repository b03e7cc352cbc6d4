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

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the governance engine.
///
/// Collateral- and signature-related variants that originated from a peer
/// are the ones a caller should turn into a ban-score increment; the rest
/// are logged and dropped by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Collateral transaction missing, unconfirmed, underpaid, or missing/wrong OP_RETURN.
    #[error("invalid collateral: {0}")]
    InvalidCollateral(String),

    /// Item fails well-formedness checks (range, address, start/end consistency).
    #[error("malformed item: {0}")]
    MalformedItem(String),

    /// Item has expired or is obsolete given the current height.
    #[error("stale item: {0}")]
    StaleItem(String),

    /// Vote refers to a proposal or finalized budget the manager doesn't know about yet.
    #[error("unknown target: {0}")]
    UnknownTarget(crate::hash::Hash256),

    /// Vote signature didn't verify against the voter's advertised key.
    #[error("bad signature from voter")]
    BadSignature,

    /// Vote arrived too soon after a previous one from the same voter, or too far in the future.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Item or vote is already known; not an error, but not a fresh insert either.
    #[error("duplicate, already seen")]
    DuplicateSeen,

    /// Snapshot file I/O, hash mismatch, magic/network mismatch, or decode failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
