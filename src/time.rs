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

use chrono::Utc;
use darkfi_serial::{SerialDecodable, SerialEncodable};

/// One hour, in seconds. A replacement vote more than this far in the
/// future (relative to the adjusted clock) is rejected (Invariant 2).
pub const MAX_FUTURE_DRIFT_SECS: i64 = 60 * 60;

/// Unix timestamp in seconds, as handed out by the chain's adjusted clock.
///
/// This is deliberately a thin wrapper: the chain is the authority on
/// "adjusted time" (out of scope, §1); the engine only ever consumes it
/// through [`crate::chain::ChainView::adjusted_time`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, SerialEncodable, SerialDecodable)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn checked_add_secs(&self, secs: i64) -> Self {
        Self(self.0 + secs)
    }

    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
