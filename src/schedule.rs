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

//! The cycle's total budget is a closed-form function of height (§6): the
//! per-block subsidy follows a halving schedule, and the governance budget
//! is 10% of the monthly subsidy, scaled to whatever cycle length the
//! network actually uses.

/// Smallest unit multiplier: one coin is this many units.
pub const COIN: u64 = 100_000_000;

/// One "month" of one-minute blocks, the unit the subsidy curve is defined in.
pub const BLOCKS_PER_MONTH: u64 = 43_200;

/// Subsidy at height 0, before any halving.
pub const INITIAL_SUBSIDY: u64 = 5 * COIN;

/// Height interval between successive subsidy halvings.
pub const HALVING_INTERVAL: u64 = 210_000;

/// After this many halvings the subsidy is treated as zero rather than
/// underflowing towards it one bit at a time forever.
const MAX_HALVINGS: u32 = 64;

/// Which network's subsidy curve to use when computing the cycle budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    /// Production: subsidy follows the halving curve below.
    Mainnet,
    /// Test network: a fixed per-block subsidy, no halving.
    Testnet { fixed_subsidy: u64 },
}

/// Per-block subsidy at `height` on the production halving curve.
pub fn block_subsidy(height: u64) -> u64 {
    let halvings = (height / HALVING_INTERVAL) as u32;
    if halvings >= MAX_HALVINGS {
        return 0
    }
    INITIAL_SUBSIDY >> halvings
}

/// The governance budget available for a cycle starting at `cycle_start`
/// and spanning `cycle_length` blocks: 10% of the monthly subsidy,
/// pro-rated to the cycle length.
pub fn cycle_budget(cycle_start: u64, cycle_length: u64, network: Network) -> u64 {
    let subsidy = match network {
        Network::Mainnet => block_subsidy(cycle_start),
        Network::Testnet { fixed_subsidy } => fixed_subsidy,
    } as u128;

    let monthly_budget = subsidy * 10 / 100 * BLOCKS_PER_MONTH as u128;
    let prorated = monthly_budget * cycle_length as u128 / BLOCKS_PER_MONTH as u128;
    prorated as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsidy_halves_at_interval() {
        assert_eq!(block_subsidy(0), INITIAL_SUBSIDY);
        assert_eq!(block_subsidy(HALVING_INTERVAL), INITIAL_SUBSIDY / 2);
        assert_eq!(block_subsidy(HALVING_INTERVAL * 2), INITIAL_SUBSIDY / 4);
    }

    #[test]
    fn subsidy_floors_to_zero_eventually() {
        assert_eq!(block_subsidy(HALVING_INTERVAL * (MAX_HALVINGS as u64 + 1)), 0);
    }

    #[test]
    fn monthly_cycle_budget_is_ten_percent_of_monthly_subsidy() {
        let budget = cycle_budget(0, BLOCKS_PER_MONTH, Network::Mainnet);
        let expected = (INITIAL_SUBSIDY as u128 * 10 / 100 * BLOCKS_PER_MONTH as u128) as u64;
        assert_eq!(budget, expected);
    }

    #[test]
    fn cycle_budget_scales_with_cycle_length() {
        let full_month = cycle_budget(0, BLOCKS_PER_MONTH, Network::Mainnet);
        let half_month = cycle_budget(0, BLOCKS_PER_MONTH / 2, Network::Mainnet);
        assert_eq!(half_month, full_month / 2);
    }

    #[test]
    fn testnet_uses_fixed_subsidy_regardless_of_height() {
        let net = Network::Testnet { fixed_subsidy: COIN };
        assert_eq!(cycle_budget(0, BLOCKS_PER_MONTH, net), cycle_budget(10_000_000, BLOCKS_PER_MONTH, net));
    }
}
