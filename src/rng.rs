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

//! Injectable random source (Design Notes) so the cooperative probabilistic
//! branches — auto-vote firing ~1-in-4, the re-broadcast reseed firing
//! ~1-in-1440 — are deterministically testable instead of only observable
//! statistically.

use std::sync::Mutex;

use rand::{rngs::OsRng, Rng};

/// A source of `u32` draws the manager uses for its probabilistic branches.
pub trait RandomSource: Send + Sync {
    /// Draw a pseudo-random value in `[0, bound)`.
    fn next_below(&self, bound: u32) -> u32;
}

/// The production source: the OS CSPRNG.
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn next_below(&self, bound: u32) -> u32 {
        OsRng.gen_range(0..bound)
    }
}

/// A fixed-sequence source for tests: cycles through a caller-supplied list
/// of draws, so a test can force or suppress a probabilistic branch without
/// looping until it happens to fire.
pub struct FixedRandomSource {
    draws: Mutex<(Vec<u32>, usize)>,
}

impl FixedRandomSource {
    pub fn new(draws: Vec<u32>) -> Self {
        Self { draws: Mutex::new((draws, 0)) }
    }

    /// Always returns `0`, i.e. always satisfies a `next_below(N) == 0` probabilistic check.
    pub fn always_fire() -> Self {
        Self::new(vec![0])
    }

    /// Never satisfies a `next_below(N) == 0` check (as long as `bound > 1`).
    pub fn never_fire() -> Self {
        Self::new(vec![1])
    }
}

impl RandomSource for FixedRandomSource {
    fn next_below(&self, bound: u32) -> u32 {
        let mut guard = self.draws.lock().unwrap();
        let (draws, idx) = &mut *guard;
        let v = draws[*idx % draws.len()];
        *idx += 1;
        v % bound.max(1)
    }
}
