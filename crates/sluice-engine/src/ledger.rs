//! Cycle ledger: signed balance deltas bucketed by fixed-length time cycles.
//!
//! Pure bookkeeping with no policy. Each (account, asset, cycle) holds a
//! [`CycleDelta`] pair: `this_cycle` applies within that cycle, `next_cycle`
//! adjusts the running accumulator from the following cycle on. Walking
//! cycles in order with
//!
//! ```text
//! acc += delta.this_cycle; matured += acc; acc += delta.next_cycle;
//! ```
//!
//! reconstructs exactly the amount matured in any span, no matter how many
//! separate stream registrations contributed, and stays exact under any
//! chunking because draining rolls the final accumulator forward into the
//! first unconsumed cycle.
//!
//! Entries are created lazily and removed once drained or cancelled out;
//! a missing entry is equivalent to a zero one.

use std::collections::{BTreeMap, HashMap};

use sluice_core::constants::AMT_PER_SEC_MULTIPLIER;
use sluice_core::types::{AccountId, AssetId};

/// Delta pair for one (account, asset, cycle).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleDelta {
    /// Amount delta effective within this cycle.
    pub this_cycle: i128,
    /// Accumulator adjustment effective from the next cycle on.
    pub next_cycle: i128,
}

/// Per-(account, asset) cycle-bucketed delta table.
#[derive(Clone, Debug)]
pub struct CycleLedger {
    cycle_secs: u64,
    entries: HashMap<(AccountId, AssetId), BTreeMap<u64, CycleDelta>>,
}

impl CycleLedger {
    /// Create an empty ledger with the given cycle length.
    pub fn new(cycle_secs: u64) -> Self {
        Self { cycle_secs, entries: HashMap::new() }
    }

    pub fn cycle_secs(&self) -> u64 {
        self.cycle_secs
    }

    /// Register a stream of `amt_per_sec` (signed, fixed-point) over
    /// `[start, end)` for one receiver.
    ///
    /// Writing the negated rate over the same range cancels a previous
    /// registration exactly; both endpoints floor identically.
    pub fn add_delta_range(
        &mut self,
        account: AccountId,
        asset: AssetId,
        start: u64,
        end: u64,
        amt_per_sec: i128,
    ) {
        if start == end || amt_per_sec == 0 {
            return;
        }
        let map = self.entries.entry((account, asset)).or_default();
        Self::add_delta(map, self.cycle_secs, start, amt_per_sec);
        Self::add_delta(map, self.cycle_secs, end, -amt_per_sec);
        if map.is_empty() {
            self.entries.remove(&(account, asset));
        }
    }

    /// Add a plain amount to one cycle's `this_cycle` delta.
    ///
    /// Used to roll a drain's final accumulator into the first unconsumed
    /// cycle.
    pub fn add_to_cycle(&mut self, account: AccountId, asset: AssetId, cycle: u64, amt: i128) {
        if amt == 0 {
            return;
        }
        let map = self.entries.entry((account, asset)).or_default();
        let delta = map.entry(cycle).or_default();
        delta.this_cycle += amt;
        if *delta == CycleDelta::default() {
            map.remove(&cycle);
        }
        if map.is_empty() {
            self.entries.remove(&(account, asset));
        }
    }

    /// Apply one stream endpoint at `timestamp`.
    ///
    /// Splits the rate's effect into a full-cycle amount and the portion
    /// belonging to the part of the cycle before `timestamp`; the split
    /// telescopes with the matching endpoint of the range so that each
    /// cycle matures exactly its cycle-aligned floored amount.
    fn add_delta(
        map: &mut BTreeMap<u64, CycleDelta>,
        cycle_secs: u64,
        timestamp: u64,
        amt_per_sec: i128,
    ) {
        let multiplier = AMT_PER_SEC_MULTIPLIER as i128;
        let cycle = timestamp / cycle_secs;
        let full_cycle = cycle_secs as i128 * amt_per_sec / multiplier;
        let next_cycle = (timestamp % cycle_secs) as i128 * amt_per_sec / multiplier;
        let delta = map.entry(cycle).or_default();
        delta.this_cycle += full_cycle - next_cycle;
        delta.next_cycle += next_cycle;
        if *delta == CycleDelta::default() {
            map.remove(&cycle);
        }
    }

    /// Amount matured over cycles `[from, to)` plus the accumulator value
    /// carried past `to`. Read-only companion of [`drain`](Self::drain).
    pub fn matured(&self, account: AccountId, asset: AssetId, from: u64, to: u64) -> (i128, i128) {
        match self.entries.get(&(account, asset)) {
            Some(map) => Self::accumulate(map, from, to),
            None => (0, 0),
        }
    }

    /// Consume cycles `[from, to)`: returns the matured amount, removes the
    /// consumed entries, and rolls the final accumulator into cycle `to` so
    /// later drains continue exactly where this one stopped.
    pub fn drain(&mut self, account: AccountId, asset: AssetId, from: u64, to: u64) -> i128 {
        let Some(map) = self.entries.get_mut(&(account, asset)) else {
            return 0;
        };
        let (amt, acc) = Self::accumulate(map, from, to);
        let consumed: Vec<u64> = map.range(from..to).map(|(&cycle, _)| cycle).collect();
        for cycle in consumed {
            map.remove(&cycle);
        }
        if map.is_empty() {
            self.entries.remove(&(account, asset));
        }
        self.add_to_cycle(account, asset, to, acc);
        amt
    }

    /// Walk `[from, to)` accumulating matured amounts.
    ///
    /// Sparse-friendly: between stored entries the accumulator is constant,
    /// so gaps contribute `acc * gap_len` in one step. All sums are real
    /// matured amounts bounded by the per-asset balance cap, far inside the
    /// i128 range.
    fn accumulate(map: &BTreeMap<u64, CycleDelta>, from: u64, to: u64) -> (i128, i128) {
        let mut acc: i128 = 0;
        let mut amt: i128 = 0;
        let mut pos = from;
        for (&cycle, delta) in map.range(from..to) {
            amt += acc * (cycle - pos) as i128;
            acc += delta.this_cycle;
            amt += acc;
            acc += delta.next_cycle;
            pos = cycle + 1;
        }
        amt += acc * (to - pos) as i128;
        (amt, acc)
    }

    /// Last cycle holding a non-zero delta, if any.
    pub fn last_cycle(&self, account: AccountId, asset: AssetId) -> Option<u64> {
        self.entries
            .get(&(account, asset))
            .and_then(|map| map.keys().next_back().copied())
    }

    /// Number of stored (non-zero) delta entries for one account and asset.
    pub fn entry_count(&self, account: AccountId, asset: AssetId) -> usize {
        self.entries.get(&(account, asset)).map_or(0, BTreeMap::len)
    }
}
