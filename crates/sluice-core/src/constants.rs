//! Protocol constants. Amounts are in base asset units; streaming rates are
//! fixed-point units-per-second scaled by [`AMT_PER_SEC_MULTIPLIER`].

/// Fixed-point scale for per-second streaming rates.
///
/// A rate of `AMT_PER_SEC_MULTIPLIER` streams exactly one asset unit per
/// second. Sub-unit rates stay representable down to one unit per cycle.
pub const AMT_PER_SEC_MULTIPLIER: u128 = 1_000_000_000;

/// Total weight a split configuration distributes.
///
/// A receiver with weight `w` gets `w / TOTAL_SPLITS_WEIGHT` of every split
/// amount; the undistributed share stays with the splitting account.
pub const TOTAL_SPLITS_WEIGHT: u32 = 1_000_000;

/// Maximum number of receivers in one stream configuration.
pub const MAX_STREAM_RECEIVERS: usize = 100;

/// Maximum number of receivers in one split configuration.
pub const MAX_SPLITS_RECEIVERS: usize = 200;

/// Upper bound for every timestamp accepted by the engine, and the sentinel
/// meaning "funded forever" when used as a `max_end`.
///
/// 2^35 seconds is roughly the year 3058. Keeping timestamps below this
/// bound guarantees that every `timestamp * rate` product fits in a u128
/// (see [`MAX_AMT_PER_SEC`]).
pub const MAX_TIMESTAMP: u64 = 1 << 35;

/// Maximum per-second streaming rate (fixed-point).
///
/// `MAX_TIMESTAMP * MAX_AMT_PER_SEC` is just under `i128::MAX`, so accrual
/// products never overflow the signed 128-bit delta domain.
pub const MAX_AMT_PER_SEC: u128 = 1 << 92;

/// Maximum total funds registered per asset across the whole ledger.
///
/// `MAX_TOTAL_BALANCE * AMT_PER_SEC_MULTIPLIER` fits in a u128, so any
/// settled amount can be re-expressed as a one-second fixed-point rate
/// (the squeeze cancellation path relies on this).
pub const MAX_TOTAL_BALANCE: u128 = (1 << 96) - 1;

/// Default cycle length: one week.
pub const DEFAULT_CYCLE_SECS: u64 = 604_800;

/// Lowest non-zero per-second rate accepted for a given cycle length.
///
/// Chosen so every active stream matures at least one unit per cycle,
/// bounding the relative precision loss of integer division.
pub const fn min_amt_per_sec(cycle_secs: u64) -> u128 {
    AMT_PER_SEC_MULTIPLIER.div_ceil(cycle_secs as u128)
}
