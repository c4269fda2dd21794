//! Pure streaming accrual math.
//!
//! Everything here is a deterministic function of its arguments; the engine
//! crate owns the state and calls in. Amounts mature with *cycle-aligned*
//! flooring: the amount streamed over `[start, end)` is computed as
//!
//! ```text
//! ended_cycles * floor(cycle_secs * rate / M)
//!     + floor((end % cycle_secs) * rate / M)
//!     - floor((start % cycle_secs) * rate / M)
//! ```
//!
//! which telescopes exactly with the per-cycle delta pairs the cycle ledger
//! stores. A naive `floor((end - start) * rate / M)` would disagree with the
//! cycle-bucketed maturation by ±1 unit and leak value over time.

use crate::constants::{AMT_PER_SEC_MULTIPLIER, MAX_TIMESTAMP};
use crate::error::StreamsError;
use crate::types::StreamReceiver;

/// The cycle containing `timestamp`.
pub fn cycle_of(timestamp: u64, cycle_secs: u64) -> u64 {
    timestamp / cycle_secs
}

/// The first second of the cycle containing `timestamp`.
pub fn cycle_start(timestamp: u64, cycle_secs: u64) -> u64 {
    timestamp - timestamp % cycle_secs
}

/// Amount streamed at `amt_per_sec` over `[start, end)`, in asset units.
///
/// `start <= end` is required. All intermediate products fit in a u128:
/// timestamps are bounded by `MAX_TIMESTAMP` (2^35) and rates by
/// `MAX_AMT_PER_SEC` (2^92), so `timestamp * rate < 2^127`.
pub fn streamed_amt(amt_per_sec: u128, start: u64, end: u64, cycle_secs: u64) -> u128 {
    debug_assert!(start <= end);
    let ended_cycles = (end / cycle_secs - start / cycle_secs) as u128;
    let amt_per_cycle = cycle_secs as u128 * amt_per_sec / AMT_PER_SEC_MULTIPLIER;
    let amt_end = (end % cycle_secs) as u128 * amt_per_sec / AMT_PER_SEC_MULTIPLIER;
    let amt_start = (start % cycle_secs) as u128 * amt_per_sec / AMT_PER_SEC_MULTIPLIER;
    ended_cycles * amt_per_cycle + amt_end - amt_start
}

/// The effective streaming window of one receiver, clipped to
/// `[start_cap, end_cap]`.
///
/// `apply_time` resolves a zero `config.start` ("starts when applied") and
/// anchors the duration; `max_end` caps the window at the funded horizon.
/// Returns an empty window as `(t, t)`.
pub fn stream_range(
    receiver: &StreamReceiver,
    apply_time: u64,
    max_end: u64,
    start_cap: u64,
    end_cap: u64,
) -> (u64, u64) {
    let config = &receiver.config;
    let start = if config.start == 0 { apply_time } else { config.start };
    let mut end = if config.duration == 0 {
        max_end
    } else {
        start.saturating_add(config.duration).min(MAX_TIMESTAMP)
    };
    end = end.min(max_end).min(end_cap);
    let start = start.max(start_cap);
    if end < start {
        (start, start)
    } else {
        (start, end)
    }
}

/// Unstreamed balance remaining at time `at`.
///
/// `balance` and `receivers` describe the state as of `update_time` with the
/// funded horizon `max_end`. Streaming halts at `max_end`, so `at` past the
/// horizon returns the terminal residue.
///
/// # Errors
///
/// - [`StreamsError::TimestampInPast`] if `at` precedes `update_time`
/// - [`StreamsError::ArithmeticOverflow`] if the receivers would consume
///   more than `balance` — impossible for a `max_end` computed by
///   [`calc_max_end`], so it indicates inconsistent inputs
pub fn remaining_balance(
    balance: u128,
    receivers: &[StreamReceiver],
    update_time: u64,
    max_end: u64,
    at: u64,
    cycle_secs: u64,
) -> Result<u128, StreamsError> {
    if at < update_time {
        return Err(StreamsError::TimestampInPast { timestamp: at, update_time });
    }
    let mut remaining = balance;
    for receiver in receivers {
        if receiver.config.amt_per_sec == 0 {
            continue;
        }
        let (start, end) = stream_range(receiver, update_time, max_end, update_time, at);
        let streamed = streamed_amt(receiver.config.amt_per_sec, start, end, cycle_secs);
        remaining = remaining
            .checked_sub(streamed)
            .ok_or(StreamsError::ArithmeticOverflow)?;
    }
    Ok(remaining)
}

/// Whether `balance` covers all receivers' streaming up to `end`.
fn is_balance_enough(
    balance: u128,
    receivers: &[StreamReceiver],
    apply_time: u64,
    end: u64,
    cycle_secs: u64,
) -> bool {
    let mut spent: u128 = 0;
    for receiver in receivers {
        if receiver.config.amt_per_sec == 0 {
            continue;
        }
        let (start, clipped_end) = stream_range(receiver, apply_time, end, apply_time, end);
        spent += streamed_amt(receiver.config.amt_per_sec, start, clipped_end, cycle_secs);
        if spent > balance {
            return false;
        }
    }
    true
}

/// Latest timestamp up to which `balance` fully funds `receivers`.
///
/// Binary search over `[apply_time, MAX_TIMESTAMP]` for the greatest `T`
/// where the funding constraint holds; returns [`MAX_TIMESTAMP`] when the
/// configuration never exhausts the balance (no active receivers, or all
/// windows end early enough). `hints` are optional candidate end times that
/// pre-narrow the search; wrong hints cost extra evaluations but never
/// change the result.
pub fn calc_max_end(
    balance: u128,
    receivers: &[StreamReceiver],
    apply_time: u64,
    hints: &[u64],
    cycle_secs: u64,
) -> u64 {
    let mut lo = apply_time;
    let mut hi = MAX_TIMESTAMP;
    if is_balance_enough(balance, receivers, apply_time, hi, cycle_secs) {
        return hi;
    }
    for &hint in hints {
        if hint > lo && hint < hi {
            if is_balance_enough(balance, receivers, apply_time, hint, cycle_secs) {
                lo = hint;
            } else {
                hi = hint - 1;
            }
        }
    }
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if is_balance_enough(balance, receivers, apply_time, mid, cycle_secs) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamConfig;
    use proptest::prelude::*;

    const M: u128 = AMT_PER_SEC_MULTIPLIER;

    fn recv(rate_units_per_sec: u128) -> StreamReceiver {
        StreamReceiver::new(1, rate_units_per_sec * M)
    }

    fn recv_windowed(rate: u128, start: u64, duration: u64) -> StreamReceiver {
        StreamReceiver {
            account_id: 1,
            config: StreamConfig { stream_id: 0, amt_per_sec: rate * M, start, duration },
        }
    }

    // --- cycles ---

    #[test]
    fn cycle_helpers() {
        assert_eq!(cycle_of(0, 10), 0);
        assert_eq!(cycle_of(9, 10), 0);
        assert_eq!(cycle_of(10, 10), 1);
        assert_eq!(cycle_start(27, 10), 20);
        assert_eq!(cycle_start(30, 10), 30);
    }

    // --- streamed_amt ---

    #[test]
    fn whole_unit_rate_streams_per_second() {
        assert_eq!(streamed_amt(M, 0, 50, 10), 50);
        assert_eq!(streamed_amt(2 * M, 5, 15, 10), 20);
        assert_eq!(streamed_amt(M, 7, 7, 10), 0);
    }

    #[test]
    fn fractional_rate_floors_per_cycle_boundary() {
        // 1.5 units/sec, cycle of 10s: each full cycle matures exactly 15.
        let rate = 3 * M / 2;
        assert_eq!(streamed_amt(rate, 0, 10, 10), 15);
        assert_eq!(streamed_amt(rate, 0, 1, 10), 1);
        assert_eq!(streamed_amt(rate, 1, 2, 10), 2); // floor(3.0) - floor(1.5)
    }

    #[test]
    fn sub_cycle_rate_matures_only_at_boundaries() {
        // 0.1 units/sec with a 10s cycle: one unit per cycle, nothing between.
        let rate = M / 10;
        assert_eq!(streamed_amt(rate, 0, 9, 10), 0);
        assert_eq!(streamed_amt(rate, 0, 10, 10), 1);
        assert_eq!(streamed_amt(rate, 3, 23, 10), 2);
    }

    #[test]
    fn streamed_amt_splits_exactly_at_any_point() {
        let rate = 7 * M / 3;
        for split in [0, 1, 9, 10, 11, 25, 40] {
            let whole = streamed_amt(rate, 0, 40, 10);
            let parts = streamed_amt(rate, 0, split, 10) + streamed_amt(rate, split, 40, 10);
            assert_eq!(whole, parts, "split at {split}");
        }
    }

    proptest! {
        #[test]
        fn prop_streamed_amt_additive(
            rate in 1u128..10_000_000_000u128,
            a in 0u64..100_000,
            len1 in 0u64..100_000,
            len2 in 0u64..100_000,
            cycle_secs in 2u64..1000,
        ) {
            let b = a + len1;
            let c = b + len2;
            let whole = streamed_amt(rate, a, c, cycle_secs);
            let parts = streamed_amt(rate, a, b, cycle_secs) + streamed_amt(rate, b, c, cycle_secs);
            prop_assert_eq!(whole, parts);
        }

        #[test]
        fn prop_streamed_amt_bounded_by_exact_product(
            rate in 1u128..10_000_000_000u128,
            start in 0u64..100_000,
            len in 0u64..100_000,
            cycle_secs in 2u64..1000,
        ) {
            let end = start + len;
            let amt = streamed_amt(rate, start, end, cycle_secs);
            let exact = len as u128 * rate / M;
            let cycles_spanned = (end / cycle_secs - start / cycle_secs) as u128;
            // Flooring never over-pays, and under-pays at most one unit per
            // cycle boundary crossed (the min-rate bound keeps this small
            // relative to the per-cycle amount).
            prop_assert!(amt <= exact + 1);
            prop_assert!(amt + cycles_spanned + 1 >= exact);
        }
    }

    // --- stream_range ---

    #[test]
    fn default_window_runs_from_apply_to_max_end() {
        let r = recv(1);
        assert_eq!(stream_range(&r, 100, 500, 100, u64::MAX), (100, 500));
    }

    #[test]
    fn explicit_start_and_duration() {
        let r = recv_windowed(1, 200, 50);
        assert_eq!(stream_range(&r, 100, 500, 100, u64::MAX), (200, 250));
    }

    #[test]
    fn window_clipped_by_caps() {
        let r = recv_windowed(1, 200, 50);
        // Start cap moved past the configured start.
        assert_eq!(stream_range(&r, 100, 500, 220, u64::MAX), (220, 250));
        // End cap before the configured end.
        assert_eq!(stream_range(&r, 100, 500, 100, 230), (200, 230));
    }

    #[test]
    fn window_clipped_by_max_end() {
        let r = recv_windowed(1, 200, 1000);
        assert_eq!(stream_range(&r, 100, 500, 100, u64::MAX), (200, 500));
    }

    #[test]
    fn past_window_is_empty() {
        let r = recv_windowed(1, 10, 20);
        let (s, e) = stream_range(&r, 100, 500, 100, u64::MAX);
        assert_eq!(s, e);
    }

    // --- remaining_balance ---

    #[test]
    fn remaining_balance_linear_drain() {
        let receivers = vec![recv(1)];
        assert_eq!(remaining_balance(100, &receivers, 0, 100, 0, 10).unwrap(), 100);
        assert_eq!(remaining_balance(100, &receivers, 0, 100, 50, 10).unwrap(), 50);
        assert_eq!(remaining_balance(100, &receivers, 0, 100, 100, 10).unwrap(), 0);
    }

    #[test]
    fn remaining_balance_stops_at_max_end() {
        let receivers = vec![recv(1)];
        assert_eq!(remaining_balance(100, &receivers, 0, 100, 5000, 10).unwrap(), 0);
    }

    #[test]
    fn remaining_balance_rejects_past_timestamp() {
        let receivers = vec![recv(1)];
        assert_eq!(
            remaining_balance(100, &receivers, 50, 100, 49, 10),
            Err(StreamsError::TimestampInPast { timestamp: 49, update_time: 50 }),
        );
    }

    #[test]
    fn remaining_balance_ignores_zero_rate_slots() {
        let receivers = vec![StreamReceiver::new(1, 0)];
        assert_eq!(remaining_balance(100, &receivers, 0, MAX_TIMESTAMP, 1000, 10).unwrap(), 100);
    }

    #[test]
    fn remaining_balance_multiple_receivers() {
        let mut receivers = vec![recv(1), recv(2)];
        receivers[1].account_id = 2;
        // 3 units/sec combined; max_end = 33 (99 of 100 spent).
        assert_eq!(remaining_balance(100, &receivers, 0, 33, 20, 10).unwrap(), 40);
    }

    // --- calc_max_end ---

    #[test]
    fn max_end_exact_division() {
        let receivers = vec![recv(1)];
        assert_eq!(calc_max_end(100, &receivers, 0, &[], 10), 100);
    }

    #[test]
    fn max_end_funding_violated_one_second_later() {
        let receivers = vec![recv(3)];
        let max_end = calc_max_end(100, &receivers, 0, &[], 10);
        assert!(is_balance_enough(100, &receivers, 0, max_end, 10));
        assert!(!is_balance_enough(100, &receivers, 0, max_end + 1, 10));
    }

    #[test]
    fn max_end_forever_without_active_receivers() {
        assert_eq!(calc_max_end(100, &[], 0, &[], 10), MAX_TIMESTAMP);
        let inert = vec![StreamReceiver::new(1, 0)];
        assert_eq!(calc_max_end(100, &inert, 0, &[], 10), MAX_TIMESTAMP);
    }

    #[test]
    fn max_end_forever_when_windows_leave_funds() {
        // 50 units over a fixed 50s window, balance 100: never exhausted.
        let receivers = vec![recv_windowed(1, 0, 50)];
        assert_eq!(calc_max_end(100, &receivers, 0, &[], 10), MAX_TIMESTAMP);
    }

    #[test]
    fn max_end_with_future_start() {
        // Stream starts at t=100; balance funds 60 seconds of streaming.
        let receivers = vec![recv_windowed(1, 100, 0)];
        assert_eq!(calc_max_end(60, &receivers, 0, &[], 10), 160);
    }

    #[test]
    fn max_end_zero_balance() {
        let receivers = vec![recv(1)];
        // Nothing funded: the horizon is the apply time itself.
        assert_eq!(calc_max_end(0, &receivers, 0, &[], 10), 0);
    }

    #[test]
    fn max_end_hints_do_not_change_result() {
        let receivers = vec![recv(3)];
        let plain = calc_max_end(1000, &receivers, 7, &[], 10);
        for hints in [&[0u64][..], &[plain], &[plain + 100], &[1, plain, u64::MAX]] {
            assert_eq!(calc_max_end(1000, &receivers, 7, hints, 10), plain);
        }
    }

    proptest! {
        #[test]
        fn prop_max_end_is_the_funding_boundary(
            balance in 0u128..1_000_000,
            rate1 in 1u128..1000,
            rate2 in 1u128..1000,
            cycle_secs in 2u64..100,
        ) {
            let mut receivers = vec![recv(rate1), recv(rate2)];
            receivers[1].account_id = 2;
            let max_end = calc_max_end(balance, &receivers, 0, &[], cycle_secs);
            prop_assert!(is_balance_enough(balance, &receivers, 0, max_end, cycle_secs));
            if max_end < MAX_TIMESTAMP {
                prop_assert!(!is_balance_enough(balance, &receivers, 0, max_end + 1, cycle_secs));
            }
        }
    }
}
