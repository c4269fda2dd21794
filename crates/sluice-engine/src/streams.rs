//! Streaming engine: reconciles stream configurations into the cycle ledger.
//!
//! One [`StreamsState`] per (account, asset) holds the sender-side scalars
//! (balance, update time, receivers commitment, funded horizon, history
//! root) and the receiver-side cursors (next receivable cycle, squeeze
//! markers). Receiver lists themselves are never stored; every mutation
//! resupplies the current list and proves it against the commitment.
//!
//! All operations take an explicit `now`. Time must be monotone per
//! (account, asset); the engine holds no clock.

use std::collections::HashMap;

use tracing::debug;

use sluice_core::accrual::{
    calc_max_end, cycle_of, cycle_start, remaining_balance, stream_range, streamed_amt,
};
use sluice_core::commitment::{history_hash, streams_hash, verify_streams, Commitment};
use sluice_core::constants::{
    min_amt_per_sec, AMT_PER_SEC_MULTIPLIER, MAX_TIMESTAMP, MAX_TOTAL_BALANCE,
};
use sluice_core::error::StreamsError;
use sluice_core::types::{
    validate_stream_receivers, AccountId, AssetId, StreamReceiver, StreamsHistoryEntry,
};

use crate::ledger::CycleLedger;

/// Per-sender squeeze markers for one (receiver, asset, sender) triple.
///
/// Valid for one cycle only; keyed by the history entry's update time,
/// which identifies the entry within the cycle (entries sharing an update
/// time have empty coverage except the last, so the collision is harmless).
#[derive(Clone, Debug)]
struct SqueezeMarks {
    cycle: u64,
    squeezed_until: HashMap<u64, u64>,
}

/// State of one (account, asset) pair.
#[derive(Clone, Debug, Default)]
struct StreamsState {
    streams_hash: Commitment,
    history_hash: Commitment,
    update_time: u64,
    balance: u128,
    max_end: u64,
    next_receivable_cycle: Option<u64>,
    next_squeezed: HashMap<AccountId, SqueezeMarks>,
}

/// Read-only snapshot of a stream state's scalar fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamsStateView {
    pub streams_hash: Commitment,
    pub history_hash: Commitment,
    pub update_time: u64,
    pub balance: u128,
    pub max_end: u64,
}

/// The streaming engine.
#[derive(Clone, Debug)]
pub struct Streams {
    cycle_secs: u64,
    min_amt_per_sec: u128,
    states: HashMap<(AccountId, AssetId), StreamsState>,
    ledger: CycleLedger,
}

impl Streams {
    /// Create an engine with the given cycle length (must exceed 1 second).
    pub fn new(cycle_secs: u64) -> Self {
        assert!(cycle_secs > 1, "cycle length must exceed one second");
        Self {
            cycle_secs,
            min_amt_per_sec: min_amt_per_sec(cycle_secs),
            states: HashMap::new(),
            ledger: CycleLedger::new(cycle_secs),
        }
    }

    pub fn cycle_secs(&self) -> u64 {
        self.cycle_secs
    }

    /// Lowest accepted non-zero streaming rate.
    pub fn min_amt_per_sec(&self) -> u128 {
        self.min_amt_per_sec
    }

    /// Scalar state snapshot; zero-initialized for untouched accounts.
    pub fn streams_state(&self, account: AccountId, asset: AssetId) -> StreamsStateView {
        match self.states.get(&(account, asset)) {
            Some(s) => StreamsStateView {
                streams_hash: s.streams_hash,
                history_hash: s.history_hash,
                update_time: s.update_time,
                balance: s.balance,
                max_end: s.max_end,
            },
            None => StreamsStateView {
                streams_hash: Commitment::ZERO,
                history_hash: Commitment::ZERO,
                update_time: 0,
                balance: 0,
                max_end: 0,
            },
        }
    }

    /// Replace an account's stream configuration and/or move balance.
    ///
    /// Settles streaming since the last update against `curr_receivers`,
    /// applies `balance_delta` (positive = top-up, negative = withdrawal),
    /// commits `new_receivers`, recomputes the funded horizon, rewrites the
    /// cycle-ledger deltas, and extends the history chain. Returns the
    /// signed change in locked balance, which the caller uses to move the
    /// underlying asset.
    ///
    /// # Errors
    ///
    /// - [`StreamsError::StaleReceivers`] if `curr_receivers` does not hash
    ///   to the stored commitment
    /// - [`StreamsError::TimestampInPast`] / [`StreamsError::TimestampTooLarge`]
    ///   for a non-monotone or out-of-range `now`
    /// - [`StreamsError::InsufficientBalance`] if the withdrawal exceeds the
    ///   settled balance
    /// - [`StreamsError::BalanceTooHigh`] if the top-up exceeds
    ///   [`MAX_TOTAL_BALANCE`]
    /// - list validation errors for `new_receivers`
    ///
    /// No state is mutated on any error.
    pub fn set_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        curr_receivers: &[StreamReceiver],
        balance_delta: i128,
        new_receivers: &[StreamReceiver],
        max_end_hints: &[u64],
        now: u64,
    ) -> Result<i128, StreamsError> {
        if now > MAX_TIMESTAMP {
            return Err(StreamsError::TimestampTooLarge { got: now, max: MAX_TIMESTAMP });
        }
        let state = self.streams_state(account, asset);
        if !verify_streams(&state.streams_hash, curr_receivers) {
            return Err(StreamsError::StaleReceivers);
        }
        let settled = remaining_balance(
            state.balance,
            curr_receivers,
            state.update_time,
            state.max_end,
            now,
            self.cycle_secs,
        )?;
        let new_balance = if balance_delta >= 0 {
            let added = settled
                .checked_add(balance_delta as u128)
                .ok_or(StreamsError::BalanceTooHigh {
                    got: u128::MAX,
                    max: MAX_TOTAL_BALANCE,
                })?;
            if added > MAX_TOTAL_BALANCE {
                return Err(StreamsError::BalanceTooHigh { got: added, max: MAX_TOTAL_BALANCE });
            }
            added
        } else {
            let withdrawn = balance_delta.unsigned_abs();
            settled
                .checked_sub(withdrawn)
                .ok_or(StreamsError::InsufficientBalance { have: settled, need: withdrawn })?
        };
        validate_stream_receivers(new_receivers, self.min_amt_per_sec)?;
        let new_max_end =
            calc_max_end(new_balance, new_receivers, now, max_end_hints, self.cycle_secs);

        // All checks passed; everything below is infallible.
        self.update_receiver_states(
            asset,
            curr_receivers,
            state.update_time,
            state.max_end,
            new_receivers,
            now,
            new_max_end,
        );
        let new_streams_hash = streams_hash(new_receivers);
        let new_history_hash = history_hash(&state.history_hash, &new_streams_hash, now, new_max_end);
        let entry = self.states.entry((account, asset)).or_default();
        entry.streams_hash = new_streams_hash;
        entry.history_hash = new_history_hash;
        entry.update_time = now;
        entry.balance = new_balance;
        entry.max_end = new_max_end;
        debug!(
            account,
            asset,
            balance = %new_balance,
            max_end = new_max_end,
            receivers = new_receivers.len(),
            "stream configuration updated"
        );
        Ok(balance_delta)
    }

    /// Unstreamed balance at `timestamp`, a pure projection.
    ///
    /// `receivers` must match the stored commitment and `timestamp` must not
    /// precede the last update.
    pub fn balance_at(
        &self,
        account: AccountId,
        asset: AssetId,
        receivers: &[StreamReceiver],
        timestamp: u64,
    ) -> Result<u128, StreamsError> {
        if timestamp > MAX_TIMESTAMP {
            return Err(StreamsError::TimestampTooLarge { got: timestamp, max: MAX_TIMESTAMP });
        }
        let state = self.streams_state(account, asset);
        if !verify_streams(&state.streams_hash, receivers) {
            return Err(StreamsError::StaleReceivers);
        }
        remaining_balance(
            state.balance,
            receivers,
            state.update_time,
            state.max_end,
            timestamp,
            self.cycle_secs,
        )
    }

    /// Drain matured cycles into a received amount.
    ///
    /// Walks at most `max_cycles` cycles, never past the cycle containing
    /// `now` (the current cycle is still open). Idempotent until new cycles
    /// mature. The caller routes the result into the splittable pool.
    pub fn receive_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u64,
        now: u64,
    ) -> u128 {
        let Some((from, to)) = self.receivable_range(account, asset, max_cycles, now) else {
            return 0;
        };
        let amt = self.ledger.drain(account, asset, from, to);
        if let Some(state) = self.states.get_mut(&(account, asset)) {
            state.next_receivable_cycle = Some(to);
        }
        debug!(account, asset, amt = %amt, from, to, "streams received");
        // Cumulative deltas of a consistent ledger never drain negative.
        amt.max(0) as u128
    }

    /// Pure preview of [`receive_streams`]: `(amount, cycles consumed)`.
    pub fn receive_streams_result(
        &self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u64,
        now: u64,
    ) -> (u128, u64) {
        match self.receivable_range(account, asset, max_cycles, now) {
            Some((from, to)) => {
                let (amt, _) = self.ledger.matured(account, asset, from, to);
                (amt.max(0) as u128, to - from)
            }
            None => (0, 0),
        }
    }

    /// Number of matured cycles awaiting [`receive_streams`].
    pub fn receivable_cycles(&self, account: AccountId, asset: AssetId, now: u64) -> u64 {
        self.receivable_range(account, asset, u64::MAX, now)
            .map_or(0, |(from, to)| to - from)
    }

    fn receivable_range(
        &self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u64,
        now: u64,
    ) -> Option<(u64, u64)> {
        let state = self.states.get(&(account, asset))?;
        let from = state.next_receivable_cycle?;
        // Nothing past the last cycle holding a delta can mature.
        let last = self.ledger.last_cycle(account, asset)?;
        let to = cycle_of(now, self.cycle_secs)
            .min(last + 1)
            .min(from.saturating_add(max_cycles));
        if to <= from {
            return None;
        }
        Some((from, to))
    }

    /// Claim funds streamed by `sender` within the current, still-open
    /// cycle, without waiting for it to close.
    ///
    /// `history` must replay `sender`'s configuration history: starting from
    /// the chain root `history_root` (the root *before* the first supplied
    /// entry), hashing every entry must yield the sender's stored root.
    /// Only entries revealing their receiver list contribute; per-entry
    /// markers guarantee at-most-once claiming. The claimed amount is
    /// credited like a received amount and cancelled in the cycle ledger so
    /// a later [`receive_streams`] cannot count it again.
    ///
    /// # Errors
    ///
    /// - [`StreamsError::InvalidHistory`] if the replayed chain does not
    ///   match the stored root, or an entry carries both a hash and a
    ///   revealed list
    /// - [`StreamsError::TimestampInPast`] if `now` falls in a cycle the
    ///   receiver has already drained past
    pub fn squeeze_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        history_root: Commitment,
        history: &[StreamsHistoryEntry],
        now: u64,
    ) -> Result<u128, StreamsError> {
        if now > MAX_TIMESTAMP {
            return Err(StreamsError::TimestampTooLarge { got: now, max: MAX_TIMESTAMP });
        }
        let stored_root = self.streams_state(sender, asset).history_hash;
        let mut replayed = history_root;
        for entry in history {
            let entry_hash = entry.streams_commitment().ok_or(StreamsError::InvalidHistory)?;
            replayed = history_hash(&replayed, &entry_hash, entry.update_time, entry.max_end);
        }
        if replayed != stored_root {
            return Err(StreamsError::InvalidHistory);
        }

        let cycle = cycle_of(now, self.cycle_secs);
        if let Some(state) = self.states.get(&(account, asset)) {
            if let Some(next_receivable) = state.next_receivable_cycle {
                if next_receivable > cycle {
                    return Err(StreamsError::TimestampInPast {
                        timestamp: now,
                        update_time: next_receivable * self.cycle_secs,
                    });
                }
            }
        }

        let cycle_secs = self.cycle_secs;
        let current_cycle_start = cycle_start(now, cycle_secs);
        let mut amt: u128 = 0;
        {
            let state = self.states.entry((account, asset)).or_default();
            let marks = state
                .next_squeezed
                .entry(sender)
                .or_insert_with(|| SqueezeMarks { cycle, squeezed_until: HashMap::new() });
            if marks.cycle != cycle {
                marks.cycle = cycle;
                marks.squeezed_until.clear();
            }
            let mut squeeze_end = now;
            for entry in history.iter().rev() {
                if squeeze_end <= current_cycle_start {
                    break;
                }
                if !entry.receivers.is_empty() {
                    let window_start = entry.update_time.max(current_cycle_start);
                    let already =
                        marks.squeezed_until.get(&entry.update_time).copied().unwrap_or(0);
                    let start_cap = window_start.max(already);
                    if start_cap < squeeze_end {
                        amt += squeezed_amt(entry, account, start_cap, squeeze_end, cycle_secs);
                        marks.squeezed_until.insert(entry.update_time, squeeze_end);
                    }
                }
                if entry.update_time <= current_cycle_start {
                    break;
                }
                squeeze_end = squeeze_end.min(entry.update_time);
            }
            if amt > 0 {
                state.next_receivable_cycle =
                    Some(state.next_receivable_cycle.map_or(cycle, |c| c.min(cycle)));
            }
        }
        if amt > 0 {
            // Cancel the claimed amount in the open cycle: a one-second
            // negative registration whose delta pair nets to exactly -amt.
            let rate = -((amt * AMT_PER_SEC_MULTIPLIER) as i128);
            self.ledger.add_delta_range(
                account,
                asset,
                current_cycle_start,
                current_cycle_start + 1,
                rate,
            );
            debug!(account, asset, sender, amt = %amt, "streams squeezed");
        }
        Ok(amt)
    }

    /// Rewrite cycle-ledger deltas for a configuration change at `now`.
    ///
    /// Merge-join over the two sorted lists: entries only in the current
    /// list get their remaining future effect removed, entries only in the
    /// new list get registered, and entries with identical configurations
    /// get their window shifted (the common case where only the funded
    /// horizon moved).
    #[allow(clippy::too_many_arguments)]
    fn update_receiver_states(
        &mut self,
        asset: AssetId,
        curr: &[StreamReceiver],
        last_update: u64,
        curr_max_end: u64,
        new: &[StreamReceiver],
        now: u64,
        new_max_end: u64,
    ) {
        let mut i = 0;
        let mut j = 0;
        while i < curr.len() || j < new.len() {
            let pick_curr = i < curr.len() && (j >= new.len() || curr[i] <= new[j]);
            let pick_new = j < new.len() && (i >= curr.len() || new[j] <= curr[i]);
            if pick_curr && pick_new {
                let receiver = &curr[i];
                let rate = receiver.config.amt_per_sec;
                if rate != 0 {
                    let old_range =
                        stream_range(receiver, last_update, curr_max_end, now, MAX_TIMESTAMP);
                    let new_range = stream_range(receiver, now, new_max_end, now, MAX_TIMESTAMP);
                    if old_range != new_range {
                        self.ledger.add_delta_range(
                            receiver.account_id,
                            asset,
                            old_range.0,
                            old_range.1,
                            -(rate as i128),
                        );
                        self.register_range(receiver.account_id, asset, new_range, rate);
                    }
                }
                i += 1;
                j += 1;
            } else if pick_curr {
                let receiver = &curr[i];
                let rate = receiver.config.amt_per_sec;
                if rate != 0 {
                    let (start, end) =
                        stream_range(receiver, last_update, curr_max_end, now, MAX_TIMESTAMP);
                    self.ledger.add_delta_range(
                        receiver.account_id,
                        asset,
                        start,
                        end,
                        -(rate as i128),
                    );
                }
                i += 1;
            } else {
                let receiver = &new[j];
                let rate = receiver.config.amt_per_sec;
                if rate != 0 {
                    let range = stream_range(receiver, now, new_max_end, now, MAX_TIMESTAMP);
                    self.register_range(receiver.account_id, asset, range, rate);
                }
                j += 1;
            }
        }
    }

    /// Register a positive range and pull the receiver's receivable cursor
    /// back to its first cycle.
    fn register_range(
        &mut self,
        receiver: AccountId,
        asset: AssetId,
        (start, end): (u64, u64),
        amt_per_sec: u128,
    ) {
        if start == end {
            return;
        }
        self.ledger.add_delta_range(receiver, asset, start, end, amt_per_sec as i128);
        let start_cycle = cycle_of(start, self.cycle_secs);
        let state = self.states.entry((receiver, asset)).or_default();
        state.next_receivable_cycle =
            Some(state.next_receivable_cycle.map_or(start_cycle, |c| c.min(start_cycle)));
    }
}

/// Amount one history entry streamed to `account` within `[start_cap, end_cap)`.
fn squeezed_amt(
    entry: &StreamsHistoryEntry,
    account: AccountId,
    start_cap: u64,
    end_cap: u64,
    cycle_secs: u64,
) -> u128 {
    entry
        .receivers
        .iter()
        .filter(|r| r.account_id == account && r.config.amt_per_sec != 0)
        .map(|r| {
            let (start, end) =
                stream_range(r, entry.update_time, entry.max_end, start_cap, end_cap);
            streamed_amt(r.config.amt_per_sec, start, end, cycle_secs)
        })
        .sum()
}
