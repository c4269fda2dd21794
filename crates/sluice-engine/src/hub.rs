//! Hub facade: the single entry point collaborators hold.
//!
//! Composes the streaming and splitting engines, routes received and
//! squeezed funds into the splittable pool, and tracks the per-asset total
//! of all funds registered in the ledger. The total is capped at
//! [`MAX_TOTAL_BALANCE`] on every entry path (stream top-ups and gives), so
//! no internal transfer can ever overflow the numeric domain.
//!
//! The hub decides nothing about identity: callers are trusted to have
//! verified, through their driver layer, that the operating account may be
//! mutated, and to move the underlying asset for every top-up, withdrawal,
//! give, and collect.

use std::collections::HashMap;

use tracing::debug;

use sluice_core::commitment::{self, Commitment};
use sluice_core::constants::MAX_TOTAL_BALANCE;
use sluice_core::error::{SluiceError, SplitsError, StreamsError};
use sluice_core::types::{
    AccountId, AssetId, SplitsReceiver, StreamReceiver, StreamsHistoryEntry,
};

use crate::splits::Splits;
use crate::streams::{Streams, StreamsStateView};

/// The Sluice ledger facade.
#[derive(Clone, Debug)]
pub struct Hub {
    streams: Streams,
    splits: Splits,
    total_balances: HashMap<AssetId, u128>,
}

impl Hub {
    /// Create a ledger with the given cycle length (must exceed 1 second).
    pub fn new(cycle_secs: u64) -> Self {
        Self {
            streams: Streams::new(cycle_secs),
            splits: Splits::new(),
            total_balances: HashMap::new(),
        }
    }

    // --- read-only constants ---

    pub fn cycle_secs(&self) -> u64 {
        self.streams.cycle_secs()
    }

    pub fn min_amt_per_sec(&self) -> u128 {
        self.streams.min_amt_per_sec()
    }

    /// Total funds currently registered in the ledger for one asset.
    pub fn total_balance(&self, asset: AssetId) -> u128 {
        self.total_balances.get(&asset).copied().unwrap_or(0)
    }

    // --- streaming ---

    /// See [`Streams::set_streams`]. Additionally enforces the per-asset
    /// total-balance cap on top-ups and keeps the asset total current.
    #[allow(clippy::too_many_arguments)]
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
        if balance_delta > 0 {
            let added = balance_delta as u128;
            if self.increased_total(asset, added).is_none() {
                return Err(StreamsError::BalanceTooHigh {
                    got: self.total_balance(asset).saturating_add(added),
                    max: MAX_TOTAL_BALANCE,
                });
            }
        }
        let real_delta = self.streams.set_streams(
            account,
            asset,
            curr_receivers,
            balance_delta,
            new_receivers,
            max_end_hints,
            now,
        )?;
        let total = self.total_balances.entry(asset).or_insert(0);
        if real_delta >= 0 {
            *total += real_delta as u128;
        } else {
            // Withdrawals never exceed the tracked total.
            *total = total.saturating_sub(real_delta.unsigned_abs());
        }
        Ok(real_delta)
    }

    /// See [`Streams::balance_at`].
    pub fn balance_at(
        &self,
        account: AccountId,
        asset: AssetId,
        receivers: &[StreamReceiver],
        timestamp: u64,
    ) -> Result<u128, StreamsError> {
        self.streams.balance_at(account, asset, receivers, timestamp)
    }

    /// See [`Streams::streams_state`].
    pub fn streams_state(&self, account: AccountId, asset: AssetId) -> StreamsStateView {
        self.streams.streams_state(account, asset)
    }

    /// Drain matured cycles into the account's splittable pool.
    pub fn receive_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u64,
        now: u64,
    ) -> Result<u128, SluiceError> {
        let amt = self.streams.receive_streams(account, asset, max_cycles, now);
        if amt > 0 {
            self.splits.add_splittable(account, asset, amt)?;
        }
        Ok(amt)
    }

    /// See [`Streams::receive_streams_result`].
    pub fn receive_streams_result(
        &self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u64,
        now: u64,
    ) -> (u128, u64) {
        self.streams.receive_streams_result(account, asset, max_cycles, now)
    }

    /// See [`Streams::receivable_cycles`].
    pub fn receivable_cycles(&self, account: AccountId, asset: AssetId, now: u64) -> u64 {
        self.streams.receivable_cycles(account, asset, now)
    }

    /// Claim current-cycle funds from one sender into the splittable pool.
    pub fn squeeze_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        history_root: Commitment,
        history: &[StreamsHistoryEntry],
        now: u64,
    ) -> Result<u128, SluiceError> {
        let amt =
            self.streams.squeeze_streams(account, asset, sender, history_root, history, now)?;
        if amt > 0 {
            self.splits.add_splittable(account, asset, amt)?;
        }
        Ok(amt)
    }

    /// Commitment to a stream-receiver list.
    pub fn hash_streams(receivers: &[StreamReceiver]) -> Commitment {
        commitment::streams_hash(receivers)
    }

    // --- splitting ---

    /// Add `amt` directly to `to`'s splittable pool, given by `from`. The
    /// caller has already moved the underlying asset in; `from` is recorded
    /// for observability only.
    pub fn give(
        &mut self,
        from: AccountId,
        to: AccountId,
        asset: AssetId,
        amt: u128,
    ) -> Result<(), SplitsError> {
        let Some(new_total) = self.increased_total(asset, amt) else {
            return Err(SplitsError::AmountTooLarge { got: amt, max: MAX_TOTAL_BALANCE });
        };
        self.splits.add_splittable(to, asset, amt)?;
        self.total_balances.insert(asset, new_total);
        debug!(from, to, asset, amt = %amt, "funds given");
        Ok(())
    }

    /// See [`Splits::set_splits`].
    pub fn set_splits(
        &mut self,
        account: AccountId,
        curr_receivers: &[SplitsReceiver],
        new_receivers: &[SplitsReceiver],
    ) -> Result<(), SplitsError> {
        self.splits.set_splits(account, curr_receivers, new_receivers)
    }

    /// See [`Splits::split`].
    pub fn split(
        &mut self,
        account: AccountId,
        asset: AssetId,
        curr_receivers: &[SplitsReceiver],
    ) -> Result<(u128, u128), SplitsError> {
        self.splits.split(account, asset, curr_receivers)
    }

    /// See [`Splits::split_result`].
    pub fn split_result(
        &self,
        account: AccountId,
        curr_receivers: &[SplitsReceiver],
        amount: u128,
    ) -> Result<(u128, u128), SplitsError> {
        self.splits.split_result(account, curr_receivers, amount)
    }

    /// Withdraw collectable funds; the caller moves the asset out.
    pub fn collect(&mut self, account: AccountId, asset: AssetId) -> u128 {
        let amt = self.splits.collect(account, asset);
        if amt > 0 {
            let total = self.total_balances.entry(asset).or_insert(0);
            *total = total.saturating_sub(amt);
        }
        amt
    }

    pub fn splittable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.splits.splittable(account, asset)
    }

    pub fn collectable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.splits.collectable(account, asset)
    }

    pub fn splits_hash_of(&self, account: AccountId) -> Commitment {
        self.splits.splits_hash_of(account)
    }

    /// Commitment to a split-receiver list.
    pub fn hash_splits(receivers: &[SplitsReceiver]) -> Commitment {
        commitment::splits_hash(receivers)
    }

    fn increased_total(&self, asset: AssetId, amt: u128) -> Option<u128> {
        self.total_balance(asset).checked_add(amt).filter(|total| *total <= MAX_TOTAL_BALANCE)
    }
}
