//! Splitting engine and collectable sink.
//!
//! Per account: a committed split-receiver list (hash only, like stream
//! receivers) and per-asset `splittable` / `collectable` counters. The
//! `split` operation distributes the splittable amount by weight using
//! floor-based cumulative differencing, which conserves every unit: the
//! shares plus the remainder always equal the input exactly.

use std::collections::HashMap;

use tracing::debug;

use sluice_core::commitment::{splits_hash, verify_splits, Commitment};
use sluice_core::constants::TOTAL_SPLITS_WEIGHT;
use sluice_core::error::SplitsError;
use sluice_core::types::{validate_splits_receivers, AccountId, AssetId, SplitsReceiver};

/// Splittable and collectable funds of one (account, asset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitsBalance {
    /// Received but not yet divided among the split receivers.
    pub splittable: u128,
    /// Fully settled, ready for withdrawal by a collaborator.
    pub collectable: u128,
}

#[derive(Clone, Debug, Default)]
struct SplitsState {
    splits_hash: Commitment,
    balances: HashMap<AssetId, SplitsBalance>,
}

/// The splitting engine.
#[derive(Clone, Debug, Default)]
pub struct Splits {
    states: HashMap<AccountId, SplitsState>,
}

/// Allocate `amount` over `receivers` by weight.
///
/// Returns each receiver's share and the total distributed. Share `i` is
/// `floor(amount * W_i / total_weight) - floor(amount * W_{i-1} / total_weight)`
/// over the running weight sums `W`, so the shares plus the undistributed
/// remainder reconstruct `amount` bit-for-bit for every input. A
/// largest-remainder scheme would differ at the margins and is deliberately
/// not used.
pub fn split_allocation(
    amount: u128,
    receivers: &[SplitsReceiver],
    total_weight: u32,
) -> (Vec<u128>, u128) {
    let mut shares = Vec::with_capacity(receivers.len());
    let mut split_amt: u128 = 0;
    let mut cum_weight: u64 = 0;
    for receiver in receivers {
        cum_weight += u64::from(receiver.weight);
        // amount is capped at 2^96 and weights at ~2^20: the product fits u128.
        let cum_amt = amount * cum_weight as u128 / total_weight as u128;
        shares.push(cum_amt - split_amt);
        split_amt = cum_amt;
    }
    (shares, split_amt)
}

impl Splits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commitment to an account's current split configuration.
    pub fn splits_hash_of(&self, account: AccountId) -> Commitment {
        self.states.get(&account).map_or(Commitment::ZERO, |s| s.splits_hash)
    }

    /// Replace an account's split configuration.
    ///
    /// `curr_receivers` must hash to the stored commitment; `new_receivers`
    /// must pass list validation. Nothing is mutated on error.
    pub fn set_splits(
        &mut self,
        account: AccountId,
        curr_receivers: &[SplitsReceiver],
        new_receivers: &[SplitsReceiver],
    ) -> Result<(), SplitsError> {
        if !verify_splits(&self.splits_hash_of(account), curr_receivers) {
            return Err(SplitsError::StaleReceivers);
        }
        validate_splits_receivers(new_receivers)?;
        self.states.entry(account).or_default().splits_hash = splits_hash(new_receivers);
        debug!(account, receivers = new_receivers.len(), "split configuration updated");
        Ok(())
    }

    /// Add funds to an account's splittable pool.
    ///
    /// The per-asset total-balance cap is enforced by the hub before funds
    /// enter the ledger, so the checked add only guards against misuse.
    pub fn add_splittable(
        &mut self,
        account: AccountId,
        asset: AssetId,
        amt: u128,
    ) -> Result<(), SplitsError> {
        let balance = self.balance_mut(account, asset);
        balance.splittable = balance
            .splittable
            .checked_add(amt)
            .ok_or(SplitsError::AmountTooLarge { got: amt, max: u128::MAX })?;
        Ok(())
    }

    pub fn splittable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.balance(account, asset).splittable
    }

    pub fn collectable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.balance(account, asset).collectable
    }

    /// Pure preview of [`split`](Self::split) for a hypothetical `amount`:
    /// `(collectable_amt, split_amt)`.
    pub fn split_result(
        &self,
        account: AccountId,
        curr_receivers: &[SplitsReceiver],
        amount: u128,
    ) -> Result<(u128, u128), SplitsError> {
        if !verify_splits(&self.splits_hash_of(account), curr_receivers) {
            return Err(SplitsError::StaleReceivers);
        }
        let (_, split_amt) = split_allocation(amount, curr_receivers, TOTAL_SPLITS_WEIGHT);
        Ok((amount - split_amt, split_amt))
    }

    /// Divide an account's splittable pool among its split receivers.
    ///
    /// Each share lands in the receiver's splittable pool; a share the
    /// account addressed to itself lands directly in its own collectable
    /// pool instead (no self-recursion). The undistributed remainder
    /// becomes collectable as well. Splitting does not recurse across
    /// accounts: forwarded funds wait for a `split` call on their account.
    ///
    /// Returns `(collectable_amt, split_amt)`: the remainder kept and the
    /// total distributed by weight.
    pub fn split(
        &mut self,
        account: AccountId,
        asset: AssetId,
        curr_receivers: &[SplitsReceiver],
    ) -> Result<(u128, u128), SplitsError> {
        if !verify_splits(&self.splits_hash_of(account), curr_receivers) {
            return Err(SplitsError::StaleReceivers);
        }
        let amount = self.splittable(account, asset);
        if amount == 0 {
            return Ok((0, 0));
        }
        let (shares, split_amt) = split_allocation(amount, curr_receivers, TOTAL_SPLITS_WEIGHT);
        let collectable_amt = amount - split_amt;

        // All funds stay within one asset, so the additions below cannot
        // overflow the per-asset total the hub caps on entry.
        let mut self_share: u128 = 0;
        for (receiver, share) in curr_receivers.iter().zip(&shares) {
            if *share == 0 {
                continue;
            }
            if receiver.account_id == account {
                self_share += *share;
            } else {
                self.balance_mut(receiver.account_id, asset).splittable += *share;
            }
        }
        let own = self.balance_mut(account, asset);
        own.splittable = 0;
        own.collectable += collectable_amt + self_share;
        debug!(
            account,
            asset,
            collectable = %collectable_amt,
            split = %split_amt,
            "splittable funds divided"
        );
        Ok((collectable_amt, split_amt))
    }

    /// Withdraw an account's collectable funds: returns the amount and
    /// zeroes the counter. The caller moves the underlying asset.
    pub fn collect(&mut self, account: AccountId, asset: AssetId) -> u128 {
        let balance = self.balance_mut(account, asset);
        let amt = balance.collectable;
        balance.collectable = 0;
        if amt > 0 {
            debug!(account, asset, amt = %amt, "collectable funds withdrawn");
        }
        amt
    }

    fn balance(&self, account: AccountId, asset: AssetId) -> SplitsBalance {
        self.states
            .get(&account)
            .and_then(|s| s.balances.get(&asset))
            .copied()
            .unwrap_or_default()
    }

    fn balance_mut(&mut self, account: AccountId, asset: AssetId) -> &mut SplitsBalance {
        self.states.entry(account).or_default().balances.entry(asset).or_default()
    }
}
