//! Shared test helpers: hub builders and receiver-list constructors.

use sluice_core::constants::{AMT_PER_SEC_MULTIPLIER, TOTAL_SPLITS_WEIGHT};
use sluice_core::types::{AccountId, SplitsReceiver, StreamConfig, StreamReceiver};
use sluice_engine::Hub;

pub const ASSET: u64 = 1;
pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CAROL: AccountId = 3;
pub const DAVE: AccountId = 4;

/// A hub with short ten-second cycles, convenient for scenario timing.
pub fn hub() -> Hub {
    Hub::new(10)
}

/// Stream receiver at a whole-unit per-second rate, open-ended.
pub fn stream_to(account: AccountId, units_per_sec: u128) -> StreamReceiver {
    StreamReceiver::new(account, units_per_sec * AMT_PER_SEC_MULTIPLIER)
}

/// Stream receiver with an explicit window.
pub fn stream_windowed(
    account: AccountId,
    units_per_sec: u128,
    start: u64,
    duration: u64,
) -> StreamReceiver {
    StreamReceiver {
        account_id: account,
        config: StreamConfig {
            stream_id: 0,
            amt_per_sec: units_per_sec * AMT_PER_SEC_MULTIPLIER,
            start,
            duration,
        },
    }
}

/// Split receiver with a weight given as a percentage of the total.
pub fn split_pct(account: AccountId, percent: u32) -> SplitsReceiver {
    SplitsReceiver::new(account, TOTAL_SPLITS_WEIGHT / 100 * percent)
}
