//! Ledger types: accounts, stream and split receivers, history entries.
//!
//! Amounts are u128 base units; per-second rates are fixed-point u128 scaled
//! by [`AMT_PER_SEC_MULTIPLIER`](crate::constants::AMT_PER_SEC_MULTIPLIER).
//! Receiver lists are never persisted — only their commitment is (see
//! [`commitment`](crate::commitment)) — so list validity is re-checked on
//! every mutating call.

use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_AMT_PER_SEC, MAX_SPLITS_RECEIVERS, MAX_STREAM_RECEIVERS, MAX_TIMESTAMP,
    TOTAL_SPLITS_WEIGHT,
};
use crate::error::{SplitsError, StreamsError};

/// Account identifier. Ownership and authorization are decided by an
/// external driver layer; the ledger treats the value as opaque.
pub type AccountId = u64;

/// Asset identifier. The ledger never touches the underlying asset.
pub type AssetId = u64;

/// Configuration of a single stream from a sender to one receiver.
///
/// Ordering is part of the wire contract: receiver lists must be strictly
/// sorted, and the derived order sorts by `stream_id` first so duplicate
/// `(account_id, stream_id)` pairs end up adjacent during validation.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct StreamConfig {
    /// Opaque stream identifier. Keeps otherwise-identical entries
    /// distinguishable; carries no engine semantics.
    pub stream_id: u32,
    /// Streaming rate in fixed-point units per second. Zero marks an inert
    /// placeholder slot that never streams.
    pub amt_per_sec: u128,
    /// Absolute start time. Zero means "when this configuration is applied".
    pub start: u64,
    /// Streaming duration in seconds from `start`. Zero means "until the
    /// sender's balance runs out".
    pub duration: u64,
}

/// A stream receiver: one entry of a sender's stream configuration.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct StreamReceiver {
    /// Account the stream pays into.
    pub account_id: AccountId,
    /// Rate and time window of the stream.
    pub config: StreamConfig,
}

impl StreamReceiver {
    /// Convenience constructor for an open-ended stream starting on apply.
    pub fn new(account_id: AccountId, amt_per_sec: u128) -> Self {
        Self {
            account_id,
            config: StreamConfig { stream_id: 0, amt_per_sec, start: 0, duration: 0 },
        }
    }
}

/// A split receiver: gets `weight / TOTAL_SPLITS_WEIGHT` of every split.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct SplitsReceiver {
    /// Account the share is forwarded to.
    pub account_id: AccountId,
    /// Non-zero weight; all weights in a list sum to at most
    /// [`TOTAL_SPLITS_WEIGHT`].
    pub weight: u32,
}

impl SplitsReceiver {
    pub fn new(account_id: AccountId, weight: u32) -> Self {
        Self { account_id, weight }
    }
}

/// One link of a sender's stream-configuration history.
///
/// Every `set_streams` call appends an entry to the sender's hash chain.
/// For squeezing, an entry either reveals the full receiver list or carries
/// only its commitment; an entry with both set is malformed and fails
/// history verification.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct StreamsHistoryEntry {
    /// Commitment to the receivers active after this update. Must be the
    /// zero commitment when `receivers` is revealed.
    pub streams_hash: crate::commitment::Commitment,
    /// The revealed receiver list, or empty when only the hash is supplied.
    pub receivers: Vec<StreamReceiver>,
    /// Timestamp of the `set_streams` call that created this entry.
    pub update_time: u64,
    /// Funded end time computed by that call.
    pub max_end: u64,
}

impl StreamsHistoryEntry {
    /// The commitment this entry contributes to the hash chain.
    ///
    /// Returns `None` for a malformed entry carrying both a non-zero hash
    /// and a revealed receiver list.
    pub fn streams_commitment(&self) -> Option<crate::commitment::Commitment> {
        if self.receivers.is_empty() {
            Some(self.streams_hash)
        } else if self.streams_hash.is_zero() {
            Some(crate::commitment::streams_hash(&self.receivers))
        } else {
            None
        }
    }
}

/// Validate a stream-receiver list against the wire contract.
///
/// Requires: at most [`MAX_STREAM_RECEIVERS`] entries, strictly sorted by
/// `(account_id, config)`, no duplicate `(account_id, stream_id)` pairs,
/// every non-zero rate within `[min_amt_per_sec, MAX_AMT_PER_SEC]`, and all
/// time fields within [`MAX_TIMESTAMP`].
pub fn validate_stream_receivers(
    receivers: &[StreamReceiver],
    min_amt_per_sec: u128,
) -> Result<(), StreamsError> {
    if receivers.len() > MAX_STREAM_RECEIVERS {
        return Err(StreamsError::TooManyReceivers {
            got: receivers.len(),
            max: MAX_STREAM_RECEIVERS,
        });
    }
    for (index, r) in receivers.iter().enumerate() {
        let rate = r.config.amt_per_sec;
        if rate != 0 && rate < min_amt_per_sec {
            return Err(StreamsError::RateTooLow { got: rate, min: min_amt_per_sec });
        }
        if rate > MAX_AMT_PER_SEC {
            return Err(StreamsError::RateTooHigh { got: rate, max: MAX_AMT_PER_SEC });
        }
        if r.config.start > MAX_TIMESTAMP {
            return Err(StreamsError::TimestampTooLarge { got: r.config.start, max: MAX_TIMESTAMP });
        }
        if r.config.duration > MAX_TIMESTAMP {
            return Err(StreamsError::TimestampTooLarge { got: r.config.duration, max: MAX_TIMESTAMP });
        }
        if index > 0 {
            let prev = &receivers[index - 1];
            if prev.account_id == r.account_id && prev.config.stream_id == r.config.stream_id {
                return Err(StreamsError::DuplicateStream {
                    account_id: r.account_id,
                    stream_id: r.config.stream_id,
                });
            }
            if prev >= r {
                return Err(StreamsError::UnsortedReceivers(index));
            }
        }
    }
    Ok(())
}

/// Validate a split-receiver list against the wire contract.
///
/// Requires: at most [`MAX_SPLITS_RECEIVERS`] entries, strictly sorted by
/// `account_id`, no duplicates, no zero weights, and a weight sum of at most
/// [`TOTAL_SPLITS_WEIGHT`].
pub fn validate_splits_receivers(receivers: &[SplitsReceiver]) -> Result<(), SplitsError> {
    if receivers.len() > MAX_SPLITS_RECEIVERS {
        return Err(SplitsError::TooManyReceivers {
            got: receivers.len(),
            max: MAX_SPLITS_RECEIVERS,
        });
    }
    let mut weight_sum: u64 = 0;
    for (index, r) in receivers.iter().enumerate() {
        if r.weight == 0 {
            return Err(SplitsError::ZeroWeight(index));
        }
        weight_sum += u64::from(r.weight);
        if index > 0 {
            let prev = &receivers[index - 1];
            if prev.account_id == r.account_id {
                return Err(SplitsError::DuplicateReceiver(r.account_id));
            }
            if prev.account_id > r.account_id {
                return Err(SplitsError::UnsortedReceivers(index));
            }
        }
    }
    if weight_sum > u64::from(TOTAL_SPLITS_WEIGHT) {
        return Err(SplitsError::WeightSumTooHigh { got: weight_sum, max: TOTAL_SPLITS_WEIGHT });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::min_amt_per_sec;

    const MIN_RATE: u128 = min_amt_per_sec(10);

    fn recv(account: AccountId, stream_id: u32) -> StreamReceiver {
        StreamReceiver {
            account_id: account,
            config: StreamConfig { stream_id, amt_per_sec: MIN_RATE, start: 0, duration: 0 },
        }
    }

    // --- stream receiver validation ---

    #[test]
    fn empty_stream_list_is_valid() {
        assert!(validate_stream_receivers(&[], MIN_RATE).is_ok());
    }

    #[test]
    fn sorted_stream_list_is_valid() {
        let list = vec![recv(1, 0), recv(1, 1), recv(2, 0)];
        assert!(validate_stream_receivers(&list, MIN_RATE).is_ok());
    }

    #[test]
    fn unsorted_stream_list_rejected() {
        let list = vec![recv(2, 0), recv(1, 0)];
        assert_eq!(
            validate_stream_receivers(&list, MIN_RATE),
            Err(StreamsError::UnsortedReceivers(1)),
        );
    }

    #[test]
    fn duplicate_stream_id_rejected() {
        let mut a = recv(1, 7);
        let mut b = recv(1, 7);
        a.config.amt_per_sec = MIN_RATE;
        b.config.amt_per_sec = MIN_RATE * 2;
        let err = validate_stream_receivers(&[a, b], MIN_RATE).unwrap_err();
        assert_eq!(err, StreamsError::DuplicateStream { account_id: 1, stream_id: 7 });
    }

    #[test]
    fn identical_entries_rejected_as_duplicates() {
        let list = vec![recv(1, 0), recv(1, 0)];
        assert!(validate_stream_receivers(&list, MIN_RATE).is_err());
    }

    #[test]
    fn rate_below_minimum_rejected() {
        let mut r = recv(1, 0);
        r.config.amt_per_sec = MIN_RATE - 1;
        assert_eq!(
            validate_stream_receivers(&[r], MIN_RATE),
            Err(StreamsError::RateTooLow { got: MIN_RATE - 1, min: MIN_RATE }),
        );
    }

    #[test]
    fn zero_rate_is_an_inert_slot() {
        let mut r = recv(1, 0);
        r.config.amt_per_sec = 0;
        assert!(validate_stream_receivers(&[r], MIN_RATE).is_ok());
    }

    #[test]
    fn rate_above_maximum_rejected() {
        let mut r = recv(1, 0);
        r.config.amt_per_sec = MAX_AMT_PER_SEC + 1;
        assert!(matches!(
            validate_stream_receivers(&[r], MIN_RATE),
            Err(StreamsError::RateTooHigh { .. }),
        ));
    }

    #[test]
    fn oversized_stream_list_rejected() {
        let list: Vec<StreamReceiver> =
            (0..MAX_STREAM_RECEIVERS as u32 + 1).map(|i| recv(1, i)).collect();
        assert!(matches!(
            validate_stream_receivers(&list, MIN_RATE),
            Err(StreamsError::TooManyReceivers { .. }),
        ));
    }

    #[test]
    fn far_future_start_rejected() {
        let mut r = recv(1, 0);
        r.config.start = MAX_TIMESTAMP + 1;
        assert!(matches!(
            validate_stream_receivers(&[r], MIN_RATE),
            Err(StreamsError::TimestampTooLarge { .. }),
        ));
    }

    #[test]
    fn receiver_ordering_sorts_by_account_then_config() {
        let a = recv(1, 5);
        let b = recv(2, 0);
        assert!(a < b);
        let c = recv(1, 0);
        assert!(c < a);
    }

    // --- splits receiver validation ---

    #[test]
    fn empty_splits_list_is_valid() {
        assert!(validate_splits_receivers(&[]).is_ok());
    }

    #[test]
    fn sorted_splits_list_is_valid() {
        let list = vec![SplitsReceiver::new(1, 10), SplitsReceiver::new(2, 20)];
        assert!(validate_splits_receivers(&list).is_ok());
    }

    #[test]
    fn unsorted_splits_rejected() {
        let list = vec![SplitsReceiver::new(2, 10), SplitsReceiver::new(1, 20)];
        assert_eq!(validate_splits_receivers(&list), Err(SplitsError::UnsortedReceivers(1)));
    }

    #[test]
    fn duplicate_splits_receiver_rejected() {
        let list = vec![SplitsReceiver::new(1, 10), SplitsReceiver::new(1, 20)];
        assert_eq!(validate_splits_receivers(&list), Err(SplitsError::DuplicateReceiver(1)));
    }

    #[test]
    fn zero_weight_rejected() {
        let list = vec![SplitsReceiver::new(1, 0)];
        assert_eq!(validate_splits_receivers(&list), Err(SplitsError::ZeroWeight(0)));
    }

    #[test]
    fn full_weight_to_one_receiver_is_valid() {
        let list = vec![SplitsReceiver::new(1, TOTAL_SPLITS_WEIGHT)];
        assert!(validate_splits_receivers(&list).is_ok());
    }

    #[test]
    fn weight_sum_above_total_rejected() {
        let list = vec![
            SplitsReceiver::new(1, TOTAL_SPLITS_WEIGHT),
            SplitsReceiver::new(2, 1),
        ];
        assert_eq!(
            validate_splits_receivers(&list),
            Err(SplitsError::WeightSumTooHigh {
                got: u64::from(TOTAL_SPLITS_WEIGHT) + 1,
                max: TOTAL_SPLITS_WEIGHT,
            }),
        );
    }

    #[test]
    fn oversized_splits_list_rejected() {
        let list: Vec<SplitsReceiver> =
            (0..MAX_SPLITS_RECEIVERS as u64 + 1).map(|i| SplitsReceiver::new(i, 1)).collect();
        assert!(matches!(
            validate_splits_receivers(&list),
            Err(SplitsError::TooManyReceivers { .. }),
        ));
    }

    // --- history entries ---

    #[test]
    fn history_entry_with_hash_only() {
        let entry = StreamsHistoryEntry {
            streams_hash: crate::commitment::Commitment([7; 32]),
            receivers: vec![],
            update_time: 100,
            max_end: 200,
        };
        assert_eq!(entry.streams_commitment(), Some(crate::commitment::Commitment([7; 32])));
    }

    #[test]
    fn history_entry_with_receivers_only() {
        let receivers = vec![recv(1, 0)];
        let entry = StreamsHistoryEntry {
            streams_hash: crate::commitment::Commitment::ZERO,
            receivers: receivers.clone(),
            update_time: 100,
            max_end: 200,
        };
        assert_eq!(
            entry.streams_commitment(),
            Some(crate::commitment::streams_hash(&receivers)),
        );
    }

    #[test]
    fn history_entry_with_both_is_malformed() {
        let entry = StreamsHistoryEntry {
            streams_hash: crate::commitment::Commitment([7; 32]),
            receivers: vec![recv(1, 0)],
            update_time: 100,
            max_end: 200,
        };
        assert_eq!(entry.streams_commitment(), None);
    }

    // --- Bincode round-trips ---

    #[test]
    fn bincode_round_trip_stream_receiver() {
        let r = recv(3, 9);
        let encoded = bincode::encode_to_vec(r, bincode::config::standard()).unwrap();
        let (decoded, _): (StreamReceiver, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(r, decoded);
    }

    #[test]
    fn bincode_round_trip_history_entry() {
        let entry = StreamsHistoryEntry {
            streams_hash: crate::commitment::Commitment([5; 32]),
            receivers: vec![recv(1, 0), recv(2, 1)],
            update_time: 1234,
            max_end: 5678,
        };
        let encoded = bincode::encode_to_vec(&entry, bincode::config::standard()).unwrap();
        let (decoded, _): (StreamsHistoryEntry, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(entry, decoded);
    }

    #[test]
    fn bincode_round_trip_splits_receiver() {
        let r = SplitsReceiver::new(42, 777);
        let encoded = bincode::encode_to_vec(r, bincode::config::standard()).unwrap();
        let (decoded, _): (SplitsReceiver, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(r, decoded);
    }
}
