//! Error types for the Sluice ledger.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamsError {
    #[error("receivers do not match the stored commitment")] StaleReceivers,
    #[error("receivers not sorted at index {0}")] UnsortedReceivers(usize),
    #[error("duplicate stream: account {account_id}, stream {stream_id}")] DuplicateStream { account_id: u64, stream_id: u32 },
    #[error("too many receivers: {got} > {max}")] TooManyReceivers { got: usize, max: usize },
    #[error("rate below minimum: {got} < {min}")] RateTooLow { got: u128, min: u128 },
    #[error("rate too high: {got} > {max}")] RateTooHigh { got: u128, max: u128 },
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("balance too high: {got} > {max}")] BalanceTooHigh { got: u128, max: u128 },
    #[error("history replay does not match the stored root")] InvalidHistory,
    #[error("timestamp {timestamp} precedes last update {update_time}")] TimestampInPast { timestamp: u64, update_time: u64 },
    #[error("timestamp too large: {got} > {max}")] TimestampTooLarge { got: u64, max: u64 },
    #[error("balance accounting overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitsError {
    #[error("receivers do not match the stored commitment")] StaleReceivers,
    #[error("receivers not sorted at index {0}")] UnsortedReceivers(usize),
    #[error("duplicate receiver: account {0}")] DuplicateReceiver(u64),
    #[error("zero weight at index {0}")] ZeroWeight(usize),
    #[error("too many receivers: {got} > {max}")] TooManyReceivers { got: usize, max: usize },
    #[error("weight sum too high: {got} > {max}")] WeightSumTooHigh { got: u64, max: u32 },
    #[error("amount too large: {got} > {max}")] AmountTooLarge { got: u128, max: u128 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SluiceError {
    #[error(transparent)] Streams(#[from] StreamsError),
    #[error(transparent)] Splits(#[from] SplitsError),
}
