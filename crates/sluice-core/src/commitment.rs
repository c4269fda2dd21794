//! Receiver-list commitments and the configuration-history hash chain.
//!
//! A receiver list is never persisted in full; the ledger stores only its
//! BLAKE3 digest and every mutating call must resupply the complete current
//! list so the digest can be re-checked. Domain-separated prefixes keep
//! stream-list, split-list, and history-link digests from colliding:
//! - Stream list: `BLAKE3(0x00 || entries)`
//! - Split list: `BLAKE3(0x01 || entries)`
//! - History link: `BLAKE3(0x02 || prev || streams_hash || update_time || max_end)`
//!
//! Entries are hashed over an explicit fixed byte layout (all little-endian)
//! so the digest does not depend on any serializer. The empty list's
//! commitment is [`Commitment::ZERO`], which is what zero-initialized
//! account state holds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{SplitsReceiver, StreamReceiver};

/// Domain separation prefix for stream-receiver lists.
const STREAMS_PREFIX: u8 = 0x00;

/// Domain separation prefix for split-receiver lists.
const SPLITS_PREFIX: u8 = 0x01;

/// Domain separation prefix for history chain links.
const HISTORY_PREFIX: u8 = 0x02;

/// A 32-byte receiver-list or history commitment.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// The zero commitment: an empty receiver list, or an empty history.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Commitment {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Byte size of one stream receiver in the hash layout.
const STREAM_RECEIVER_SIZE: usize = 8 + 4 + 16 + 8 + 8;

/// Byte size of one split receiver in the hash layout.
const SPLITS_RECEIVER_SIZE: usize = 8 + 4;

/// Commit to a stream-receiver list.
///
/// Returns [`Commitment::ZERO`] for an empty list.
pub fn streams_hash(receivers: &[StreamReceiver]) -> Commitment {
    if receivers.is_empty() {
        return Commitment::ZERO;
    }
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[STREAMS_PREFIX]);
    let mut buf = Vec::with_capacity(receivers.len() * STREAM_RECEIVER_SIZE);
    for r in receivers {
        buf.extend_from_slice(&r.account_id.to_le_bytes());
        buf.extend_from_slice(&r.config.stream_id.to_le_bytes());
        buf.extend_from_slice(&r.config.amt_per_sec.to_le_bytes());
        buf.extend_from_slice(&r.config.start.to_le_bytes());
        buf.extend_from_slice(&r.config.duration.to_le_bytes());
    }
    hasher.update(&buf);
    Commitment(hasher.finalize().into())
}

/// Commit to a split-receiver list.
///
/// Returns [`Commitment::ZERO`] for an empty list.
pub fn splits_hash(receivers: &[SplitsReceiver]) -> Commitment {
    if receivers.is_empty() {
        return Commitment::ZERO;
    }
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[SPLITS_PREFIX]);
    let mut buf = Vec::with_capacity(receivers.len() * SPLITS_RECEIVER_SIZE);
    for r in receivers {
        buf.extend_from_slice(&r.account_id.to_le_bytes());
        buf.extend_from_slice(&r.weight.to_le_bytes());
    }
    hasher.update(&buf);
    Commitment(hasher.finalize().into())
}

/// Check a stream-receiver list against a stored commitment.
pub fn verify_streams(commitment: &Commitment, receivers: &[StreamReceiver]) -> bool {
    streams_hash(receivers) == *commitment
}

/// Check a split-receiver list against a stored commitment.
pub fn verify_splits(commitment: &Commitment, receivers: &[SplitsReceiver]) -> bool {
    splits_hash(receivers) == *commitment
}

/// Extend a history chain by one configuration update.
///
/// `prev` is the chain root before the update, `streams_hash` the commitment
/// to the receivers active after it. The chain root of a fresh account is
/// [`Commitment::ZERO`].
pub fn history_hash(
    prev: &Commitment,
    streams_hash: &Commitment,
    update_time: u64,
    max_end: u64,
) -> Commitment {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[HISTORY_PREFIX]);
    hasher.update(prev.as_bytes());
    hasher.update(streams_hash.as_bytes());
    hasher.update(&update_time.to_le_bytes());
    hasher.update(&max_end.to_le_bytes());
    Commitment(hasher.finalize().into())
}
