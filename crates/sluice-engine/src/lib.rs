//! # sluice-engine
//! Stateful engines of the Sluice ledger: the cycle ledger, the streaming
//! engine, the splitting engine, and the [`Hub`] facade composing them.

pub mod hub;
pub mod ledger;
pub mod splits;
pub mod streams;

pub use hub::Hub;
