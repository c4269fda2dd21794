//! # sluice-core
//! Foundation types, receiver-list commitments, and pure accrual math for
//! the Sluice streaming-and-splitting ledger.

pub mod accrual;
pub mod commitment;
pub mod constants;
pub mod error;
pub mod types;
