//! Multi-payer point ledger.
//!
//! Payers contribute signed point transactions; spending draws points
//! from the oldest transactions first, across payer boundaries, while no
//! payer's balance is ever allowed to drop below zero.
//!
//! The [`ledger::Ledger`] engine runs over any [`storage::Storage`]
//! backend: [`storage::InMemoryStorage`] for tests and embedding, or
//! `storage::FileStorage` (feature `storage-file`) for JSON files on disk.

pub mod balance;
pub mod error;
pub mod ledger;
pub mod models;
mod spend;
pub mod storage;
