//! Prizebox Persistence - SQLite storage for the event/reward catalog,
//! the quota ledger, and the reward request audit trail

pub mod sqlite;

pub use sqlite::Database;
