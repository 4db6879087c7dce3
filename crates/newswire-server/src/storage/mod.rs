//! Storage layer
//!
//! Uses SQLite (embedded). The connection pool is the only shared mutable
//! resource; every ledger transaction holds one pooled connection
//! exclusively from begin to commit or rollback.

pub mod db;

pub use db::Database;
