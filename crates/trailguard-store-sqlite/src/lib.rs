//! SQLite backend for Trailguard tracking.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. That thread executes calls one
//! at a time, and each write runs in its own transaction, which gives the
//! per-tourist serialisation the service relies on.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
