//! SQLite backend for the competitor intelligence store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every operation runs inside a single
//! `call` on one connection, which makes each check-and-write atomic.

mod encode;
mod schema;
mod store;

pub mod error;

pub use encode::identity_key;
pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
