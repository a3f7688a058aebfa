//! SQLite backend for the Courier message store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation runs inside a single
//! SQLite transaction together with the effects planned by the
//! [`Dispatcher`](courier_core::dispatch::Dispatcher).

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
