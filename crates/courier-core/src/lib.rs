//! Core types and trait definitions for the Courier messaging store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::MessageStore`]; the [`dispatch`]
//! module holds the lifecycle rules that keep notifications and edit history
//! consistent with message mutations.

pub mod dispatch;
pub mod error;
pub mod history;
pub mod message;
pub mod notification;
pub mod store;
pub mod user;

pub use error::{Error, Result};
