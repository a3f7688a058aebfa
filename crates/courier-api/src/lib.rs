//! JSON REST API for Courier.
//!
//! Exposes an axum [`Router`] backed by any
//! [`courier_core::store::MessageStore`]. Authentication, TLS, and transport
//! concerns are the caller's responsibility; the acting user arrives in the
//! [`acting::USER_HEADER`] header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", courier_api::api_router(store.clone()))
//! ```

pub mod acting;
pub mod error;
pub mod messages;
pub mod notifications;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use courier_core::store::MessageStore;

pub use acting::ActingUser;
pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: MessageStore + 'static,
{
  Router::new()
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/users/{id}", get(users::get_one::<S>))
    .route("/account", delete(users::delete_account::<S>))
    // Messages
    .route("/messages", get(messages::list::<S>).post(messages::send::<S>))
    .route(
      "/messages/{id}",
      get(messages::get_one::<S>)
        .patch(messages::edit::<S>)
        .delete(messages::delete_one::<S>),
    )
    .route("/messages/{id}/read", post(messages::mark_read::<S>))
    .route("/messages/{id}/thread", get(messages::thread::<S>))
    .route("/messages/{id}/history", get(messages::history::<S>))
    .route("/conversations/{id}", get(messages::conversation::<S>))
    .route("/inbox", get(messages::inbox::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    .with_state(store)
}
