//! The `MessageStore` trait.
//!
//! Implemented by storage backends (e.g. `courier-store-sqlite`). Higher
//! layers (`courier-api`, `courier-server`) depend on this abstraction, not on
//! any concrete backend.
//!
//! Every mutating method runs as one atomic unit: the triggering write and
//! all effects planned by the [`Dispatcher`](crate::dispatch::Dispatcher)
//! commit together or not at all.

use std::future::Future;

use uuid::Uuid;

use crate::{
  error::AsDomainError,
  history::MessageHistory,
  message::{Message, MessageQuery, MessageView, NewMessage, UnreadMessage},
  notification::Notification,
  user::{DeletionReport, User},
};

/// Abstraction over a Courier store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait MessageStore: Send + Sync {
  type Error: std::error::Error + AsDomainError + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Register a user. Usernames must be non-empty and unique.
  fn add_user(
    &self,
    username: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Delete a user, cascading every message they sent or received together
  /// with those messages' replies, notifications and history. History they
  /// authored on surviving messages keeps its message link with the editor
  /// cleared.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<DeletionReport, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Create a message and, atomically with it, the receiver's notification.
  ///
  /// Fails with a validation error if the content is blank or the sender,
  /// receiver or parent does not exist.
  fn send(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  fn get_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Replace a message's content.
  ///
  /// Identical content is a no-op. Otherwise the prior content is appended to
  /// the history log and the message is flagged as edited.
  fn edit(
    &self,
    id: Uuid,
    new_content: String,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Flag a message as read. Idempotent.
  fn mark_read(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Remove a message, its replies, notifications and history.
  fn delete_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Direct replies to `id`, newest first. One level only: replies to
  /// replies are not included.
  fn get_thread(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<MessageView>, Self::Error>> + Send + '_;

  /// The message `id` followed by its direct replies, newest first. Returns
  /// an empty list if `id` does not exist.
  fn get_conversation_thread(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<MessageView>, Self::Error>> + Send + '_;

  /// Messages addressed to `query.receiver_id`, newest first.
  fn list_messages<'a>(
    &'a self,
    query: &'a MessageQuery,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// Unread messages addressed to `user_id`, newest first.
  fn unread_for(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UnreadMessage>, Self::Error>> + Send + '_;

  // ── History ───────────────────────────────────────────────────────────

  /// Edit history of a message, most recent edit first.
  fn history_for(
    &self,
    message_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MessageHistory>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Notifications for `user_id`, newest first.
  fn notifications_for(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn get_notification(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  /// Flag a notification as read. Idempotent.
  fn mark_notification_read(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;
}
