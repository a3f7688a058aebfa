//! The event dispatcher.
//!
//! Message mutations never write notifications or history themselves.
//! Instead the store asks the [`Dispatcher`] what a transition implies,
//! applies the returned [`Effect`]s in the same transaction as the mutation,
//! and hands the committed [`Event`] back to the dispatcher so registered
//! [`Observer`]s can react.
//!
//! | Trigger        | Condition                     | Effects                      |
//! |----------------|-------------------------------|------------------------------|
//! | after create   | always                        | `Notify(receiver)`           |
//! | before update  | stored content differs        | `RecordEdit`, `MarkEdited`   |
//! | before update  | stored content identical      | none                         |
//! | before update  | stored message missing        | none; logged, not raised     |
//! | on user delete | always                        | `DetachEditor(user)`         |
//!
//! Cascading removal of a deleted user's messages (and their notifications
//! and history) is left to the persistence layer.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
  message::Message,
  notification::Notification,
  user::DeletionReport,
};

// ─── Effects ─────────────────────────────────────────────────────────────────

/// A write the store must perform alongside the triggering mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
  /// Append a notification for `user_id` about `message_id`.
  Notify { user_id: Uuid, message_id: Uuid },
  /// Append a history entry holding the pre-edit content.
  RecordEdit {
    message_id:  Uuid,
    old_content: String,
    editor:      Option<Uuid>,
  },
  /// Set the message's `edited` flag.
  MarkEdited { message_id: Uuid },
  /// Clear `edited_by` on every history entry authored by `user_id`.
  DetachEditor { user_id: Uuid },
}

/// Outcome of the before-update rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
  /// New content equals stored content: nothing to write at all.
  Unchanged,
  /// The stored message could not be found. History is skipped and the
  /// lookup failure is swallowed; the caller's own write decides the result.
  RaceSuppressed,
  /// Content changes: apply these effects, then write the new content.
  Apply(Vec<Effect>),
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// A committed state change, delivered to observers after the transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
  MessageSent(Message),
  MessageEdited { message: Message, old_content: String },
  MessageRead(Message),
  MessageDeleted { message_id: Uuid },
  NotificationRead(Notification),
  UserDeleted(DeletionReport),
}

impl Event {
  /// Short stable name, used as a log field.
  pub fn name(&self) -> &'static str {
    match self {
      Self::MessageSent(_) => "message_sent",
      Self::MessageEdited { .. } => "message_edited",
      Self::MessageRead(_) => "message_read",
      Self::MessageDeleted { .. } => "message_deleted",
      Self::NotificationRead(_) => "notification_read",
      Self::UserDeleted(_) => "user_deleted",
    }
  }
}

/// Receives committed events synchronously, in registration order.
pub trait Observer: Send + Sync {
  fn on_event(&self, event: &Event);
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Lifecycle rules plus an explicit observer list.
///
/// Cloning is cheap; observers are reference-counted.
#[derive(Clone, Default)]
pub struct Dispatcher {
  observers: Vec<Arc<dyn Observer>>,
}

impl Dispatcher {
  pub fn new() -> Self { Self::default() }

  /// Register an observer; returns `self` for chaining at construction.
  pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
    self.observers.push(observer);
    self
  }

  /// Rule for a freshly created message.
  pub fn after_create(&self, message: &Message) -> Vec<Effect> {
    vec![Effect::Notify {
      user_id:    message.receiver_id,
      message_id: message.message_id,
    }]
  }

  /// Rule run before new content is written to `message_id`.
  ///
  /// `stored` is the row as currently persisted, looked up inside the same
  /// transaction that will perform the write.
  pub fn before_update(
    &self,
    message_id: Uuid,
    stored: Option<&Message>,
    new_content: &str,
  ) -> UpdatePlan {
    let Some(stored) = stored else {
      tracing::warn!(
        %message_id,
        "stored message missing before update; skipping edit history"
      );
      return UpdatePlan::RaceSuppressed;
    };

    if stored.content == new_content {
      return UpdatePlan::Unchanged;
    }

    UpdatePlan::Apply(vec![
      Effect::RecordEdit {
        message_id,
        old_content: stored.content.clone(),
        editor:      Some(stored.sender_id),
      },
      Effect::MarkEdited { message_id },
    ])
  }

  /// Rule run before a user row is removed.
  pub fn on_user_delete(&self, user_id: Uuid) -> Vec<Effect> {
    vec![Effect::DetachEditor { user_id }]
  }

  /// Deliver a committed event to every observer.
  pub fn emit(&self, event: &Event) {
    tracing::debug!(event = event.name(), observers = self.observers.len(), "dispatch");
    for observer in &self.observers {
      observer.on_event(event);
    }
  }
}
