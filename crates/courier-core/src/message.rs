//! Message types — the records at the centre of the store.
//!
//! A message is created once by a send, after which only its content (via an
//! edit) and its read flag may change. Sender, receiver, parent and creation
//! time are fixed for the life of the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, user::User};

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub message_id:        Uuid,
  pub sender_id:         Uuid,
  pub receiver_id:       Uuid,
  pub content:           String,
  /// Server-assigned; never changes after creation.
  pub created_at:        DateTime<Utc>,
  /// Set only as a side effect of a content-changing edit.
  pub edited:            bool,
  pub read:              bool,
  pub parent_message_id: Option<Uuid>,
}

impl Message {
  /// `true` if `user_id` is the sender or the receiver.
  pub fn involves(&self, user_id: Uuid) -> bool {
    self.sender_id == user_id || self.receiver_id == user_id
  }
}

// ─── NewMessage ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::MessageStore::send`].
/// `created_at`, `edited` and `read` are always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
  pub sender_id:         Uuid,
  pub receiver_id:       Uuid,
  pub content:           String,
  #[serde(default)]
  pub parent_message_id: Option<Uuid>,
}

impl NewMessage {
  pub fn new(sender_id: Uuid, receiver_id: Uuid, content: impl Into<String>) -> Self {
    Self {
      sender_id,
      receiver_id,
      content: content.into(),
      parent_message_id: None,
    }
  }

  /// Builder-style helper for replies.
  pub fn reply_to(mut self, parent_message_id: Uuid) -> Self {
    self.parent_message_id = Some(parent_message_id);
    self
  }

  /// Checks that need no store access.
  pub fn validate(&self) -> Result<()> {
    validate_content(&self.content)
  }

  /// Materialise the stored record with fresh identity and default flags.
  /// The store supplies `created_at` at the precision it persists.
  pub fn into_message(self, created_at: DateTime<Utc>) -> Message {
    Message {
      message_id:        Uuid::new_v4(),
      sender_id:         self.sender_id,
      receiver_id:       self.receiver_id,
      content:           self.content,
      created_at,
      edited:            false,
      read:              false,
      parent_message_id: self.parent_message_id,
    }
  }
}

/// Content must carry at least one non-whitespace character.
pub fn validate_content(content: &str) -> Result<()> {
  if content.trim().is_empty() {
    return Err(Error::Validation("message content must not be empty".into()));
  }
  Ok(())
}

// ─── Projections ─────────────────────────────────────────────────────────────

/// The reduced field set returned by the unread index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadMessage {
  pub message_id:        Uuid,
  pub sender_id:         Uuid,
  pub content:           String,
  pub created_at:        DateTime<Utc>,
  pub parent_message_id: Option<Uuid>,
}

impl From<Message> for UnreadMessage {
  fn from(m: Message) -> Self {
    Self {
      message_id:        m.message_id,
      sender_id:         m.sender_id,
      content:           m.content,
      created_at:        m.created_at,
      parent_message_id: m.parent_message_id,
    }
  }
}

/// A message enriched with its participants, as shown in thread views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
  pub message:  Message,
  pub sender:   User,
  pub receiver: User,
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::MessageStore::list_messages`].
#[derive(Debug, Clone)]
pub struct MessageQuery {
  /// Only messages addressed to this user are returned.
  pub receiver_id:    Uuid,
  /// Case-insensitive substring match on the sender's username.
  pub sender:         Option<String>,
  /// Inclusive lower bound on `created_at`.
  pub created_after:  Option<DateTime<Utc>>,
  /// Inclusive upper bound on `created_at`.
  pub created_before: Option<DateTime<Utc>>,
  /// Read messages are excluded unless this is set.
  pub include_read:   bool,
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

impl MessageQuery {
  /// Unread messages for `receiver_id`, no further filtering.
  pub fn for_receiver(receiver_id: Uuid) -> Self {
    Self {
      receiver_id,
      sender: None,
      created_after: None,
      created_before: None,
      include_read: false,
      limit: None,
      offset: None,
    }
  }
}
