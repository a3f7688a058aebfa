//! Edit history — an append-only log of prior message content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content of a message as it was before one edit.
/// Entries are never updated or merged; they disappear only with their
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHistory {
  pub history_id:  Uuid,
  pub message_id:  Uuid,
  pub old_content: String,
  pub edited_at:   DateTime<Utc>,
  /// Cleared when the editing user is deleted.
  pub edited_by:   Option<Uuid>,
}
