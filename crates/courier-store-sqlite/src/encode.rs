//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision, so comparing the text compares the instants. UUIDs are stored
//! as hyphenated lowercase strings. Flags are stored as 0/1 integers.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, TimeDelta, Utc};
use courier_core::{
  history::MessageHistory,
  message::{Message, MessageView, UnreadMessage},
  notification::Notification,
  user::User,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the store persists.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Round up to the stored precision, so an inclusive lower bound never
/// admits an instant earlier than itself.
pub fn ceil_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
  let truncated = dt.trunc_subsecs(6);
  if truncated < dt { truncated + TimeDelta::microseconds(1) } else { truncated }
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawUser::from_row`].
pub const USER_COLUMNS: &str = "user_id, username, created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub username:   String,
  pub created_at: String,
}

impl RawUser {
  /// Read the three user columns starting at column `at`.
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(at)?,
      username:   row.get(at + 1)?,
      created_at: row.get(at + 2)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      username:   self.username,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawMessage::from_row`].
pub const MESSAGE_COLUMNS: &str = "message_id, sender_id, receiver_id, content, \
                                   created_at, edited, read, parent_message_id";

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:        String,
  pub sender_id:         String,
  pub receiver_id:       String,
  pub content:           String,
  pub created_at:        String,
  pub edited:            bool,
  pub read:              bool,
  pub parent_message_id: Option<String>,
}

impl RawMessage {
  /// Read the eight message columns starting at column `at`.
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:        row.get(at)?,
      sender_id:         row.get(at + 1)?,
      receiver_id:       row.get(at + 2)?,
      content:           row.get(at + 3)?,
      created_at:        row.get(at + 4)?,
      edited:            row.get(at + 5)?,
      read:              row.get(at + 6)?,
      parent_message_id: row.get(at + 7)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:        decode_uuid(&self.message_id)?,
      sender_id:         decode_uuid(&self.sender_id)?,
      receiver_id:       decode_uuid(&self.receiver_id)?,
      content:           self.content,
      created_at:        decode_dt(&self.created_at)?,
      edited:            self.edited,
      read:              self.read,
      parent_message_id: decode_opt_uuid(self.parent_message_id.as_deref())?,
    })
  }
}

/// Select list for a message joined with its sender (`s`) and receiver (`r`).
pub const VIEW_COLUMNS: &str = "m.message_id, m.sender_id, m.receiver_id, m.content, \
                                m.created_at, m.edited, m.read, m.parent_message_id, \
                                s.user_id, s.username, s.created_at, \
                                r.user_id, r.username, r.created_at";

/// `FROM` clause matching [`VIEW_COLUMNS`].
pub const VIEW_FROM: &str = "messages m \
                             JOIN users s ON s.user_id = m.sender_id \
                             JOIN users r ON r.user_id = m.receiver_id";

pub struct RawMessageView {
  pub message:  RawMessage,
  pub sender:   RawUser,
  pub receiver: RawUser,
}

impl RawMessageView {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message:  RawMessage::from_row(row, 0)?,
      sender:   RawUser::from_row(row, 8)?,
      receiver: RawUser::from_row(row, 11)?,
    })
  }

  pub fn into_view(self) -> Result<MessageView> {
    Ok(MessageView {
      message:  self.message.into_message()?,
      sender:   self.sender.into_user()?,
      receiver: self.receiver.into_user()?,
    })
  }
}

/// The reduced column set used by the unread index.
pub struct RawUnread {
  pub message_id:        String,
  pub sender_id:         String,
  pub content:           String,
  pub created_at:        String,
  pub parent_message_id: Option<String>,
}

impl RawUnread {
  pub fn into_unread(self) -> Result<UnreadMessage> {
    Ok(UnreadMessage {
      message_id:        decode_uuid(&self.message_id)?,
      sender_id:         decode_uuid(&self.sender_id)?,
      content:           self.content,
      created_at:        decode_dt(&self.created_at)?,
      parent_message_id: decode_opt_uuid(self.parent_message_id.as_deref())?,
    })
  }
}

pub struct RawHistory {
  pub history_id:  String,
  pub message_id:  String,
  pub old_content: String,
  pub edited_at:   String,
  pub edited_by:   Option<String>,
}

impl RawHistory {
  pub fn into_history(self) -> Result<MessageHistory> {
    Ok(MessageHistory {
      history_id:  decode_uuid(&self.history_id)?,
      message_id:  decode_uuid(&self.message_id)?,
      old_content: self.old_content,
      edited_at:   decode_dt(&self.edited_at)?,
      edited_by:   decode_opt_uuid(self.edited_by.as_deref())?,
    })
  }
}

/// Column list matching [`RawNotification::from_row`].
pub const NOTIFICATION_COLUMNS: &str = "notification_id, user_id, message_id, is_read, created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub user_id:         String,
  pub message_id:      String,
  pub is_read:         bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      user_id:         row.get(1)?,
      message_id:      row.get(2)?,
      is_read:         row.get(3)?,
      created_at:      row.get(4)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      message_id:      decode_uuid(&self.message_id)?,
      is_read:         self.is_read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
