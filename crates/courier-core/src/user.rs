//! User — the thin identity record messages point at.
//!
//! Identity and authentication live outside Courier. The store only keeps
//! enough to resolve references and to cascade deletes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub username:   String,
  pub created_at: DateTime<Utc>,
}

/// What was removed when a user was deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
  pub user_id:               Uuid,
  /// Messages sent or received by the user, plus replies hanging off them.
  pub messages_deleted:      usize,
  pub notifications_deleted: usize,
  pub history_deleted:       usize,
  /// History entries on surviving messages whose editor was cleared.
  pub history_detached:      usize,
}
