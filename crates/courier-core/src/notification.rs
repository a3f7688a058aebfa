//! Notifications — one per message creation, addressed to the receiver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub user_id:         Uuid,
  pub message_id:      Uuid,
  pub is_read:         bool,
  pub created_at:      DateTime<Utc>,
}
