//! An [`Observer`] that writes every committed event to the log.

use courier_core::dispatch::{Event, Observer};

pub struct TracingObserver;

impl Observer for TracingObserver {
  fn on_event(&self, event: &Event) {
    let name = event.name();
    match event {
      Event::MessageSent(m) => tracing::info!(
        event = name,
        message_id = %m.message_id,
        sender_id = %m.sender_id,
        receiver_id = %m.receiver_id,
        reply = m.parent_message_id.is_some(),
        "message sent"
      ),
      Event::MessageEdited { message, .. } => {
        tracing::info!(event = name, message_id = %message.message_id, "message edited")
      }
      Event::MessageRead(m) => {
        tracing::info!(event = name, message_id = %m.message_id, "message read")
      }
      Event::MessageDeleted { message_id } => {
        tracing::info!(event = name, %message_id, "message deleted")
      }
      Event::NotificationRead(n) => tracing::info!(
        event = name,
        notification_id = %n.notification_id,
        "notification read"
      ),
      Event::UserDeleted(report) => tracing::info!(
        event = name,
        user_id = %report.user_id,
        messages = report.messages_deleted,
        notifications = report.notifications_deleted,
        history = report.history_deleted,
        detached = report.history_detached,
        "user deleted"
      ),
    }
  }
}
