//! [`SqliteStore`] — the SQLite implementation of [`MessageStore`].

use std::{path::Path, sync::Arc};

use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use courier_core::{
  dispatch::{Dispatcher, Effect, Event, UpdatePlan},
  history::MessageHistory,
  message::{
    Message, MessageQuery, MessageView, NewMessage, UnreadMessage, validate_content,
  },
  notification::Notification,
  store::MessageStore,
  user::{DeletionReport, User},
};

use crate::{
  encode::{
    MESSAGE_COLUMNS, NOTIFICATION_COLUMNS, RawHistory, RawMessage, RawMessageView,
    RawNotification, RawUnread, RawUser, USER_COLUMNS, VIEW_COLUMNS, VIEW_FROM, ceil_micros,
    encode_dt, encode_uuid, now,
  },
  schema::SCHEMA,
  Error, Result,
};

type CoreError = courier_core::Error;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Courier message store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection and dispatcher are
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  dispatcher: Arc<Dispatcher>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, dispatcher: Arc::new(Dispatcher::new()) })
  }

  /// Replace the dispatcher, e.g. to register observers.
  pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
    self.dispatcher = Arc::new(dispatcher);
    self
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }
}

// ─── Synchronous helpers (run on the connection thread) ──────────────────────

/// Carry a decode failure out of a `call` closure.
fn other(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

fn row_exists(conn: &Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(sql, rusqlite::params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn user_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
  row_exists(conn, "SELECT 1 FROM users WHERE user_id = ?1", id)
}

fn message_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
  row_exists(conn, "SELECT 1 FROM messages WHERE message_id = ?1", id)
}

fn select_message(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawMessage>> {
  conn
    .query_row(
      &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1"),
      rusqlite::params![id],
      |row| RawMessage::from_row(row, 0),
    )
    .optional()
}

/// Messages joined with their participants, newest first.
fn select_views(
  conn: &Connection,
  condition: &str,
  id: &str,
) -> rusqlite::Result<Vec<RawMessageView>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {VIEW_COLUMNS} FROM {VIEW_FROM}
     WHERE {condition}
     ORDER BY m.created_at DESC, m.rowid DESC"
  ))?;
  let rows = stmt
    .query_map(rusqlite::params![id], RawMessageView::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn count(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
  let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
  Ok(n as usize)
}

/// Row counts of the tables a user delete can cascade into.
#[derive(Clone, Copy)]
struct Totals {
  messages:      usize,
  notifications: usize,
  history:       usize,
}

impl Totals {
  fn read(conn: &Connection) -> rusqlite::Result<Self> {
    Ok(Self {
      messages:      count(conn, "messages")?,
      notifications: count(conn, "notifications")?,
      history:       count(conn, "message_history")?,
    })
  }
}

fn write_content(conn: &Connection, id: &str, content: &str) -> rusqlite::Result<usize> {
  conn.execute(
    "UPDATE messages SET content = ?2 WHERE message_id = ?1",
    rusqlite::params![id, content],
  )
}

/// Append a notification. Only reachable through [`Effect::Notify`].
fn notify(conn: &Connection, user_id: Uuid, message_id: Uuid) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO notifications (notification_id, user_id, message_id, is_read, created_at)
     VALUES (?1, ?2, ?3, 0, ?4)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      encode_uuid(user_id),
      encode_uuid(message_id),
      encode_dt(now()),
    ],
  )?;
  Ok(())
}

/// Append a history entry. Only reachable through [`Effect::RecordEdit`].
fn record_edit(
  conn: &Connection,
  message_id: Uuid,
  old_content: &str,
  editor: Option<Uuid>,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO message_history (history_id, message_id, old_content, edited_at, edited_by)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      encode_uuid(message_id),
      old_content,
      encode_dt(now()),
      editor.map(encode_uuid),
    ],
  )?;
  Ok(())
}

fn apply_effects(conn: &Connection, effects: &[Effect]) -> rusqlite::Result<()> {
  for effect in effects {
    match effect {
      Effect::Notify { user_id, message_id } => notify(conn, *user_id, *message_id)?,
      Effect::RecordEdit { message_id, old_content, editor } => {
        record_edit(conn, *message_id, old_content, *editor)?
      }
      Effect::MarkEdited { message_id } => {
        conn.execute(
          "UPDATE messages SET edited = 1 WHERE message_id = ?1",
          rusqlite::params![encode_uuid(*message_id)],
        )?;
      }
      Effect::DetachEditor { user_id } => {
        conn.execute(
          "UPDATE message_history SET edited_by = NULL WHERE edited_by = ?1",
          rusqlite::params![encode_uuid(*user_id)],
        )?;
      }
    }
  }
  Ok(())
}

enum SendOutcome {
  Sent,
  UnknownUser(Uuid),
  UnknownParent(Uuid),
}

// ─── MessageStore impl ───────────────────────────────────────────────────────

impl MessageStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, username: String) -> Result<User> {
    let username = username.trim().to_owned();
    if username.is_empty() {
      return Err(CoreError::Validation("username must not be empty".into()).into());
    }

    let user = User { user_id: Uuid::new_v4(), username, created_at: now() };

    let id_str   = encode_uuid(user.user_id);
    let name     = user.username.clone();
    let at_str   = encode_dt(user.created_at);

    let taken = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if row_exists(&tx, "SELECT 1 FROM users WHERE username = ?1", &name)? {
          return Ok(true);
        }
        tx.execute(
          "INSERT INTO users (user_id, username, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        )?;
        tx.commit()?;
        Ok(false)
      })
      .await?;

    if taken {
      return Err(
        CoreError::Validation(format!("username {:?} is already taken", user.username)).into(),
      );
    }

    tracing::debug!(user_id = %user.user_id, username = %user.username, "user added");
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              |row| RawUser::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
        let rows = stmt
          .query_map([], |row| RawUser::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn delete_user(&self, id: Uuid) -> Result<DeletionReport> {
    let effects = self.dispatcher.on_user_delete(id);
    let id_str  = encode_uuid(id);

    let counts = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !user_exists(&tx, &id_str)? {
          return Ok(None);
        }

        let before = Totals::read(&tx)?;
        let authored: Vec<String> = {
          let mut stmt =
            tx.prepare("SELECT history_id FROM message_history WHERE edited_by = ?1")?;
          stmt
            .query_map(rusqlite::params![id_str], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        apply_effects(&tx, &effects)?;
        // Messages, replies, notifications and history go by cascade.
        tx.execute("DELETE FROM users WHERE user_id = ?1", rusqlite::params![id_str])?;

        let after = Totals::read(&tx)?;
        let mut detached = 0usize;
        for history_id in &authored {
          if row_exists(&tx, "SELECT 1 FROM message_history WHERE history_id = ?1", history_id)? {
            detached += 1;
          }
        }

        tx.commit()?;
        Ok(Some((before, after, detached)))
      })
      .await?;

    let (before, after, detached) = counts.ok_or(CoreError::UserNotFound(id))?;
    let report = DeletionReport {
      user_id:               id,
      messages_deleted:      before.messages - after.messages,
      notifications_deleted: before.notifications - after.notifications,
      history_deleted:       before.history - after.history,
      history_detached:      detached,
    };

    tracing::debug!(user_id = %id, messages = report.messages_deleted, "user deleted");
    self.dispatcher.emit(&Event::UserDeleted(report.clone()));
    Ok(report)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn send(&self, input: NewMessage) -> Result<Message> {
    input.validate()?;

    let message = input.into_message(now());
    let effects = self.dispatcher.after_create(&message);

    let sender       = message.sender_id;
    let receiver     = message.receiver_id;
    let parent       = message.parent_message_id;
    let id_str       = encode_uuid(message.message_id);
    let content      = message.content.clone();
    let at_str       = encode_dt(message.created_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        for user in [sender, receiver] {
          if !user_exists(&tx, &encode_uuid(user))? {
            return Ok(SendOutcome::UnknownUser(user));
          }
        }
        if let Some(parent) = parent
          && !message_exists(&tx, &encode_uuid(parent))?
        {
          return Ok(SendOutcome::UnknownParent(parent));
        }

        tx.execute(
          "INSERT INTO messages (
             message_id, sender_id, receiver_id, content, created_at,
             edited, read, parent_message_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)",
          rusqlite::params![
            id_str,
            encode_uuid(sender),
            encode_uuid(receiver),
            content,
            at_str,
            parent.map(encode_uuid),
          ],
        )?;
        apply_effects(&tx, &effects)?;
        tx.commit()?;
        Ok(SendOutcome::Sent)
      })
      .await?;

    match outcome {
      SendOutcome::Sent => {}
      SendOutcome::UnknownUser(user) => {
        return Err(CoreError::Validation(format!("user {user} does not exist")).into());
      }
      SendOutcome::UnknownParent(parent) => {
        return Err(
          CoreError::Validation(format!("parent message {parent} does not exist")).into(),
        );
      }
    }

    tracing::debug!(message_id = %message.message_id, "message sent");
    self.dispatcher.emit(&Event::MessageSent(message.clone()));
    Ok(message)
  }

  async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_message(conn, &id_str)?))
      .await?;
    raw.map(RawMessage::into_message).transpose()
  }

  async fn edit(&self, id: Uuid, new_content: String) -> Result<Message> {
    // A missing message outranks bad content.
    if let Err(e) = validate_content(&new_content) {
      return match self.get_message(id).await? {
        Some(_) => Err(e.into()),
        None => Err(CoreError::MessageNotFound(id).into()),
      };
    }

    let dispatcher = Arc::clone(&self.dispatcher);
    let id_str     = encode_uuid(id);

    // Lookup, history, flag and content write share one transaction so no
    // reader sees new content with `edited` still unset.
    let (raw, old_content) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let stored = select_message(&tx, &id_str)?
          .map(RawMessage::into_message)
          .transpose()
          .map_err(other)?;

        let old_content = match dispatcher.before_update(id, stored.as_ref(), &new_content) {
          UpdatePlan::Unchanged => None,
          UpdatePlan::RaceSuppressed => {
            write_content(&tx, &id_str, &new_content)?;
            None
          }
          UpdatePlan::Apply(effects) => {
            apply_effects(&tx, &effects)?;
            write_content(&tx, &id_str, &new_content)?;
            stored.map(|m| m.content)
          }
        };

        let raw = select_message(&tx, &id_str)?;
        tx.commit()?;
        Ok((raw, old_content))
      })
      .await?;

    let message = raw.ok_or(CoreError::MessageNotFound(id))?.into_message()?;

    if let Some(old_content) = old_content {
      tracing::debug!(message_id = %id, "message edited");
      self.dispatcher.emit(&Event::MessageEdited { message: message.clone(), old_content });
    }
    Ok(message)
  }

  async fn mark_read(&self, id: Uuid) -> Result<Message> {
    let id_str = encode_uuid(id);

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(mut raw) = select_message(&tx, &id_str)? else {
          return Ok(None);
        };
        let transitioned = !raw.read;
        if transitioned {
          tx.execute(
            "UPDATE messages SET read = 1 WHERE message_id = ?1",
            rusqlite::params![id_str],
          )?;
          raw.read = true;
        }
        tx.commit()?;
        Ok(Some((raw, transitioned)))
      })
      .await?;

    let (raw, transitioned) = result.ok_or(CoreError::MessageNotFound(id))?;
    let message = raw.into_message()?;
    if transitioned {
      self.dispatcher.emit(&Event::MessageRead(message.clone()));
    }
    Ok(message)
  }

  async fn delete_message(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM messages WHERE message_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if removed == 0 {
      return Err(CoreError::MessageNotFound(id).into());
    }

    tracing::debug!(message_id = %id, "message deleted");
    self.dispatcher.emit(&Event::MessageDeleted { message_id: id });
    Ok(())
  }

  async fn get_thread(&self, id: Uuid) -> Result<Vec<MessageView>> {
    let id_str = encode_uuid(id);

    let raws = self
      .conn
      .call(move |conn| {
        if !message_exists(conn, &id_str)? {
          return Ok(None);
        }
        Ok(Some(select_views(conn, "m.parent_message_id = ?1", &id_str)?))
      })
      .await?;

    raws
      .ok_or(CoreError::MessageNotFound(id))?
      .into_iter()
      .map(RawMessageView::into_view)
      .collect()
  }

  async fn get_conversation_thread(&self, id: Uuid) -> Result<Vec<MessageView>> {
    let id_str = encode_uuid(id);

    let raws = self
      .conn
      .call(move |conn| {
        let mut rows = select_views(conn, "m.message_id = ?1", &id_str)?;
        if rows.is_empty() {
          return Ok(rows);
        }
        rows.extend(select_views(conn, "m.parent_message_id = ?1", &id_str)?);
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessageView::into_view).collect()
  }

  async fn list_messages(&self, query: &MessageQuery) -> Result<Vec<Message>> {
    let receiver     = encode_uuid(query.receiver_id);
    let sender       = query.sender.clone();
    let after        = query.created_after.map(ceil_micros).map(encode_dt);
    let before       = query.created_before.map(encode_dt);
    let include_read = query.include_read;
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val    = query.limit.map_or(-1, |l| l as i64);
    let offset_val   = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             m.message_id, m.sender_id, m.receiver_id, m.content,
             m.created_at, m.edited, m.read, m.parent_message_id
           FROM messages m
           JOIN users s ON s.user_id = m.sender_id
           WHERE m.receiver_id = ?1
             AND (?2 IS NULL OR instr(lower(s.username), lower(?2)) > 0)
             AND (?3 IS NULL OR m.created_at >= ?3)
             AND (?4 IS NULL OR m.created_at <= ?4)
             AND (?5 OR m.read = 0)
           ORDER BY m.created_at DESC, m.rowid DESC
           LIMIT ?6 OFFSET ?7",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              receiver,
              sender,
              after,
              before,
              include_read,
              limit_val,
              offset_val,
            ],
            |row| RawMessage::from_row(row, 0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn unread_for(&self, user_id: Uuid) -> Result<Vec<UnreadMessage>> {
    let id_str = encode_uuid(user_id);

    let raws: Vec<RawUnread> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT message_id, sender_id, content, created_at, parent_message_id
           FROM messages
           WHERE receiver_id = ?1 AND read = 0
           ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawUnread {
              message_id:        row.get(0)?,
              sender_id:         row.get(1)?,
              content:           row.get(2)?,
              created_at:        row.get(3)?,
              parent_message_id: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUnread::into_unread).collect()
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn history_for(&self, message_id: Uuid) -> Result<Vec<MessageHistory>> {
    let id_str = encode_uuid(message_id);

    let raws: Vec<RawHistory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT history_id, message_id, old_content, edited_at, edited_by
           FROM message_history
           WHERE message_id = ?1
           ORDER BY edited_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawHistory {
              history_id:  row.get(0)?,
              message_id:  row.get(1)?,
              old_content: row.get(2)?,
              edited_at:   row.get(3)?,
              edited_by:   row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistory::into_history).collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>> {
    let id_str = encode_uuid(user_id);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawNotification> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1"),
              rusqlite::params![id_str],
              RawNotification::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNotification::into_notification).transpose()
  }

  async fn mark_notification_read(&self, id: Uuid) -> Result<Notification> {
    let id_str = encode_uuid(id);

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(mut raw) = tx
          .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1"),
            rusqlite::params![id_str],
            RawNotification::from_row,
          )
          .optional()?
        else {
          return Ok(None);
        };
        let transitioned = !raw.is_read;
        if transitioned {
          tx.execute(
            "UPDATE notifications SET is_read = 1 WHERE notification_id = ?1",
            rusqlite::params![id_str],
          )?;
          raw.is_read = true;
        }
        tx.commit()?;
        Ok(Some((raw, transitioned)))
      })
      .await?;

    let (raw, transitioned) = result.ok_or(CoreError::NotificationNotFound(id))?;
    let notification = raw.into_notification()?;
    if transitioned {
      self.dispatcher.emit(&Event::NotificationRead(notification.clone()));
    }
    Ok(notification)
  }
}
