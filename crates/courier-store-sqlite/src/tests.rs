//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::{Arc, Mutex};

use courier_core::{
  dispatch::{Dispatcher, Event, Observer},
  message::{MessageQuery, NewMessage},
  store::MessageStore,
  user::User,
};
use uuid::Uuid;

use crate::{SqliteStore, encode::encode_uuid};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn users(s: &SqliteStore) -> (User, User) {
  let alice = s.add_user("alice".into()).await.unwrap();
  let bob = s.add_user("bob".into()).await.unwrap();
  (alice, bob)
}

fn is_validation(err: &crate::Error) -> bool {
  matches!(err, crate::Error::Core(courier_core::Error::Validation(_)))
}

#[derive(Default)]
struct Recorder(Mutex<Vec<&'static str>>);

impl Observer for Recorder {
  fn on_event(&self, event: &Event) {
    self.0.lock().unwrap().push(event.name());
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let s = store().await;
  let alice = s.add_user("  alice ".into()).await.unwrap();
  assert_eq!(alice.username, "alice");

  let fetched = s.get_user(alice.user_id).await.unwrap().unwrap();
  assert_eq!(fetched, alice);
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_or_blank_username_rejected() {
  let s = store().await;
  s.add_user("alice".into()).await.unwrap();

  let err = s.add_user("alice".into()).await.unwrap_err();
  assert!(is_validation(&err));
  let err = s.add_user("   ".into()).await.unwrap_err();
  assert!(is_validation(&err));

  assert_eq!(s.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_users_sorted_by_name() {
  let s = store().await;
  s.add_user("carol".into()).await.unwrap();
  s.add_user("alice".into()).await.unwrap();
  let names: Vec<_> = s
    .list_users()
    .await
    .unwrap()
    .into_iter()
    .map(|u| u.username)
    .collect();
  assert_eq!(names, ["alice", "carol"]);
}

// ─── Send ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_creates_one_unread_notification_for_receiver() {
  let s = store().await;
  let (alice, bob) = users(&s).await;

  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  assert!(!m.edited);
  assert!(!m.read);
  assert_eq!(s.get_message(m.message_id).await.unwrap().unwrap(), m);

  let notes = s.notifications_for(bob.user_id).await.unwrap();
  assert_eq!(notes.len(), 1);
  assert_eq!(notes[0].message_id, m.message_id);
  assert_eq!(notes[0].user_id, bob.user_id);
  assert!(!notes[0].is_read);

  assert!(s.notifications_for(alice.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn send_rejects_blank_content() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let err = s
    .send(NewMessage::new(alice.user_id, bob.user_id, " "))
    .await
    .unwrap_err();
  assert!(is_validation(&err));
}

#[tokio::test]
async fn send_rejects_unknown_participants_and_parent() {
  let s = store().await;
  let (alice, _) = users(&s).await;

  let err = s
    .send(NewMessage::new(alice.user_id, Uuid::new_v4(), "hi"))
    .await
    .unwrap_err();
  assert!(is_validation(&err));

  let err = s
    .send(NewMessage::new(Uuid::new_v4(), alice.user_id, "hi"))
    .await
    .unwrap_err();
  assert!(is_validation(&err));

  let err = s
    .send(NewMessage::new(alice.user_id, alice.user_id, "hi").reply_to(Uuid::new_v4()))
    .await
    .unwrap_err();
  assert!(is_validation(&err));

  // Nothing half-written.
  assert!(s.notifications_for(alice.user_id).await.unwrap().is_empty());
  assert!(s.unread_for(alice.user_id).await.unwrap().is_empty());
}

// ─── Edit ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn edit_records_history_and_flags_message() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();

  let edited = s.edit(m.message_id, "hi!".into()).await.unwrap();
  assert_eq!(edited.content, "hi!");
  assert!(edited.edited);
  assert_eq!(edited.created_at, m.created_at);

  let history = s.history_for(m.message_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].old_content, "hi");
  assert_eq!(history[0].edited_by, Some(alice.user_id));

  // Edits never notify.
  assert_eq!(s.notifications_for(bob.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn edit_with_same_content_is_a_no_op() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();

  let same = s.edit(m.message_id, "hi".into()).await.unwrap();
  assert!(!same.edited);
  assert!(s.history_for(m.message_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_is_newest_first() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "v1"))
    .await
    .unwrap();
  s.edit(m.message_id, "v2".into()).await.unwrap();
  s.edit(m.message_id, "v3".into()).await.unwrap();

  let old: Vec<_> = s
    .history_for(m.message_id)
    .await
    .unwrap()
    .into_iter()
    .map(|h| h.old_content)
    .collect();
  assert_eq!(old, ["v2", "v1"]);
}

#[tokio::test]
async fn edit_missing_message_is_not_found() {
  let s = store().await;
  let err = s.edit(Uuid::new_v4(), "x".into()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(courier_core::Error::MessageNotFound(_))
  ));
}

#[tokio::test]
async fn edit_missing_message_with_blank_content_is_not_found() {
  let s = store().await;
  let err = s.edit(Uuid::new_v4(), "  ".into()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(courier_core::Error::MessageNotFound(_))
  ));
}

#[tokio::test]
async fn edit_rejects_blank_content() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  let err = s.edit(m.message_id, "".into()).await.unwrap_err();
  assert!(is_validation(&err));
  assert_eq!(s.get_message(m.message_id).await.unwrap().unwrap().content, "hi");
}

// ─── Read state ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_read_removes_from_unread_index() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let first = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "one"))
    .await
    .unwrap();
  let second = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "two"))
    .await
    .unwrap();

  let unread = s.unread_for(bob.user_id).await.unwrap();
  let ids: Vec<_> = unread.iter().map(|u| u.message_id).collect();
  assert_eq!(ids, [second.message_id, first.message_id]);

  let read = s.mark_read(first.message_id).await.unwrap();
  assert!(read.read);
  // Idempotent.
  assert!(s.mark_read(first.message_id).await.unwrap().read);

  let unread = s.unread_for(bob.user_id).await.unwrap();
  assert_eq!(unread.len(), 1);
  assert_eq!(unread[0].message_id, second.message_id);
  assert!(s.unread_for(alice.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn mark_read_missing_message_is_not_found() {
  let s = store().await;
  let err = s.mark_read(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(courier_core::Error::MessageNotFound(_))
  ));
}

#[tokio::test]
async fn notification_mark_read() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  s.send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  let note = s.notifications_for(bob.user_id).await.unwrap().remove(0);

  let read = s.mark_notification_read(note.notification_id).await.unwrap();
  assert!(read.is_read);
  assert!(
    s.get_notification(note.notification_id)
      .await
      .unwrap()
      .unwrap()
      .is_read
  );

  let err = s.mark_notification_read(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(courier_core::Error::NotificationNotFound(_))
  ));
}

// ─── Threads ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn threads_are_one_level_deep() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let root = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  let reply = s
    .send(NewMessage::new(bob.user_id, alice.user_id, "hey").reply_to(root.message_id))
    .await
    .unwrap();
  let nested = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "sup").reply_to(reply.message_id))
    .await
    .unwrap();

  let thread = s.get_thread(root.message_id).await.unwrap();
  assert_eq!(thread.len(), 1);
  assert_eq!(thread[0].message.message_id, reply.message_id);
  assert_eq!(thread[0].sender.username, "bob");
  assert_eq!(thread[0].receiver.username, "alice");

  let convo = s.get_conversation_thread(root.message_id).await.unwrap();
  let ids: Vec<_> = convo.iter().map(|v| v.message.message_id).collect();
  assert_eq!(ids, [root.message_id, reply.message_id]);
  assert!(!ids.contains(&nested.message_id));
}

#[tokio::test]
async fn thread_replies_newest_first() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let root = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "q"))
    .await
    .unwrap();
  let a = s
    .send(NewMessage::new(bob.user_id, alice.user_id, "a").reply_to(root.message_id))
    .await
    .unwrap();
  let b = s
    .send(NewMessage::new(bob.user_id, alice.user_id, "b").reply_to(root.message_id))
    .await
    .unwrap();

  let ids: Vec<_> = s
    .get_thread(root.message_id)
    .await
    .unwrap()
    .into_iter()
    .map(|v| v.message.message_id)
    .collect();
  assert_eq!(ids, [b.message_id, a.message_id]);
}

#[tokio::test]
async fn thread_of_missing_message() {
  let s = store().await;
  let err = s.get_thread(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(courier_core::Error::MessageNotFound(_))
  ));
  assert!(
    s.get_conversation_thread(Uuid::new_v4())
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_messages_filters() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let carol = s.add_user("Carol".into()).await.unwrap();

  let from_alice = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "a"))
    .await
    .unwrap();
  let from_carol = s
    .send(NewMessage::new(carol.user_id, bob.user_id, "c"))
    .await
    .unwrap();
  s.mark_read(from_alice.message_id).await.unwrap();

  // Unread only by default.
  let q = MessageQuery::for_receiver(bob.user_id);
  let ids: Vec<_> = s
    .list_messages(&q)
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.message_id)
    .collect();
  assert_eq!(ids, [from_carol.message_id]);

  let all = MessageQuery { include_read: true, ..q.clone() };
  assert_eq!(s.list_messages(&all).await.unwrap().len(), 2);

  let by_sender = MessageQuery { sender: Some("caR".into()), ..all.clone() };
  let found = s.list_messages(&by_sender).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].message_id, from_carol.message_id);

  let window = MessageQuery {
    created_after: Some(from_carol.created_at),
    created_before: Some(from_carol.created_at),
    ..all.clone()
  };
  let found = s.list_messages(&window).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].message_id, from_carol.message_id);

  // A lower bound finer than the stored precision excludes earlier messages.
  let just_after = MessageQuery {
    created_after: Some(from_carol.created_at + chrono::TimeDelta::nanoseconds(500)),
    ..all.clone()
  };
  assert!(s.list_messages(&just_after).await.unwrap().is_empty());

  let paged = MessageQuery { limit: Some(1), offset: Some(1), ..all };
  let found = s.list_messages(&paged).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].message_id, from_alice.message_id);
}

// ─── Deletes ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_user_cascades_messages_notifications_history() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let carol = s.add_user("carol".into()).await.unwrap();

  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  s.edit(m.message_id, "hi!".into()).await.unwrap();
  let reply = s
    .send(NewMessage::new(carol.user_id, bob.user_id, "me too").reply_to(m.message_id))
    .await
    .unwrap();
  let survivor = s
    .send(NewMessage::new(carol.user_id, bob.user_id, "unrelated"))
    .await
    .unwrap();

  let report = s.delete_user(alice.user_id).await.unwrap();
  assert_eq!(report.user_id, alice.user_id);
  assert_eq!(report.messages_deleted, 2);
  assert_eq!(report.notifications_deleted, 2);
  assert_eq!(report.history_deleted, 1);

  assert!(s.get_user(alice.user_id).await.unwrap().is_none());
  assert!(s.get_message(m.message_id).await.unwrap().is_none());
  assert!(s.get_message(reply.message_id).await.unwrap().is_none());
  assert!(s.get_message(survivor.message_id).await.unwrap().is_some());
  assert!(s.history_for(m.message_id).await.unwrap().is_empty());

  let notes = s.notifications_for(bob.user_id).await.unwrap();
  assert_eq!(notes.len(), 1);
  assert_eq!(notes[0].message_id, survivor.message_id);
}

#[tokio::test]
async fn delete_user_detaches_authored_history_on_surviving_messages() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let carol = s.add_user("carol".into()).await.unwrap();

  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();

  // Carol is not a participant; plant an entry she authored.
  let message_id = encode_uuid(m.message_id);
  let editor = encode_uuid(carol.user_id);
  s.connection()
    .call(move |conn| {
      conn.execute(
        "INSERT INTO message_history (history_id, message_id, old_content, edited_at, edited_by)
         VALUES (?1, ?2, 'before', '2024-01-01T00:00:00.000000Z', ?3)",
        rusqlite::params![encode_uuid(Uuid::new_v4()), message_id, editor],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let report = s.delete_user(carol.user_id).await.unwrap();
  assert_eq!(report.messages_deleted, 0);
  assert_eq!(report.history_detached, 1);

  let history = s.history_for(m.message_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].message_id, m.message_id);
  assert!(history[0].edited_by.is_none());
}

#[tokio::test]
async fn delete_unknown_user_is_not_found() {
  let s = store().await;
  let err = s.delete_user(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(courier_core::Error::UserNotFound(_))
  ));
}

#[tokio::test]
async fn delete_message_cascades_replies_notifications_and_history() {
  let s = store().await;
  let (alice, bob) = users(&s).await;
  let root = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  let reply = s
    .send(NewMessage::new(bob.user_id, alice.user_id, "hey").reply_to(root.message_id))
    .await
    .unwrap();
  s.edit(root.message_id, "hi!".into()).await.unwrap();
  assert_eq!(s.history_for(root.message_id).await.unwrap().len(), 1);

  s.delete_message(root.message_id).await.unwrap();
  assert!(s.get_message(reply.message_id).await.unwrap().is_none());
  assert!(s.history_for(root.message_id).await.unwrap().is_empty());
  let history_rows: i64 = s
    .connection()
    .call(|conn| {
      Ok(conn.query_row("SELECT COUNT(*) FROM message_history", [], |r| r.get(0))?)
    })
    .await
    .unwrap();
  assert_eq!(history_rows, 0);
  assert!(s.notifications_for(bob.user_id).await.unwrap().is_empty());
  assert!(s.notifications_for(alice.user_id).await.unwrap().is_empty());

  let err = s.delete_message(root.message_id).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(courier_core::Error::MessageNotFound(_))
  ));
}

// ─── Observers ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn observers_see_committed_events() {
  let recorder = Arc::new(Recorder::default());
  let s = store()
    .await
    .with_dispatcher(Dispatcher::new().with_observer(recorder.clone()));
  let (alice, bob) = users(&s).await;

  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  s.edit(m.message_id, "hi".into()).await.unwrap();
  s.edit(m.message_id, "hi!".into()).await.unwrap();
  s.mark_read(m.message_id).await.unwrap();
  s.mark_read(m.message_id).await.unwrap();
  // A failed send emits nothing.
  s.send(NewMessage::new(alice.user_id, Uuid::new_v4(), "x"))
    .await
    .unwrap_err();
  s.delete_user(bob.user_id).await.unwrap();

  assert_eq!(*recorder.0.lock().unwrap(), [
    "message_sent",
    "message_edited",
    "message_read",
    "user_deleted",
  ]);
}

// ─── Scenario ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_edit_read_scenario() {
  let s = store().await;
  let (alice, bob) = users(&s).await;

  let m = s
    .send(NewMessage::new(alice.user_id, bob.user_id, "hi"))
    .await
    .unwrap();
  assert_eq!(s.notifications_for(bob.user_id).await.unwrap().len(), 1);

  let m = s.edit(m.message_id, "hi!".into()).await.unwrap();
  assert!(m.edited);
  let m = s.edit(m.message_id, "hi!".into()).await.unwrap();
  let history = s.history_for(m.message_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].old_content, "hi");

  s.mark_read(m.message_id).await.unwrap();
  assert!(
    s.unread_for(bob.user_id)
      .await
      .unwrap()
      .iter()
      .all(|u| u.message_id != m.message_id)
  );
}
