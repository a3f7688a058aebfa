//! Handlers for `/messages`, `/inbox` and `/conversations`.
//!
//! | Method   | Path                      | Who |
//! |----------|---------------------------|-----|
//! | `POST`   | `/messages`               | acting user sends; returns 201 |
//! | `GET`    | `/messages`               | received by acting user; see [`ListParams`] |
//! | `GET`    | `/inbox`                  | unread, received by acting user |
//! | `GET`    | `/messages/:id`           | participants |
//! | `PATCH`  | `/messages/:id`           | sender; body `{"content":"..."}` |
//! | `DELETE` | `/messages/:id`           | sender |
//! | `POST`   | `/messages/:id/read`      | receiver |
//! | `GET`    | `/messages/:id/thread`    | participants; direct replies only |
//! | `GET`    | `/messages/:id/history`   | participants |
//! | `GET`    | `/conversations/:id`      | participants of the root message |
//!
//! A message the acting user may not act on is reported as missing.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use courier_core::{
  history::MessageHistory,
  message::{Message, MessageQuery, MessageView, NewMessage, UnreadMessage},
  store::MessageStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{acting::ActingUser, error::ApiError};

fn not_found(id: Uuid) -> ApiError { ApiError::NotFound(format!("message {id} not found")) }

/// Load a message and check the acting user may act on it.
async fn load_for<S>(
  store: &S,
  id: Uuid,
  allowed: impl Fn(&Message) -> bool,
) -> Result<Message, ApiError>
where
  S: MessageStore,
{
  store
    .get_message(id)
    .await
    .map_err(ApiError::from_store)?
    .filter(|m| allowed(m))
    .ok_or_else(|| not_found(id))
}

// ─── Send ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub receiver_id:       Uuid,
  pub content:           String,
  #[serde(default)]
  pub parent_message_id: Option<Uuid>,
}

/// `POST /messages` — returns 201 + the stored [`Message`].
pub async fn send<S>(
  State(store): State<Arc<S>>,
  ActingUser(sender): ActingUser,
  Json(body): Json<SendBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessageStore,
{
  let input = NewMessage {
    sender_id:         sender,
    receiver_id:       body.receiver_id,
    content:           body.content,
    parent_message_id: body.parent_message_id,
  };
  let message = store.send(input).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(message)))
}

// ─── Listing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  /// Case-insensitive substring of the sender's username.
  pub sender:           Option<String>,
  pub created_after:    Option<DateTime<Utc>>,
  pub created_before:   Option<DateTime<Utc>>,
  /// If `true`, read messages are returned too. Default `false`.
  #[serde(default)]
  pub include_read:     bool,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

/// `GET /messages[?sender=...][&created_after=...][&created_before=...][&include_read=true]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: MessageStore,
{
  let query = MessageQuery {
    receiver_id:    user_id,
    sender:         params.sender,
    created_after:  params.created_after,
    created_before: params.created_before,
    include_read:   params.include_read,
    limit:          params.limit,
    offset:         params.offset,
  };
  let messages = store
    .list_messages(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(messages))
}

/// `GET /inbox`
pub async fn inbox<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
) -> Result<Json<Vec<UnreadMessage>>, ApiError>
where
  S: MessageStore,
{
  let unread = store.unread_for(user_id).await.map_err(ApiError::from_store)?;
  Ok(Json(unread))
}

// ─── Single message ───────────────────────────────────────────────────────────

/// `GET /messages/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
{
  let message = load_for(store.as_ref(), id, |m| m.involves(user_id)).await?;
  Ok(Json(message))
}

#[derive(Debug, Deserialize)]
pub struct EditBody {
  pub content: String,
}

/// `PATCH /messages/:id` — only the sender may edit.
pub async fn edit<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
  Json(body): Json<EditBody>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
{
  load_for(store.as_ref(), id, |m| m.sender_id == user_id).await?;
  let message = store
    .edit(id, body.content)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(message))
}

/// `DELETE /messages/:id` — only the sender may delete.
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: MessageStore,
{
  load_for(store.as_ref(), id, |m| m.sender_id == user_id).await?;
  store.delete_message(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /messages/:id/read` — only the receiver may mark a message read.
pub async fn mark_read<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
{
  load_for(store.as_ref(), id, |m| m.receiver_id == user_id).await?;
  let message = store.mark_read(id).await.map_err(ApiError::from_store)?;
  Ok(Json(message))
}

/// `GET /messages/:id/history` — most recent edit first.
pub async fn history<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageHistory>>, ApiError>
where
  S: MessageStore,
{
  load_for(store.as_ref(), id, |m| m.involves(user_id)).await?;
  let entries = store.history_for(id).await.map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

// ─── Threads ──────────────────────────────────────────────────────────────────

/// `GET /messages/:id/thread` — direct replies, newest first.
pub async fn thread<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, ApiError>
where
  S: MessageStore,
{
  load_for(store.as_ref(), id, |m| m.involves(user_id)).await?;
  let replies = store.get_thread(id).await.map_err(ApiError::from_store)?;
  Ok(Json(replies))
}

/// `GET /conversations/:id` — the message followed by its direct replies.
pub async fn conversation<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, ApiError>
where
  S: MessageStore,
{
  let thread = store
    .get_conversation_thread(id)
    .await
    .map_err(ApiError::from_store)?;

  match thread.first() {
    Some(root) if root.message.involves(user_id) => Ok(Json(thread)),
    _ => Err(not_found(id)),
  }
}
