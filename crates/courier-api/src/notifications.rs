//! Handlers for `/notifications`.
//!
//! | Method | Path                        | Notes |
//! |--------|-----------------------------|-------|
//! | `GET`  | `/notifications`            | Acting user's notifications, newest first |
//! | `POST` | `/notifications/:id/read`   | Owner only; idempotent |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use courier_core::{notification::Notification, store::MessageStore};
use uuid::Uuid;

use crate::{acting::ActingUser, error::ApiError};

/// `GET /notifications`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: MessageStore,
{
  let notifications = store
    .notifications_for(user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(notifications))
}

/// `POST /notifications/:id/read`
pub async fn mark_read<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError>
where
  S: MessageStore,
{
  store
    .get_notification(id)
    .await
    .map_err(ApiError::from_store)?
    .filter(|n| n.user_id == user_id)
    .ok_or_else(|| ApiError::NotFound(format!("notification {id} not found")))?;

  let notification = store
    .mark_notification_read(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(notification))
}
