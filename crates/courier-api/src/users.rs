//! Handlers for `/users` and `/account`.
//!
//! | Method   | Path          | Notes |
//! |----------|---------------|-------|
//! | `GET`    | `/users`      | All users, by username |
//! | `POST`   | `/users`      | Body: `{"username":"alice"}`; returns 201 |
//! | `GET`    | `/users/:id`  | 404 if not found |
//! | `DELETE` | `/account`    | Deletes the acting user and cascades |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use courier_core::{
  store::MessageStore,
  user::{DeletionReport, User},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{acting::ActingUser, error::ApiError};

/// `GET /users`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<User>>, ApiError>
where
  S: MessageStore,
{
  let users = store.list_users().await.map_err(ApiError::from_store)?;
  Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub username: String,
}

/// `POST /users` — body: `{"username":"alice"}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessageStore,
{
  let user = store
    .add_user(body.username)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: MessageStore,
{
  let user = store
    .get_user(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}

/// `DELETE /account` — remove the acting user and everything that cascades
/// from them.
pub async fn delete_account<S>(
  State(store): State<Arc<S>>,
  ActingUser(user_id): ActingUser,
) -> Result<Json<DeletionReport>, ApiError>
where
  S: MessageStore,
{
  let report = store
    .delete_user(user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(report))
}
