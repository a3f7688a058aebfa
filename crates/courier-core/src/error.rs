//! Error types for `courier-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("message not found: {0}")]
  MessageNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("validation error: {0}")]
  Validation(String),
}

impl Error {
  /// `true` for the "referenced entity does not exist" family.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::UserNotFound(_) | Self::MessageNotFound(_) | Self::NotificationNotFound(_)
    )
  }
}

/// Implemented by backend error types so callers can classify failures
/// without knowing the backend.
pub trait AsDomainError {
  /// The domain error this wraps, if it is one.
  fn as_domain(&self) -> Option<&Error>;
}

impl AsDomainError for Error {
  fn as_domain(&self) -> Option<&Error> { Some(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
