//! Error types for `libris-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{backend::EntityKind, book::BookId, guard::Mutation, issue::IssueId};

#[derive(Debug, Error)]
pub enum Error {
  /// A precondition the client checks before talking to the backend.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("issue {0} has already been returned")]
  InvalidState(IssueId),

  #[error("{kind} {id} not found")]
  NotFound { kind: EntityKind, id: i64 },

  /// The backend refused a state transition.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(kind: EntityKind, id: i64) -> Self {
    Self::NotFound { kind, id }
  }
}

/// Client-detected precondition failures. The `Display` text is what the UI
/// shows the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("book {book_id} has no copies available")]
  NoCopiesAvailable { book_id: BookId },

  #[error("{}", .action.denial())]
  NotAdmin { action: Mutation },

  #[error("due date {due} is before the issue date {issued}")]
  DueBeforeIssue {
    due:    DateTime<Utc>,
    issued: DateTime<Utc>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
