//! The `LibraryBackend` trait: the contract the core expects from the
//! remote REST service.
//!
//! Implemented by `libris-client` (HTTP) and `libris-store-memory`
//! (in-process). The backend is the authority: it assigns ids and timestamps,
//! adjusts `available_copies` on issue and return, and rejects nonsensical
//! writes. The core only pre-checks what it can see in its snapshots.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
  Result,
  book::{Book, BookId, BookPatch, NewBook},
  issue::{Issue, IssueId, IssuePatch, NewIssue},
  user::{NewUser, User, UserId, UserPatch},
};

/// The three collections the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
  Book,
  User,
  Issue,
}

impl EntityKind {
  /// The collection's path segment, e.g. `"books"` in `/books/{id}/`.
  pub fn collection(self) -> &'static str {
    match self {
      Self::Book => "books",
      Self::User => "users",
      Self::Issue => "issues",
    }
  }
}

/// The envelope list endpoints wrap their results in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub count:    u64,
  pub next:     Option<String>,
  pub previous: Option<String>,
  pub results:  Vec<T>,
}

/// Abstraction over the library's REST backend.
///
/// `get_*`, `update_*` and `delete_*` fail with [`crate::Error::NotFound`]
/// for unknown ids. Rejected state transitions surface as
/// [`crate::Error::Conflict`], unreachable services as
/// [`crate::Error::Transport`].
///
/// All methods return `Send` futures so implementations can be driven from a
/// multi-threaded tokio runtime.
pub trait LibraryBackend: Send + Sync {
  // ── Books ─────────────────────────────────────────────────────────────

  fn list_books(&self) -> impl Future<Output = Result<Vec<Book>>> + Send + '_;

  fn get_book(&self, id: BookId) -> impl Future<Output = Result<Book>> + Send + '_;

  fn create_book(&self, input: NewBook) -> impl Future<Output = Result<Book>> + Send + '_;

  fn update_book(
    &self,
    id: BookId,
    patch: BookPatch,
  ) -> impl Future<Output = Result<Book>> + Send + '_;

  fn delete_book(&self, id: BookId) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  fn list_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send + '_;

  fn get_user(&self, id: UserId) -> impl Future<Output = Result<User>> + Send + '_;

  fn create_user(&self, input: NewUser) -> impl Future<Output = Result<User>> + Send + '_;

  fn update_user(
    &self,
    id: UserId,
    patch: UserPatch,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  fn delete_user(&self, id: UserId) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Issues ────────────────────────────────────────────────────────────

  fn list_issues(&self) -> impl Future<Output = Result<Vec<Issue>>> + Send + '_;

  fn get_issue(&self, id: IssueId) -> impl Future<Output = Result<Issue>> + Send + '_;

  /// Lend a book. The backend assigns `issue_date` and decrements the
  /// book's `available_copies`.
  fn create_issue(&self, input: NewIssue)
  -> impl Future<Output = Result<Issue>> + Send + '_;

  fn update_issue(
    &self,
    id: IssueId,
    patch: IssuePatch,
  ) -> impl Future<Output = Result<Issue>> + Send + '_;

  fn delete_issue(&self, id: IssueId) -> impl Future<Output = Result<()>> + Send + '_;

  /// The return action: `update_issue(id, {"returned": true})`. The backend
  /// restores one copy of the book.
  fn mark_returned(&self, id: IssueId) -> impl Future<Output = Result<Issue>> + Send + '_ {
    self.update_issue(id, IssuePatch::mark_returned())
  }
}
