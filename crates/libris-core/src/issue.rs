//! Loan ("issue") records.
//!
//! An issue is created when a book is lent and mutated exactly once, when it
//! is marked returned. Its lifecycle status is never stored; see
//! [`crate::lifecycle::LoanStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  book::{Book, BookId},
  user::{User, UserId},
};

pub type IssueId = i64;

/// The authoritative loan record as the backend returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
  pub id:         IssueId,
  pub user:       UserId,
  pub book:       BookId,
  /// Server-assigned when the loan is created.
  pub issue_date: DateTime<Utc>,
  pub due_date:   DateTime<Utc>,
  pub returned:   bool,
}

impl AsRef<Issue> for Issue {
  fn as_ref(&self) -> &Issue { self }
}

/// Input to [`crate::backend::LibraryBackend::create_issue`]. When
/// `due_date` is absent the backend picks issue date + 14 days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
  pub user:     UserId,
  pub book:     BookId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub returned: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub due_date: Option<DateTime<Utc>>,
}

impl IssuePatch {
  /// The body of the return action: `{"returned": true}`.
  pub fn mark_returned() -> Self {
    Self {
      returned: Some(true),
      due_date: None,
    }
  }
}

/// An issue joined with the book and borrower it references. Read-only: the
/// details are looked up from cached snapshots and may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedIssue {
  #[serde(flatten)]
  pub issue:        Issue,
  pub user_details: Option<User>,
  pub book_details: Option<Book>,
}

impl EnrichedIssue {
  /// Book title, or `"Book #<id>"` when the book is not in the snapshot.
  pub fn book_title(&self) -> String {
    self
      .book_details
      .as_ref()
      .map(|b| b.title.clone())
      .unwrap_or_else(|| format!("Book #{}", self.issue.book))
  }

  pub fn book_author(&self) -> String {
    self
      .book_details
      .as_ref()
      .map(|b| b.author.clone())
      .unwrap_or_else(|| "Unknown Author".to_owned())
  }

  /// Borrower's name, or `"User #<id>"` when the user is not in the
  /// snapshot.
  pub fn borrower(&self) -> String {
    self
      .user_details
      .as_ref()
      .map(User::display_name)
      .unwrap_or_else(|| format!("User #{}", self.issue.user))
  }
}

impl AsRef<Issue> for EnrichedIssue {
  fn as_ref(&self) -> &Issue { &self.issue }
}
