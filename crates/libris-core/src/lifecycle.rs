//! Loan lifecycle rules and derived loan views.
//!
//! A loan's status is a pure function of `{returned, due_date}` and the
//! current instant. It is recomputed every time it is displayed or filtered
//! on, so it cannot go stale as time passes.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | (none) | issue | `Active` |
//! | `Active` | due date passes | `Overdue` (derived) |
//! | `Active` / `Overdue` | return | `Returned` |
//! | `Returned` | anything | rejected |

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result, ValidationError,
  book::Book,
  dates,
  issue::{EnrichedIssue, Issue, IssueId},
  user::User,
};

/// Loan period applied when the caller does not pick a due date.
pub const DEFAULT_LOAN_DAYS: i64 = 14;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LoanStatus {
  Active,
  Overdue,
  Returned,
}

impl LoanStatus {
  pub fn of(issue: &Issue, now: DateTime<Utc>) -> Self {
    if issue.returned {
      Self::Returned
    } else if dates::is_overdue(issue.due_date, now) {
      Self::Overdue
    } else {
      Self::Active
    }
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Returned) }
}

// ─── Transition preconditions ────────────────────────────────────────────────

/// The due date for a new loan: the requested one, or now + 14 days.
///
/// A requested date must lie strictly after `now`. The backend stamps
/// `issue_date` with its own clock, no earlier than ours, so a due date equal
/// to our `now` could already precede it. The backend's own check remains
/// the authoritative one.
pub fn resolve_due_date(
  requested: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
  match requested {
    None => Ok(now + TimeDelta::days(DEFAULT_LOAN_DAYS)),
    Some(due) if due <= now => Err(
      ValidationError::DueBeforeIssue {
        due,
        issued: now,
      }
      .into(),
    ),
    Some(due) => Ok(due),
  }
}

/// A book can only be lent while at least one copy is on the shelf.
pub fn ensure_issuable(book: &Book) -> Result<()> {
  if book.is_available() {
    Ok(())
  } else {
    Err(ValidationError::NoCopiesAvailable { book_id: book.id }.into())
  }
}

/// A returned loan is terminal.
pub fn ensure_returnable(issue: &Issue) -> Result<()> {
  if issue.returned {
    Err(Error::InvalidState(issue.id))
  } else {
    Ok(())
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Loans split the way the issues page shows them. `active` holds every
/// unreturned loan; `overdue` is the subset of those past their due date.
#[derive(Debug)]
pub struct LoanBuckets<'a, T> {
  pub active:   Vec<&'a T>,
  pub overdue:  Vec<&'a T>,
  pub returned: Vec<&'a T>,
}

impl<T> LoanBuckets<'_, T> {
  pub fn total(&self) -> usize { self.active.len() + self.returned.len() }
}

/// Partition `issues` by status as of `now`, preserving input order.
pub fn classify<T: AsRef<Issue>>(
  issues: &[T],
  now: DateTime<Utc>,
) -> LoanBuckets<'_, T> {
  let mut buckets = LoanBuckets {
    active:   Vec::new(),
    overdue:  Vec::new(),
    returned: Vec::new(),
  };
  for item in issues {
    match LoanStatus::of(item.as_ref(), now) {
      LoanStatus::Returned => buckets.returned.push(item),
      LoanStatus::Overdue => {
        buckets.active.push(item);
        buckets.overdue.push(item);
      }
      LoanStatus::Active => buckets.active.push(item),
    }
  }
  buckets
}

// ─── Enrichment ──────────────────────────────────────────────────────────────

/// Join each issue with its book and borrower. Ids missing from the
/// snapshots leave the corresponding details empty.
pub fn enrich(issues: &[Issue], books: &[Book], users: &[User]) -> Vec<EnrichedIssue> {
  let books: HashMap<_, _> = books.iter().map(|b| (b.id, b)).collect();
  let users: HashMap<_, _> = users.iter().map(|u| (u.id, u)).collect();
  issues
    .iter()
    .map(|issue| EnrichedIssue {
      issue:        issue.clone(),
      book_details: books.get(&issue.book).map(|b| (*b).clone()),
      user_details: users.get(&issue.user).map(|u| (*u).clone()),
    })
    .collect()
}

// ─── Display rows ────────────────────────────────────────────────────────────

/// A display-ready loan row. Built on demand and thrown away; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanView {
  pub id:             IssueId,
  pub book_title:     String,
  pub book_author:    String,
  pub borrower:       String,
  pub issue_date:     String,
  pub due_date:       String,
  pub status:         LoanStatus,
  pub days_until_due: i64,
  pub label:          String,
}

impl LoanView {
  pub fn new(enriched: &EnrichedIssue, now: DateTime<Utc>) -> Self {
    let issue = &enriched.issue;
    let status = LoanStatus::of(issue, now);
    let label = if status.is_terminal() {
      "Returned".to_owned()
    } else {
      dates::due_label(issue.due_date, now)
    };
    Self {
      id: issue.id,
      book_title: enriched.book_title(),
      book_author: enriched.book_author(),
      borrower: enriched.borrower(),
      issue_date: dates::format_instant(issue.issue_date),
      due_date: dates::format_instant(issue.due_date),
      status,
      days_until_due: dates::days_until_due(issue.due_date, now),
      label,
    }
  }
}
