//! Dashboard counters, recomputed from snapshots on demand.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  book::Book,
  issue::Issue,
  lifecycle::{LoanStatus, classify},
  user::User,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
  pub total_books:     usize,
  pub total_users:     usize,
  pub total_issues:    usize,
  /// Unreturned loans, overdue ones included.
  pub active_issues:   usize,
  pub overdue_issues:  usize,
  /// Titles with at least one copy on the shelf.
  pub available_books: usize,
}

impl DashboardStats {
  pub fn compute(
    books: &[Book],
    users: &[User],
    issues: &[Issue],
    now: DateTime<Utc>,
  ) -> Self {
    let buckets = classify(issues, now);
    Self {
      total_books:     books.len(),
      total_users:     users.len(),
      total_issues:    issues.len(),
      active_issues:   buckets.active.len(),
      overdue_issues:  buckets.overdue.len(),
      available_books: books.iter().filter(|b| b.is_available()).count(),
    }
  }
}

/// Loans due within `lead_days` calendar days that are not yet overdue.
pub fn due_soon<'a>(
  issues: &'a [Issue],
  lead_days: i64,
  now: DateTime<Utc>,
) -> Vec<&'a Issue> {
  issues
    .iter()
    .filter(|i| LoanStatus::of(i, now) == LoanStatus::Active)
    .filter(|i| crate::dates::days_until_due(i.due_date, now) <= lead_days)
    .collect()
}
