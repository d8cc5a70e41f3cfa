//! Plain-text rendering of core views for the terminal.

use libris_core::{
  book::Book,
  dates,
  filter::{CategoryCount, RoleCounts},
  issue::Issue,
  lifecycle::LoanView,
  stats::DashboardStats,
  user::User,
};

fn or_empty(lines: Vec<String>, what: &str) -> String {
  if lines.is_empty() {
    format!("No {what} found.")
  } else {
    lines.join("\n")
  }
}

pub fn books(books: &[Book]) -> String {
  let lines = books
    .iter()
    .map(|b| {
      format!(
        "{:>4}  {:<32}  {:<20}  {:<12}  {}",
        b.id,
        dates::truncate(&b.title, 32),
        dates::truncate(&b.author, 20),
        b.category,
        b.availability_label(),
      )
    })
    .collect();
  or_empty(lines, "books")
}

pub fn categories(categories: &[CategoryCount]) -> String {
  let lines = categories
    .iter()
    .map(|c| format!("{:<20} {}", c.name, c.count))
    .collect();
  or_empty(lines, "categories")
}

pub fn users(users: &[User], counts: RoleCounts) -> String {
  let mut lines: Vec<String> = users
    .iter()
    .map(|u| {
      format!(
        "{:>4}  {:<16}  {:<24}  {:<10}  {}",
        u.id,
        u.username,
        dates::truncate(&u.display_name(), 24),
        dates::format_role(&u.role_name()),
        if u.is_active { "active" } else { "inactive" },
      )
    })
    .collect();
  if lines.is_empty() {
    return "No users found.".to_owned();
  }
  lines.push(format!(
    "students: {}  staff: {}  external: {}  unassigned: {}",
    counts.student, counts.staff, counts.external, counts.unassigned
  ));
  lines.join("\n")
}

pub fn loans(views: &[LoanView]) -> String {
  let lines = views
    .iter()
    .map(|v| {
      format!(
        "{:>4}  {:<28}  {:<20}  due {}  {:<8}  {}",
        v.id,
        dates::truncate(&v.book_title, 28),
        dates::truncate(&v.borrower, 20),
        v.due_date,
        v.status,
        v.label,
      )
    })
    .collect();
  or_empty(lines, "issues")
}

/// A single catalogue entry after a mutation.
pub fn book(book: &Book, verb: &str) -> String {
  format!("book {} {verb}: {} ({})", book.id, book.title, book.availability_label())
}

/// A single loan after a mutation.
pub fn loan(issue: &Issue, status: &str) -> String {
  format!(
    "issue {} {status}: book {} to user {}, due {}",
    issue.id,
    issue.book,
    issue.user,
    dates::format_instant(issue.due_date),
  )
}

pub fn user(user: &User) -> String {
  format!(
    "user {} ({}): role {}, {}",
    user.id,
    user.username,
    dates::format_role(&user.role_name()),
    if user.is_active { "active" } else { "inactive" },
  )
}

/// Cents as a currency amount, e.g. `150` → `"1.50"`.
pub fn money(cents: u64) -> String { format!("{}.{:02}", cents / 100, cents % 100) }

pub fn stats(stats: &DashboardStats) -> String {
  [
    format!("Total books:     {}", stats.total_books),
    format!("Available books: {}", stats.available_books),
    format!("Total users:     {}", stats.total_users),
    format!("Total issues:    {}", stats.total_issues),
    format!("Active issues:   {}", stats.active_issues),
    format!("Overdue issues:  {}", stats.overdue_issues),
  ]
  .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_lists_say_so() {
    assert_eq!(books(&[]), "No books found.");
    assert_eq!(loans(&[]), "No issues found.");
    assert_eq!(users(&[], RoleCounts::default()), "No users found.");
  }

  #[test]
  fn money_pads_cents() {
    assert_eq!(money(150), "1.50");
    assert_eq!(money(5), "0.05");
    assert_eq!(money(0), "0.00");
  }
}
