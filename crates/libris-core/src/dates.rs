//! Date arithmetic and display labels for loans and stock.
//!
//! Every function takes the current instant as an argument so results are
//! deterministic; callers pass [`chrono::Utc::now`] at the edge.

use chrono::{DateTime, NaiveDate, Utc};

/// Display format used across the dashboard, e.g. `"Jan 05, 2025"`.
pub const DATE_FORMAT: &str = "%b %d, %Y";

/// `true` iff `now` is strictly after `due`. A loan due this very instant is
/// not overdue yet.
pub fn is_overdue(due: DateTime<Utc>, now: DateTime<Utc>) -> bool { now > due }

/// Signed number of calendar days (UTC) from `now` until `due`.
///
/// Counts date boundaries rather than elapsed 24-hour periods, so a loan due
/// later today (or earlier today) reads as `0`.
pub fn days_until_due(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
  (due.date_naive() - now.date_naive()).num_days()
}

/// Badge text for an unreturned loan.
pub fn due_label(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let days = days_until_due(due, now);
  if is_overdue(due, now) {
    match days.unsigned_abs() {
      0 => "Overdue today".to_owned(),
      n => format!("Overdue by {n} {}", plural_days(n)),
    }
  } else {
    match days {
      0 => "Due today".to_owned(),
      n => format!("{n} {} left", plural_days(n.unsigned_abs())),
    }
  }
}

fn plural_days(n: u64) -> &'static str {
  if n == 1 { "day" } else { "days" }
}

/// Render an instant in the dashboard's date format.
pub fn format_instant(at: DateTime<Utc>) -> String {
  at.format(DATE_FORMAT).to_string()
}

/// Render a backend date string. Accepts RFC 3339 instants and bare
/// `YYYY-MM-DD` dates; anything else (including an empty or missing value)
/// renders as `""`.
pub fn format_date(raw: Option<&str>) -> String {
  let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
    return String::new();
  };
  if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
    return format_instant(at.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .map(|d| d.format(DATE_FORMAT).to_string())
    .unwrap_or_default()
}

/// Stock badge: `"Out of Stock"`, `"Available"`, or `"2 of 3 Available"`.
pub fn availability_label(available: u32, total: u32) -> String {
  if available == 0 {
    "Out of Stock".to_owned()
  } else if available == total {
    "Available".to_owned()
  } else {
    format!("{available} of {total} Available")
  }
}

/// Capitalise the first letter of a role name: `"staff"` → `"Staff"`.
pub fn format_role(role: &str) -> String {
  let mut chars = role.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Shorten `text` to at most `len` characters, appending `"..."` when cut.
pub fn truncate(text: &str, len: usize) -> String {
  if text.chars().count() <= len {
    return text.to_owned();
  }
  let mut out: String = text.chars().take(len).collect();
  out.push_str("...");
  out
}
