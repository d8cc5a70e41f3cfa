//! Search and filter composition over cached collections.
//!
//! Every filter yields a stable subsequence of its input: records are never
//! reordered, and applying the same filter to its own output changes nothing.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::{
  book::{Book, BookId},
  issue::EnrichedIssue,
  lifecycle::LoanStatus,
  user::{Role, User, UserId},
};

// ─── Text search ─────────────────────────────────────────────────────────────

/// A record that can be matched against a free-text query.
pub trait Searchable {
  /// The fields the query is matched against, in display order.
  fn search_fields(&self) -> Vec<String>;

  /// All searchable fields joined by a single space and lower-cased.
  fn haystack(&self) -> String { self.search_fields().join(" ").to_lowercase() }
}

impl<T: Searchable + ?Sized> Searchable for &T {
  fn search_fields(&self) -> Vec<String> { (**self).search_fields() }
}

impl Searchable for Book {
  fn search_fields(&self) -> Vec<String> {
    vec![
      self.title.clone(),
      self.author.clone(),
      self.isbn.clone(),
      self.category.clone(),
      self.publisher.clone(),
    ]
  }
}

impl Searchable for User {
  fn search_fields(&self) -> Vec<String> {
    vec![
      self.first_name.clone(),
      self.last_name.clone(),
      self.username.clone(),
      self.email.clone(),
      self.phone.clone(),
      self.role_name(),
    ]
  }
}

impl Searchable for EnrichedIssue {
  fn search_fields(&self) -> Vec<String> {
    let book = self.book_details.as_ref();
    let user = self.user_details.as_ref();
    let field = |v: Option<&String>| v.cloned().unwrap_or_default();
    vec![
      field(book.map(|b| &b.title)),
      field(book.map(|b| &b.author)),
      field(book.map(|b| &b.isbn)),
      self.issue.book.to_string(),
      field(user.map(|u| &u.first_name)),
      field(user.map(|u| &u.last_name)),
      field(user.map(|u| &u.username)),
      field(user.map(|u| &u.email)),
      self.issue.user.to_string(),
    ]
  }
}

/// A normalised free-text query. Blank input means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery(Option<String>);

impl SearchQuery {
  pub fn new(raw: &str) -> Self {
    let normalized = raw.trim().to_lowercase();
    Self((!normalized.is_empty()).then_some(normalized))
  }

  pub fn is_empty(&self) -> bool { self.0.is_none() }

  pub fn as_str(&self) -> Option<&str> { self.0.as_deref() }

  pub fn matches<T: Searchable + ?Sized>(&self, item: &T) -> bool {
    match &self.0 {
      None => true,
      Some(q) => item.haystack().contains(q.as_str()),
    }
  }
}

impl From<&str> for SearchQuery {
  fn from(raw: &str) -> Self { Self::new(raw) }
}

impl From<Option<&str>> for SearchQuery {
  fn from(raw: Option<&str>) -> Self { raw.map(Self::new).unwrap_or_default() }
}

/// The records of `items` matching `query`, in input order.
pub fn search<'a, T: Searchable>(items: &'a [T], query: &SearchQuery) -> Vec<&'a T> {
  items.iter().filter(|item| query.matches(*item)).collect()
}

// ─── Books ───────────────────────────────────────────────────────────────────

/// The catalogue's category select. `"all"` is the pass-through sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(String),
}

impl CategoryFilter {
  pub const ALL: &'static str = "all";

  pub fn matches(&self, book: &Book) -> bool {
    match self {
      Self::All => true,
      Self::Only(category) => book.category == *category,
    }
  }
}

impl FromStr for CategoryFilter {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(if s == Self::ALL {
      Self::All
    } else {
      Self::Only(s.to_owned())
    })
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
  pub query:    SearchQuery,
  pub category: CategoryFilter,
}

impl BookFilter {
  pub fn matches(&self, book: &Book) -> bool {
    self.category.matches(book) && self.query.matches(book)
  }

  pub fn apply<'a>(&self, books: &'a [Book]) -> Vec<&'a Book> {
    books.iter().filter(|b| self.matches(b)).collect()
  }
}

/// One entry of the category select, with the number of titles in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
  pub name:  String,
  pub count: usize,
}

/// Distinct categories in first-seen order.
pub fn categories(books: &[Book]) -> Vec<CategoryCount> {
  let mut out: Vec<CategoryCount> = Vec::new();
  for book in books {
    match out.iter_mut().find(|c| c.name == book.category) {
      Some(entry) => entry.count += 1,
      None => out.push(CategoryCount {
        name:  book.category.clone(),
        count: 1,
      }),
    }
  }
  out
}

// ─── Issues ──────────────────────────────────────────────────────────────────

/// Filters for the issues page. Status is evaluated against the instant
/// passed to [`IssueFilter::apply`], never against a stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
  pub query:    SearchQuery,
  pub returned: Option<bool>,
  pub user:     Option<UserId>,
  pub book:     Option<BookId>,
  pub status:   Option<LoanStatus>,
}

impl IssueFilter {
  pub fn matches(&self, issue: &EnrichedIssue, now: DateTime<Utc>) -> bool {
    let record = &issue.issue;
    self.returned.is_none_or(|r| record.returned == r)
      && self.user.is_none_or(|u| record.user == u)
      && self.book.is_none_or(|b| record.book == b)
      && self
        .status
        .is_none_or(|s| LoanStatus::of(record, now) == s)
      && self.query.matches(issue)
  }

  pub fn apply<'a>(
    &self,
    issues: &'a [EnrichedIssue],
    now: DateTime<Utc>,
  ) -> Vec<&'a EnrichedIssue> {
    issues.iter().filter(|i| self.matches(i, now)).collect()
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// Head counts for the users page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCounts {
  pub student:    usize,
  pub staff:      usize,
  pub external:   usize,
  pub unassigned: usize,
}

pub fn role_counts(users: &[User]) -> RoleCounts {
  users.iter().fold(RoleCounts::default(), |mut acc, u| {
    match u.role {
      Some(Role::Student) => acc.student += 1,
      Some(Role::Staff) => acc.staff += 1,
      Some(Role::External) => acc.external += 1,
      None => acc.unassigned += 1,
    }
    acc
  })
}
