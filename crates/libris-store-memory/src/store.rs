//! [`MemoryStore`]: the in-process implementation of [`LibraryBackend`].

use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, TimeDelta, Utc};
use libris_core::{
  Error, Result,
  backend::{EntityKind, LibraryBackend},
  book::{Book, BookId, BookPatch, NewBook},
  issue::{Issue, IssueId, IssuePatch, NewIssue},
  library::Clock,
  lifecycle::DEFAULT_LOAN_DAYS,
  user::{NewUser, User, UserId, UserPatch},
};

// ─── Call log ────────────────────────────────────────────────────────────────

/// One backend operation, as counted by [`MemoryStore::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
  ListBooks,
  GetBook,
  CreateBook,
  UpdateBook,
  DeleteBook,
  ListUsers,
  GetUser,
  CreateUser,
  UpdateUser,
  DeleteUser,
  ListIssues,
  GetIssue,
  CreateIssue,
  UpdateIssue,
  DeleteIssue,
}

impl Op {
  pub fn is_write(self) -> bool {
    !matches!(
      self,
      Self::ListBooks
        | Self::GetBook
        | Self::ListUsers
        | Self::GetUser
        | Self::ListIssues
        | Self::GetIssue
    )
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Table<T> {
  rows:    BTreeMap<i64, T>,
  next_id: i64,
}

impl<T: Clone> Table<T> {
  fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> T {
    self.next_id += 1;
    let row = build(self.next_id);
    self.rows.insert(self.next_id, row.clone());
    row
  }

  fn get(&self, kind: EntityKind, id: i64) -> Result<&T> {
    self.rows.get(&id).ok_or_else(|| Error::not_found(kind, id))
  }

  fn get_mut(&mut self, kind: EntityKind, id: i64) -> Result<&mut T> {
    self.rows.get_mut(&id).ok_or_else(|| Error::not_found(kind, id))
  }

  fn all(&self) -> Vec<T> { self.rows.values().cloned().collect() }
}

impl<T> Default for Table<T> {
  fn default() -> Self {
    Self {
      rows:    BTreeMap::new(),
      next_id: 0,
    }
  }
}

#[derive(Debug, Default)]
struct State {
  books:   Table<Book>,
  users:   Table<User>,
  issues:  Table<Issue>,
  calls:   HashMap<Op, usize>,
  offline: bool,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An in-memory library backend.
///
/// Clones share the same tables and call log.
#[derive(Clone)]
pub struct MemoryStore {
  state: Arc<Mutex<State>>,
  clock: Clock,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(State::default())),
      clock: Utc::now,
    }
  }

  /// Use `clock` for server-assigned timestamps.
  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Count `op` and fail with a transport error while offline.
  fn enter(&self, op: Op) -> Result<MutexGuard<'_, State>> {
    let mut state = self.lock();
    *state.calls.entry(op).or_default() += 1;
    if state.offline {
      tracing::debug!(?op, "memory store offline");
      return Err(Error::Transport("backend unreachable".into()));
    }
    Ok(state)
  }

  // ── Test and demo helpers ─────────────────────────────────────────────
  //
  // Seeding bypasses the call log.

  pub fn seed_book(&self, input: NewBook) -> Book {
    let mut state = self.lock();
    state.books.insert_with(|id| book_from(id, input))
  }

  pub fn seed_user(&self, input: NewUser) -> User {
    let now = (self.clock)();
    let mut state = self.lock();
    state.users.insert_with(|id| user_from(id, input, now))
  }

  /// A backend superuser: no role, both admin flags set.
  pub fn seed_superuser(&self, username: &str) -> User {
    let now = (self.clock)();
    let mut state = self.lock();
    state.users.insert_with(|id| User {
      id,
      username: username.to_owned(),
      email: String::new(),
      first_name: String::new(),
      last_name: String::new(),
      role: None,
      phone: String::new(),
      is_active: true,
      is_staff: true,
      is_superuser: true,
      date_joined: now,
    })
  }

  /// Record a historical loan with explicit dates. An unreturned loan takes
  /// a copy off the shelf, as a real issue would.
  pub fn seed_issue(
    &self,
    user: UserId,
    book: BookId,
    issue_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    returned: bool,
  ) -> Issue {
    let mut state = self.lock();
    if !returned
      && let Some(b) = state.books.rows.get_mut(&book)
    {
      b.available_copies = b.available_copies.saturating_sub(1);
    }
    state.issues.insert_with(|id| Issue {
      id,
      user,
      book,
      issue_date,
      due_date,
      returned,
    })
  }

  /// Simulate losing the connection: every call fails with
  /// [`Error::Transport`] until switched back.
  pub fn set_offline(&self, offline: bool) { self.lock().offline = offline; }

  /// How many times `op` has been called.
  pub fn calls(&self, op: Op) -> usize { self.lock().calls.get(&op).copied().unwrap_or(0) }

  pub fn total_calls(&self) -> usize { self.lock().calls.values().sum() }

  pub fn write_calls(&self) -> usize {
    self
      .lock()
      .calls
      .iter()
      .filter(|(op, _)| op.is_write())
      .map(|(_, n)| n)
      .sum()
  }

  /// The stored copy of a book, bypassing the call log.
  pub fn peek_book(&self, id: BookId) -> Option<Book> { self.lock().books.rows.get(&id).cloned() }

  pub fn peek_issue(&self, id: IssueId) -> Option<Issue> {
    self.lock().issues.rows.get(&id).cloned()
  }
}

fn book_from(id: BookId, input: NewBook) -> Book {
  Book {
    id,
    title: input.title,
    author: input.author,
    isbn: input.isbn,
    category: input.category,
    publisher: input.publisher,
    total_copies: input.total_copies,
    available_copies: input.available_copies,
  }
}

fn user_from(id: UserId, input: NewUser, joined: DateTime<Utc>) -> User {
  User {
    id,
    username: input.username,
    email: input.email,
    first_name: input.first_name,
    last_name: input.last_name,
    role: Some(input.role),
    phone: input.phone.unwrap_or_default(),
    is_active: true,
    is_staff: false,
    is_superuser: false,
    date_joined: joined,
  }
}

fn check_copies(book: &Book) -> Result<()> {
  if book.available_copies > book.total_copies {
    return Err(Error::Conflict(format!(
      "available_copies ({}) cannot exceed total_copies ({})",
      book.available_copies, book.total_copies
    )));
  }
  Ok(())
}

fn check_unique_isbn(state: &State, isbn: &str, except: Option<BookId>) -> Result<()> {
  let taken = state
    .books
    .rows
    .values()
    .any(|b| b.isbn == isbn && Some(b.id) != except);
  if taken {
    return Err(Error::Conflict(format!("book with isbn {isbn} already exists")));
  }
  Ok(())
}

fn check_unique_username(state: &State, username: &str, except: Option<UserId>) -> Result<()> {
  let taken = state
    .users
    .rows
    .values()
    .any(|u| u.username == username && Some(u.id) != except);
  if taken {
    return Err(Error::Conflict(format!("username {username} is already taken")));
  }
  Ok(())
}

impl LibraryBackend for MemoryStore {
  // ── Books ─────────────────────────────────────────────────────────────

  async fn list_books(&self) -> Result<Vec<Book>> {
    let state = self.enter(Op::ListBooks)?;
    Ok(state.books.all())
  }

  async fn get_book(&self, id: BookId) -> Result<Book> {
    let state = self.enter(Op::GetBook)?;
    state.books.get(EntityKind::Book, id).cloned()
  }

  async fn create_book(&self, input: NewBook) -> Result<Book> {
    let mut state = self.enter(Op::CreateBook)?;
    check_unique_isbn(&state, &input.isbn, None)?;
    check_copies(&book_from(0, input.clone()))?;
    Ok(state.books.insert_with(|id| book_from(id, input)))
  }

  async fn update_book(&self, id: BookId, patch: BookPatch) -> Result<Book> {
    let mut state = self.enter(Op::UpdateBook)?;
    let mut updated = state.books.get(EntityKind::Book, id)?.clone();
    patch.apply_to(&mut updated);
    check_copies(&updated)?;
    check_unique_isbn(&state, &updated.isbn, Some(id))?;
    *state.books.get_mut(EntityKind::Book, id)? = updated.clone();
    Ok(updated)
  }

  async fn delete_book(&self, id: BookId) -> Result<()> {
    let mut state = self.enter(Op::DeleteBook)?;
    state.books.get(EntityKind::Book, id)?;
    state.books.rows.remove(&id);
    state.issues.rows.retain(|_, i| i.book != id);
    Ok(())
  }

  // ── Users ─────────────────────────────────────────────────────────────

  async fn list_users(&self) -> Result<Vec<User>> {
    let state = self.enter(Op::ListUsers)?;
    Ok(state.users.all())
  }

  async fn get_user(&self, id: UserId) -> Result<User> {
    let state = self.enter(Op::GetUser)?;
    state.users.get(EntityKind::User, id).cloned()
  }

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let now = (self.clock)();
    let mut state = self.enter(Op::CreateUser)?;
    check_unique_username(&state, &input.username, None)?;
    Ok(state.users.insert_with(|id| user_from(id, input, now)))
  }

  async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User> {
    let mut state = self.enter(Op::UpdateUser)?;
    if let Some(username) = &patch.username {
      check_unique_username(&state, username, Some(id))?;
    }
    let user = state.users.get_mut(EntityKind::User, id)?;
    patch.apply_to(user);
    Ok(user.clone())
  }

  async fn delete_user(&self, id: UserId) -> Result<()> {
    let mut state = self.enter(Op::DeleteUser)?;
    state.users.get(EntityKind::User, id)?;
    state.users.rows.remove(&id);
    state.issues.rows.retain(|_, i| i.user != id);
    Ok(())
  }

  // ── Issues ────────────────────────────────────────────────────────────

  async fn list_issues(&self) -> Result<Vec<Issue>> {
    let state = self.enter(Op::ListIssues)?;
    Ok(state.issues.all())
  }

  async fn get_issue(&self, id: IssueId) -> Result<Issue> {
    let state = self.enter(Op::GetIssue)?;
    state.issues.get(EntityKind::Issue, id).cloned()
  }

  async fn create_issue(&self, input: NewIssue) -> Result<Issue> {
    let now = (self.clock)();
    let mut state = self.enter(Op::CreateIssue)?;
    state.users.get(EntityKind::User, input.user)?;
    let book = state.books.get_mut(EntityKind::Book, input.book)?;
    if book.available_copies == 0 {
      return Err(Error::Conflict(format!(
        "no copies of book {} are available",
        book.id
      )));
    }
    let due_date = input
      .due_date
      .unwrap_or(now + TimeDelta::days(DEFAULT_LOAN_DAYS));
    if due_date < now {
      return Err(Error::Conflict("due date precedes issue date".into()));
    }
    book.available_copies -= 1;

    Ok(state.issues.insert_with(|id| Issue {
      id,
      user: input.user,
      book: input.book,
      issue_date: now,
      due_date,
      returned: false,
    }))
  }

  async fn update_issue(&self, id: IssueId, patch: IssuePatch) -> Result<Issue> {
    let mut state = self.enter(Op::UpdateIssue)?;
    let mut updated = state.issues.get(EntityKind::Issue, id)?.clone();

    if updated.returned && patch != IssuePatch::default() {
      return Err(Error::Conflict(format!("issue {id} has already been returned")));
    }
    if let Some(due) = patch.due_date {
      if due < updated.issue_date {
        return Err(Error::Conflict("due date precedes issue date".into()));
      }
      updated.due_date = due;
    }
    let returning = patch.returned == Some(true);
    if returning {
      updated.returned = true;
      if let Some(book) = state.books.rows.get_mut(&updated.book) {
        book.available_copies = (book.available_copies + 1).min(book.total_copies);
      }
    }

    *state.issues.get_mut(EntityKind::Issue, id)? = updated.clone();
    Ok(updated)
  }

  async fn delete_issue(&self, id: IssueId) -> Result<()> {
    let mut state = self.enter(Op::DeleteIssue)?;
    state.issues.get(EntityKind::Issue, id)?;
    state.issues.rows.remove(&id);
    Ok(())
  }
}
