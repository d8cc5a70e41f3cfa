//! [`Library`], the loan lifecycle engine.
//!
//! `Library` is the explicit context a UI shell passes around: it owns the
//! backend handle, the snapshot cache and the clock. Reads go through the
//! cache; mutations are validated locally, sent to the backend, and the
//! returned record is merged back. A failed mutation invalidates what it
//! touched so the next read re-fetches instead of showing a guess.
//!
//! Nothing is retried automatically: issuing twice must not lend two copies.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  backend::{EntityKind, LibraryBackend},
  book::{Book, BookId, BookPatch, NewBook},
  cache::{Record, SnapshotCache},
  filter::{BookFilter, IssueFilter, SearchQuery, search},
  guard::{self, Mutation},
  issue::{EnrichedIssue, Issue, IssueId, NewIssue},
  lifecycle::{self, LoanView},
  stats::DashboardStats,
  user::{NewUser, Role, User, UserId, UserPatch},
};

/// Source of the current instant.
pub type Clock = fn() -> DateTime<Utc>;

// ─── Collection ──────────────────────────────────────────────────────────────

/// A cached record type together with the backend calls that load it.
pub trait Collection: Record {
  fn list<B: LibraryBackend>(backend: &B) -> impl Future<Output = Result<Vec<Self>>> + Send + '_;

  fn fetch<B: LibraryBackend>(
    backend: &B,
    id: i64,
  ) -> impl Future<Output = Result<Self>> + Send + '_;
}

impl Collection for Book {
  fn list<B: LibraryBackend>(backend: &B) -> impl Future<Output = Result<Vec<Self>>> + Send + '_ {
    backend.list_books()
  }

  fn fetch<B: LibraryBackend>(backend: &B, id: i64) -> impl Future<Output = Result<Self>> + Send + '_ {
    backend.get_book(id)
  }
}

impl Collection for User {
  fn list<B: LibraryBackend>(backend: &B) -> impl Future<Output = Result<Vec<Self>>> + Send + '_ {
    backend.list_users()
  }

  fn fetch<B: LibraryBackend>(backend: &B, id: i64) -> impl Future<Output = Result<Self>> + Send + '_ {
    backend.get_user(id)
  }
}

impl Collection for Issue {
  fn list<B: LibraryBackend>(backend: &B) -> impl Future<Output = Result<Vec<Self>>> + Send + '_ {
    backend.list_issues()
  }

  fn fetch<B: LibraryBackend>(backend: &B, id: i64) -> impl Future<Output = Result<Self>> + Send + '_ {
    backend.get_issue(id)
  }
}

// ─── Library ─────────────────────────────────────────────────────────────────

pub struct Library<B> {
  backend: B,
  cache:   SnapshotCache,
  clock:   Clock,
}

impl<B: LibraryBackend> Library<B> {
  pub fn new(backend: B) -> Self {
    Self {
      backend,
      cache: SnapshotCache::new(),
      clock: Utc::now,
    }
  }

  /// Replace the wall clock, e.g. with a fixed instant in tests.
  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  pub fn now(&self) -> DateTime<Utc> { (self.clock)() }

  pub fn cache(&self) -> &SnapshotCache { &self.cache }

  /// Forget a cached collection, e.g. when the view showing it is replaced.
  pub fn invalidate(&mut self, kind: EntityKind) { self.cache.invalidate(kind); }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The cached collection of `T`, fetching it first if it is not loaded.
  pub async fn snapshot<T: Collection>(&mut self) -> Result<&[T]> {
    if !self.cache.is_loaded::<T>() {
      self.reload::<T>().await?;
    }
    Ok(self.cache.get::<T>().unwrap_or(&[]))
  }

  /// Re-fetch `T`'s collection unconditionally.
  pub async fn reload<T: Collection>(&mut self) -> Result<()> {
    let ticket = self.cache.begin::<T>();
    tracing::debug!(kind = %T::KIND, "fetching collection");
    let records = T::list(&self.backend).await?;
    self.cache.complete(ticket, records);
    Ok(())
  }

  pub async fn books(&mut self) -> Result<&[Book]> { self.snapshot().await }

  pub async fn users(&mut self) -> Result<&[User]> { self.snapshot().await }

  pub async fn issues(&mut self) -> Result<&[Issue]> { self.snapshot().await }

  /// A single record, from the snapshot when present, otherwise from the
  /// backend (and merged into the snapshot).
  pub async fn lookup<T: Collection>(&mut self, id: i64) -> Result<T> {
    self.snapshot::<T>().await?;
    if let Some(found) = self.cache.find::<T>(id) {
      return Ok(found.clone());
    }
    let fetched = T::fetch(&self.backend, id).await?;
    self.cache.merge(fetched.clone());
    Ok(fetched)
  }

  pub async fn search_books(&mut self, filter: &BookFilter) -> Result<Vec<Book>> {
    let books = self.books().await?;
    Ok(filter.apply(books).into_iter().cloned().collect())
  }

  pub async fn search_users(&mut self, query: &SearchQuery) -> Result<Vec<User>> {
    let users = self.users().await?;
    Ok(search(users, query).into_iter().cloned().collect())
  }

  /// Issues joined with their books and borrowers.
  pub async fn enriched_issues(&mut self) -> Result<Vec<EnrichedIssue>> {
    self.snapshot::<Book>().await?;
    self.snapshot::<User>().await?;
    self.snapshot::<Issue>().await?;
    Ok(lifecycle::enrich(
      self.cache.get::<Issue>().unwrap_or(&[]),
      self.cache.get::<Book>().unwrap_or(&[]),
      self.cache.get::<User>().unwrap_or(&[]),
    ))
  }

  /// Display rows for the loans matching `filter`, with status computed as
  /// of now.
  pub async fn loan_views(&mut self, filter: &IssueFilter) -> Result<Vec<LoanView>> {
    let now = self.now();
    let enriched = self.enriched_issues().await?;
    Ok(
      filter
        .apply(&enriched, now)
        .into_iter()
        .map(|e| LoanView::new(e, now))
        .collect(),
    )
  }

  pub async fn stats(&mut self) -> Result<DashboardStats> {
    let now = self.now();
    self.snapshot::<Book>().await?;
    self.snapshot::<User>().await?;
    self.snapshot::<Issue>().await?;
    Ok(DashboardStats::compute(
      self.cache.get::<Book>().unwrap_or(&[]),
      self.cache.get::<User>().unwrap_or(&[]),
      self.cache.get::<Issue>().unwrap_or(&[]),
      now,
    ))
  }

  // ── Loans ─────────────────────────────────────────────────────────────

  /// Lend `book` to `user`, due at `due` or two weeks from now.
  ///
  /// Refused locally, without a create call, when the cached book has no
  /// copies left or `due` is in the past. On success the book is re-read
  /// from the backend so the snapshot shows the new availability.
  pub async fn issue_book(
    &mut self,
    user: UserId,
    book: BookId,
    due: Option<DateTime<Utc>>,
  ) -> Result<Issue> {
    let due_date = lifecycle::resolve_due_date(due, self.now())?;
    let target = self.lookup::<Book>(book).await?;
    if let Err(e) = lifecycle::ensure_issuable(&target) {
      tracing::warn!(book, user, "issue refused: no copies available");
      return Err(e);
    }

    let result = self
      .backend
      .create_issue(NewIssue {
        user,
        book,
        due_date: Some(due_date),
      })
      .await;
    let issue = self.settle(result, &[EntityKind::Book, EntityKind::Issue])?;
    tracing::info!(issue = issue.id, user, book, due = %issue.due_date, "book issued");

    self.cache.merge(issue.clone());
    self.refresh_book(book).await;
    Ok(issue)
  }

  /// Mark a loan returned. Admin only; the guard runs before any backend
  /// call. A loan that is already returned is refused with
  /// [`Error::InvalidState`].
  pub async fn return_book(&mut self, actor: &User, id: IssueId) -> Result<Issue> {
    guard::authorize(actor, Mutation::ReturnLoan)?;
    let issue = self.lookup::<Issue>(id).await?;
    if let Err(e) = lifecycle::ensure_returnable(&issue) {
      tracing::warn!(issue = id, "return refused: loan already returned");
      return Err(e);
    }

    let result = self.backend.mark_returned(id).await;
    let returned = self.settle(result, &[EntityKind::Book, EntityKind::Issue])?;
    tracing::info!(issue = id, actor = actor.id, book = returned.book, "book returned");

    self.cache.merge(returned.clone());
    self.refresh_book(returned.book).await;
    Ok(returned)
  }

  pub async fn delete_issue(&mut self, id: IssueId) -> Result<()> {
    let result = self.backend.delete_issue(id).await;
    self.settle(result, &[EntityKind::Issue])?;
    self.cache.evict::<Issue>(id);
    Ok(())
  }

  // ── Books ─────────────────────────────────────────────────────────────

  pub async fn create_book(&mut self, input: NewBook) -> Result<Book> {
    let result = self.backend.create_book(input).await;
    let book = self.settle(result, &[EntityKind::Book])?;
    tracing::info!(book = book.id, title = %book.title, "book created");
    self.cache.merge(book.clone());
    Ok(book)
  }

  pub async fn update_book(&mut self, id: BookId, patch: BookPatch) -> Result<Book> {
    let result = self.backend.update_book(id, patch).await;
    let book = self.settle(result, &[EntityKind::Book])?;
    self.cache.merge(book.clone());
    Ok(book)
  }

  /// Deleting a book also removes its loans on the backend, so the issue
  /// snapshot is dropped as well.
  pub async fn delete_book(&mut self, id: BookId) -> Result<()> {
    let result = self.backend.delete_book(id).await;
    self.settle(result, &[EntityKind::Book])?;
    tracing::info!(book = id, "book deleted");
    self.cache.evict::<Book>(id);
    self.cache.invalidate(EntityKind::Issue);
    Ok(())
  }

  // ── Users ─────────────────────────────────────────────────────────────

  pub async fn register_user(&mut self, input: NewUser) -> Result<User> {
    let result = self.backend.create_user(input).await;
    let user = self.settle(result, &[EntityKind::User])?;
    tracing::info!(user = user.id, username = %user.username, "user registered");
    self.cache.merge(user.clone());
    Ok(user)
  }

  /// Apply a profile edit. Patches that touch `role` or `is_active` are
  /// admin only.
  pub async fn update_profile(
    &mut self,
    actor: &User,
    id: UserId,
    patch: UserPatch,
  ) -> Result<User> {
    if patch.role.is_some() {
      guard::authorize(actor, Mutation::ChangeRole { target: id })?;
    }
    if patch.is_active.is_some() {
      guard::authorize(actor, Mutation::SetActive { target: id })?;
    }
    let result = self.backend.update_user(id, patch).await;
    let user = self.settle(result, &[EntityKind::User])?;
    self.cache.merge(user.clone());
    Ok(user)
  }

  pub async fn change_role(&mut self, actor: &User, id: UserId, role: Role) -> Result<User> {
    let user = self.update_profile(actor, id, UserPatch::role(role)).await?;
    tracing::info!(user = id, actor = actor.id, %role, "role changed");
    Ok(user)
  }

  /// Soft-enable or soft-disable an account.
  pub async fn set_active(&mut self, actor: &User, id: UserId, active: bool) -> Result<User> {
    let user = self.update_profile(actor, id, UserPatch::active(active)).await?;
    tracing::info!(user = id, actor = actor.id, active, "activation changed");
    Ok(user)
  }

  /// Deleting a user also removes their loans on the backend.
  pub async fn delete_user(&mut self, id: UserId) -> Result<()> {
    let result = self.backend.delete_user(id).await;
    self.settle(result, &[EntityKind::User])?;
    tracing::info!(user = id, "user deleted");
    self.cache.evict::<User>(id);
    self.cache.invalidate(EntityKind::Issue);
    Ok(())
  }

  // ── Internals ─────────────────────────────────────────────────────────

  /// Pass a backend result through, invalidating `touched` on failure.
  fn settle<T>(&mut self, result: Result<T>, touched: &[EntityKind]) -> Result<T> {
    if let Err(e) = &result {
      match e {
        Error::Conflict(_) => tracing::warn!(error = %e, "backend rejected mutation"),
        _ => tracing::error!(error = %e, "mutation failed"),
      }
      for kind in touched {
        self.cache.invalidate(*kind);
      }
    }
    result
  }

  /// Re-read one book after a loan changed its availability. Failure only
  /// drops the book snapshot; the loan mutation itself already succeeded.
  async fn refresh_book(&mut self, id: BookId) {
    match self.backend.get_book(id).await {
      Ok(book) => self.cache.merge(book),
      Err(e) => {
        tracing::warn!(book = id, error = %e, "could not refresh book after loan change");
        self.cache.invalidate(EntityKind::Book);
      }
    }
  }
}
