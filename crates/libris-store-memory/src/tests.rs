//! Loan lifecycle tests for `Library` driving a `MemoryStore`.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use libris_core::{
  Error, ValidationError,
  backend::{EntityKind, LibraryBackend},
  book::{Book, BookPatch, NewBook},
  filter::{BookFilter, IssueFilter, SearchQuery},
  guard::Mutation,
  library::Library,
  lifecycle::LoanStatus,
  user::{NewUser, Role, User},
};

use crate::{MemoryStore, Op};

fn fixed_now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap() }

fn store() -> MemoryStore { MemoryStore::new().with_clock(fixed_now) }

fn library(store: &MemoryStore) -> Library<MemoryStore> {
  Library::new(store.clone()).with_clock(fixed_now)
}

fn new_user(username: &str, role: Role) -> NewUser {
  NewUser {
    username:   username.into(),
    email:      format!("{username}@example.com"),
    password:   "hunter2".into(),
    first_name: username.into(),
    last_name:  "Tester".into(),
    role,
    phone:      None,
  }
}

struct Fixture {
  store:  MemoryStore,
  member: User,
  admin:  User,
  scarce: Book,
  plenty: Book,
}

fn fixture() -> Fixture {
  let store = store();
  let member = store.seed_user(new_user("ada", Role::Student));
  let admin = store.seed_user(new_user("grace", Role::Staff));
  let mut scarce = NewBook::new("Dune", "Frank Herbert", "9780441013593", "Fiction", 3);
  scarce.available_copies = 1;
  let scarce = store.seed_book(scarce.with_publisher("Ace"));
  let plenty = store.seed_book(NewBook::new("Cosmos", "Carl Sagan", "9780345539434", "Science", 2));
  Fixture {
    store,
    member,
    admin,
    scarce,
    plenty,
  }
}

// ─── Issuing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn issue_then_return_reaches_terminal_state() {
  let f = fixture();
  let mut lib = library(&f.store);

  let issue = lib.issue_book(f.member.id, f.plenty.id, None).await.unwrap();
  assert_eq!(LoanStatus::of(&issue, lib.now()), LoanStatus::Active);
  assert_eq!(issue.due_date - issue.issue_date, TimeDelta::days(14));
  assert_eq!(f.store.peek_book(f.plenty.id).unwrap().available_copies, 1);

  let returned = lib.return_book(&f.admin, issue.id).await.unwrap();
  assert!(returned.returned);
  assert_eq!(LoanStatus::of(&returned, lib.now()), LoanStatus::Returned);
  assert_eq!(f.store.peek_book(f.plenty.id).unwrap().available_copies, 2);
}

#[tokio::test]
async fn last_copy_cannot_be_issued_twice() {
  let f = fixture();
  let mut lib = library(&f.store);

  lib.issue_book(f.member.id, f.scarce.id, None).await.unwrap();
  assert_eq!(f.store.calls(Op::CreateIssue), 1);
  assert_eq!(
    lib.cache().find::<Book>(f.scarce.id).unwrap().available_copies,
    0,
    "snapshot reflects the backend's count after the issue"
  );

  let calls_before = f.store.total_calls();
  let err = lib
    .issue_book(f.admin.id, f.scarce.id, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Validation(ValidationError::NoCopiesAvailable { .. })
  ));
  assert_eq!(f.store.calls(Op::CreateIssue), 1);
  assert_eq!(f.store.total_calls(), calls_before, "no network call at all");
}

#[tokio::test]
async fn explicit_due_date_is_sent_to_backend() {
  let f = fixture();
  let mut lib = library(&f.store);
  let due = fixed_now() + TimeDelta::days(3);

  let issue = lib.issue_book(f.member.id, f.plenty.id, Some(due)).await.unwrap();
  assert_eq!(issue.due_date, due);
}

#[tokio::test]
async fn past_due_date_is_refused_before_any_call() {
  let f = fixture();
  let mut lib = library(&f.store);

  let err = lib
    .issue_book(f.member.id, f.plenty.id, Some(fixed_now() - TimeDelta::days(1)))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Validation(ValidationError::DueBeforeIssue { .. })
  ));
  assert_eq!(f.store.total_calls(), 0);
}

#[tokio::test]
async fn issuing_an_unknown_book_is_not_found() {
  let f = fixture();
  let mut lib = library(&f.store);

  let err = lib.issue_book(f.member.id, 999, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::NotFound {
      kind: EntityKind::Book,
      id: 999
    }
  ));
  assert_eq!(f.store.calls(Op::CreateIssue), 0);
}

#[tokio::test]
async fn backend_rejection_invalidates_snapshots() {
  let f = fixture();
  let mut lib = library(&f.store);
  lib.books().await.unwrap();

  // Another client takes the last copy behind our back.
  f.store
    .create_issue(libris_core::issue::NewIssue {
      user:     f.admin.id,
      book:     f.scarce.id,
      due_date: None,
    })
    .await
    .unwrap();

  let err = lib.issue_book(f.member.id, f.scarce.id, None).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
  assert!(!lib.cache().is_loaded::<Book>());

  // The next read sees the backend's count and refuses locally.
  let creates = f.store.calls(Op::CreateIssue);
  let err = lib.issue_book(f.member.id, f.scarce.id, None).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert_eq!(f.store.calls(Op::CreateIssue), creates);
}

// ─── Returning ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_admin_return_makes_no_backend_call() {
  let f = fixture();
  let loan = f.store.seed_issue(
    f.member.id,
    f.plenty.id,
    fixed_now() - TimeDelta::days(3),
    fixed_now() + TimeDelta::days(11),
    false,
  );
  let mut lib = library(&f.store);

  let err = lib.return_book(&f.member, loan.id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Validation(ValidationError::NotAdmin {
      action: Mutation::ReturnLoan
    })
  ));
  assert_eq!(err.to_string(), "Only admins can mark books as returned");
  assert_eq!(f.store.total_calls(), 0);
  assert_eq!(f.store.write_calls(), 0);
  assert!(!f.store.peek_issue(loan.id).unwrap().returned);
}

#[tokio::test]
async fn second_return_is_invalid_state_and_changes_nothing() {
  let f = fixture();
  let mut lib = library(&f.store);

  let issue = lib.issue_book(f.member.id, f.scarce.id, None).await.unwrap();
  lib.return_book(&f.admin, issue.id).await.unwrap();
  let copies = f.store.peek_book(f.scarce.id).unwrap().available_copies;
  let updates = f.store.calls(Op::UpdateIssue);

  let err = lib.return_book(&f.admin, issue.id).await.unwrap_err();
  assert!(matches!(err, Error::InvalidState(id) if id == issue.id));
  assert_eq!(f.store.calls(Op::UpdateIssue), updates);
  assert_eq!(f.store.peek_book(f.scarce.id).unwrap().available_copies, copies);
  assert!(f.store.peek_issue(issue.id).unwrap().returned);
}

#[tokio::test]
async fn racing_return_surfaces_backend_conflict() {
  let f = fixture();
  let loan = f.store.seed_issue(
    f.member.id,
    f.scarce.id,
    fixed_now() - TimeDelta::days(1),
    fixed_now() + TimeDelta::days(13),
    false,
  );
  let mut lib = library(&f.store);
  lib.issues().await.unwrap();

  // Someone else returns it after our snapshot was taken.
  f.store.mark_returned(loan.id).await.unwrap();

  let err = lib.return_book(&f.admin, loan.id).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
  assert!(!lib.cache().is_loaded::<libris_core::issue::Issue>());
  assert_eq!(
    f.store.peek_book(f.scarce.id).unwrap().available_copies,
    1,
    "returned exactly once"
  );
}

#[tokio::test]
async fn superuser_without_role_may_return() {
  let f = fixture();
  let root = f.store.seed_superuser("root");
  let loan = f.store.seed_issue(
    f.member.id,
    f.plenty.id,
    fixed_now() - TimeDelta::days(20),
    fixed_now() - TimeDelta::days(6),
    false,
  );
  let mut lib = library(&f.store);

  let returned = lib.return_book(&root, loan.id).await.unwrap();
  assert!(returned.returned);
}

// ─── Derived views ───────────────────────────────────────────────────────────

#[tokio::test]
async fn overdue_loan_reads_minus_one_day() {
  let f = fixture();
  f.store.seed_issue(
    f.member.id,
    f.plenty.id,
    fixed_now() - TimeDelta::days(15),
    fixed_now() - TimeDelta::days(1),
    false,
  );
  let mut lib = library(&f.store);

  let views = lib.loan_views(&IssueFilter::default()).await.unwrap();
  assert_eq!(views.len(), 1);
  assert_eq!(views[0].status, LoanStatus::Overdue);
  assert_eq!(views[0].days_until_due, -1);
  assert_eq!(views[0].book_title, "Cosmos");
  assert_eq!(views[0].borrower, "ada Tester");
}

#[tokio::test]
async fn stats_are_recomputed_from_snapshots() {
  let f = fixture();
  f.store.seed_issue(
    f.member.id,
    f.plenty.id,
    fixed_now() - TimeDelta::days(15),
    fixed_now() - TimeDelta::days(1),
    false,
  );
  let mut lib = library(&f.store);
  lib.issue_book(f.admin.id, f.scarce.id, None).await.unwrap();

  let stats = lib.stats().await.unwrap();
  assert_eq!(stats.total_books, 2);
  assert_eq!(stats.total_users, 2);
  assert_eq!(stats.total_issues, 2);
  assert_eq!(stats.active_issues, 2);
  assert_eq!(stats.overdue_issues, 1);
  assert_eq!(stats.available_books, 1);
}

#[tokio::test]
async fn searching_books_by_category_text() {
  let f = fixture();
  let mut lib = library(&f.store);

  let hits = lib
    .search_books(&BookFilter {
      query: SearchQuery::new("fiction"),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].id, f.scarce.id);
}

#[tokio::test]
async fn reads_are_served_from_the_snapshot() {
  let f = fixture();
  let mut lib = library(&f.store);

  lib.books().await.unwrap();
  lib.books().await.unwrap();
  lib.search_books(&BookFilter::default()).await.unwrap();
  assert_eq!(f.store.calls(Op::ListBooks), 1);

  lib.invalidate(EntityKind::Book);
  lib.books().await.unwrap();
  assert_eq!(f.store.calls(Op::ListBooks), 2);
}

#[tokio::test]
async fn transport_failure_is_reported_and_not_retried() {
  let f = fixture();
  let mut lib = library(&f.store);
  lib.books().await.unwrap();
  f.store.set_offline(true);

  let err = lib.issue_book(f.member.id, f.plenty.id, None).await.unwrap_err();
  assert!(matches!(err, Error::Transport(_)));
  assert_eq!(f.store.calls(Op::CreateIssue), 1);
  assert!(!lib.cache().is_loaded::<Book>());

  f.store.set_offline(false);
  assert_eq!(f.store.peek_book(f.plenty.id).unwrap().available_copies, 2);
}

// ─── Catalogue ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn created_records_join_loaded_snapshots_without_relisting() {
  let f = fixture();
  let mut lib = library(&f.store);
  lib.books().await.unwrap();
  lib.users().await.unwrap();

  let book = lib
    .create_book(NewBook::new("Emma", "Jane Austen", "9780141439587", "Fiction", 1))
    .await
    .unwrap();
  let user = lib.register_user(new_user("linus", Role::External)).await.unwrap();

  assert_eq!(lib.books().await.unwrap().len(), 3);
  assert_eq!(lib.cache().find::<Book>(book.id).unwrap().title, "Emma");
  assert_eq!(lib.users().await.unwrap().len(), 3);
  assert_eq!(lib.cache().find::<User>(user.id).unwrap().username, "linus");
  assert_eq!(f.store.calls(Op::ListBooks), 1);
  assert_eq!(f.store.calls(Op::ListUsers), 1);
}

#[tokio::test]
async fn deleting_a_book_drops_it_and_its_loans() {
  let f = fixture();
  f.store.seed_issue(
    f.member.id,
    f.scarce.id,
    fixed_now() - TimeDelta::days(3),
    fixed_now() + TimeDelta::days(11),
    false,
  );
  let mut lib = library(&f.store);
  lib.books().await.unwrap();
  assert_eq!(lib.issues().await.unwrap().len(), 1);

  lib.delete_book(f.scarce.id).await.unwrap();
  assert!(lib.cache().find::<Book>(f.scarce.id).is_none());
  assert!(lib.cache().is_loaded::<Book>());
  assert!(!lib.cache().is_loaded::<libris_core::issue::Issue>());
  assert!(lib.issues().await.unwrap().is_empty());
  assert_eq!(f.store.calls(Op::ListIssues), 2);
}

#[tokio::test]
async fn overfull_book_edit_is_a_conflict_and_drops_the_snapshot() {
  let f = fixture();
  let mut lib = library(&f.store);
  lib.books().await.unwrap();

  let err = lib
    .update_book(f.plenty.id, BookPatch {
      available_copies: Some(3),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)), "{err:?}");
  assert!(!lib.cache().is_loaded::<Book>());
  assert_eq!(f.store.peek_book(f.plenty.id).unwrap().available_copies, 2);
}

#[tokio::test]
async fn book_edit_is_merged_into_the_snapshot() {
  let f = fixture();
  let mut lib = library(&f.store);
  lib.books().await.unwrap();

  lib
    .update_book(f.plenty.id, BookPatch {
      total_copies: Some(4),
      available_copies: Some(4),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(lib.cache().find::<Book>(f.plenty.id).unwrap().total_copies, 4);
  assert_eq!(f.store.calls(Op::ListBooks), 1);
}

#[tokio::test]
async fn deleting_an_issue_does_not_restock() {
  let f = fixture();
  let mut lib = library(&f.store);
  let issue = lib.issue_book(f.member.id, f.scarce.id, None).await.unwrap();
  lib.issues().await.unwrap();

  lib.delete_issue(issue.id).await.unwrap();
  assert!(lib.issues().await.unwrap().is_empty());
  assert!(f.store.peek_issue(issue.id).is_none());
  assert_eq!(f.store.peek_book(f.scarce.id).unwrap().available_copies, 0);
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn role_change_is_admin_only() {
  let f = fixture();
  let mut lib = library(&f.store);

  let err = lib
    .change_role(&f.member, f.member.id, Role::Staff)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Validation(ValidationError::NotAdmin { .. })
  ));
  assert_eq!(f.store.total_calls(), 0);

  let promoted = lib.change_role(&f.admin, f.member.id, Role::Staff).await.unwrap();
  assert_eq!(promoted.role, Some(Role::Staff));
}

#[tokio::test]
async fn deactivation_is_admin_only_and_soft() {
  let f = fixture();
  let mut lib = library(&f.store);
  lib.users().await.unwrap();

  assert!(lib.set_active(&f.member, f.admin.id, false).await.is_err());
  assert_eq!(f.store.calls(Op::UpdateUser), 0);

  let disabled = lib.set_active(&f.admin, f.member.id, false).await.unwrap();
  assert!(!disabled.is_active);
  let cached = lib.cache().find::<User>(f.member.id).unwrap();
  assert!(!cached.is_active, "merged into the snapshot");
  assert_eq!(lib.users().await.unwrap().len(), 2, "still listed");
}

#[tokio::test]
async fn plain_profile_edit_needs_no_admin() {
  let f = fixture();
  let mut lib = library(&f.store);

  let patch = libris_core::user::UserPatch {
    phone: Some("555-0199".into()),
    ..Default::default()
  };
  let user = lib.update_profile(&f.member, f.member.id, patch).await.unwrap();
  assert_eq!(user.phone, "555-0199");
}

#[tokio::test]
async fn deleting_a_user_drops_their_loans() {
  let f = fixture();
  f.store.seed_issue(
    f.member.id,
    f.plenty.id,
    fixed_now() - TimeDelta::days(2),
    fixed_now() + TimeDelta::days(12),
    false,
  );
  let mut lib = library(&f.store);
  assert_eq!(lib.issues().await.unwrap().len(), 1);

  lib.delete_user(f.member.id).await.unwrap();
  assert!(lib.cache().find::<User>(f.member.id).is_none());
  assert!(lib.issues().await.unwrap().is_empty());
}

// ─── Backend invariants ──────────────────────────────────────────────────────

#[tokio::test]
async fn store_rejects_copies_above_total() {
  let s = store();
  let book = s.seed_book(NewBook::new("Emma", "Jane Austen", "1", "Fiction", 2));
  let err = s
    .update_book(book.id, BookPatch {
      available_copies: Some(5),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
  assert_eq!(s.peek_book(book.id).unwrap().available_copies, 2);
}

#[tokio::test]
async fn store_rejects_duplicate_isbn_and_username() {
  let s = store();
  s.create_book(NewBook::new("Emma", "Jane Austen", "42", "Fiction", 1))
    .await
    .unwrap();
  let dup = s
    .create_book(NewBook::new("Persuasion", "Jane Austen", "42", "Fiction", 1))
    .await;
  assert!(matches!(dup, Err(Error::Conflict(_))));

  s.create_user(new_user("ada", Role::Student)).await.unwrap();
  let dup = s.create_user(new_user("ada", Role::External)).await;
  assert!(matches!(dup, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn returned_loan_cannot_be_reopened() {
  let s = store();
  let user = s.seed_user(new_user("ada", Role::Student));
  let book = s.seed_book(NewBook::new("Emma", "Jane Austen", "1", "Fiction", 1));
  let loan = s
    .create_issue(libris_core::issue::NewIssue {
      user:     user.id,
      book:     book.id,
      due_date: None,
    })
    .await
    .unwrap();
  s.mark_returned(loan.id).await.unwrap();

  let reopen = s
    .update_issue(loan.id, libris_core::issue::IssuePatch {
      returned: Some(false),
      due_date: None,
    })
    .await;
  assert!(matches!(reopen, Err(Error::Conflict(_))));
  assert_eq!(s.peek_book(book.id).unwrap().available_copies, 1);
}

#[tokio::test]
async fn missing_ids_are_not_found() {
  let s = store();
  assert!(matches!(
    s.get_issue(3).await,
    Err(Error::NotFound {
      kind: EntityKind::Issue,
      id: 3
    })
  ));
  assert!(matches!(s.delete_user(8).await, Err(Error::NotFound { .. })));
}
