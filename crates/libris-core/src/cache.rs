//! Per-collection snapshot cache with a stale-response guard.
//!
//! The cache holds the last fetched copy of each collection. It is never the
//! source of truth: mutations merge the record the backend returned, and
//! failures invalidate the collection so the next read re-fetches it.
//!
//! Fetches are correlated with a [`FetchTicket`]. Any later fetch,
//! invalidation or merge for the same collection supersedes outstanding
//! tickets, and a superseded ticket's result is discarded instead of
//! overwriting newer data.

use crate::{
  backend::EntityKind,
  book::Book,
  issue::Issue,
  user::User,
};

/// A record type that has a slot in the [`SnapshotCache`].
pub trait Record: Clone + Send + Sync + 'static {
  const KIND: EntityKind;

  fn id(&self) -> i64;

  #[doc(hidden)]
  fn slot(cache: &SnapshotCache) -> &Slot<Self>;

  #[doc(hidden)]
  fn slot_mut(cache: &mut SnapshotCache) -> &mut Slot<Self>;
}

macro_rules! impl_record {
  ($ty:ty, $kind:expr, $field:ident) => {
    impl Record for $ty {
      const KIND: EntityKind = $kind;

      fn id(&self) -> i64 { self.id }

      fn slot(cache: &SnapshotCache) -> &Slot<Self> { &cache.$field }

      fn slot_mut(cache: &mut SnapshotCache) -> &mut Slot<Self> { &mut cache.$field }
    }
  };
}

impl_record!(Book, EntityKind::Book, books);
impl_record!(User, EntityKind::User, users);
impl_record!(Issue, EntityKind::Issue, issues);

/// Correlates a fetch with the cache state it was started against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
  kind: EntityKind,
  seq:  u64,
}

impl FetchTicket {
  pub fn kind(&self) -> EntityKind { self.kind }
}

#[doc(hidden)]
#[derive(Debug)]
pub struct Slot<T> {
  snapshot: Option<Vec<T>>,
  /// Sequence number of the newest ticket or write for this collection.
  latest:   u64,
}

impl<T> Default for Slot<T> {
  fn default() -> Self {
    Self {
      snapshot: None,
      latest:   0,
    }
  }
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
  books:    Slot<Book>,
  users:    Slot<User>,
  issues:   Slot<Issue>,
  sequence: u64,
}

impl SnapshotCache {
  pub fn new() -> Self { Self::default() }

  fn next_seq(&mut self) -> u64 {
    self.sequence += 1;
    self.sequence
  }

  /// The cached collection, if one has been loaded since the last
  /// invalidation.
  pub fn get<T: Record>(&self) -> Option<&[T]> { T::slot(self).snapshot.as_deref() }

  pub fn is_loaded<T: Record>(&self) -> bool { self.get::<T>().is_some() }

  pub fn find<T: Record>(&self, id: i64) -> Option<&T> {
    self.get::<T>()?.iter().find(|r| r.id() == id)
  }

  /// Start a fetch of `T`'s collection. Supersedes any fetch already in
  /// flight for it.
  pub fn begin<T: Record>(&mut self) -> FetchTicket {
    let seq = self.next_seq();
    T::slot_mut(self).latest = seq;
    FetchTicket {
      kind: T::KIND,
      seq,
    }
  }

  /// Apply a completed fetch. Returns `false`, leaving the cache untouched,
  /// when the ticket has been superseded.
  pub fn complete<T: Record>(&mut self, ticket: FetchTicket, records: Vec<T>) -> bool {
    let slot = T::slot_mut(self);
    if ticket.kind != T::KIND || ticket.seq != slot.latest {
      tracing::debug!(kind = %T::KIND, ticket = ticket.seq, latest = slot.latest, "discarding stale fetch");
      return false;
    }
    slot.snapshot = Some(records);
    true
  }

  /// Drop the cached collection so the next read re-fetches it.
  pub fn invalidate(&mut self, kind: EntityKind) {
    let seq = self.next_seq();
    match kind {
      EntityKind::Book => reset(&mut self.books, seq),
      EntityKind::User => reset(&mut self.users, seq),
      EntityKind::Issue => reset(&mut self.issues, seq),
    }
    tracing::debug!(%kind, "snapshot invalidated");
  }

  pub fn invalidate_all(&mut self) {
    self.invalidate(EntityKind::Book);
    self.invalidate(EntityKind::User);
    self.invalidate(EntityKind::Issue);
  }

  /// Insert or replace a record the backend just returned. A collection
  /// that is not loaded stays unloaded. Outstanding fetches are superseded
  /// since they may predate the write.
  pub fn merge<T: Record>(&mut self, record: T) {
    let seq = self.next_seq();
    let slot = T::slot_mut(self);
    slot.latest = seq;
    if let Some(records) = slot.snapshot.as_mut() {
      match records.iter_mut().find(|r| r.id() == record.id()) {
        Some(existing) => *existing = record,
        None => records.push(record),
      }
    }
  }

  /// Remove a deleted record from the loaded snapshot.
  pub fn evict<T: Record>(&mut self, id: i64) {
    let seq = self.next_seq();
    let slot = T::slot_mut(self);
    slot.latest = seq;
    if let Some(records) = slot.snapshot.as_mut() {
      records.retain(|r| r.id() != id);
    }
  }
}

fn reset<T>(slot: &mut Slot<T>, seq: u64) {
  slot.snapshot = None;
  slot.latest = seq;
}
