//! A seeded in-memory library for `--offline`.

use chrono::{TimeDelta, Utc};
use libris_core::{
  book::NewBook,
  user::{NewUser, Role, UserId},
};
use libris_store_memory::MemoryStore;

pub struct Demo {
  pub store:     MemoryStore,
  /// The staff account offline commands act as by default.
  pub librarian: UserId,
}

fn person(username: &str, first: &str, last: &str, role: Role) -> NewUser {
  NewUser {
    username:   username.into(),
    email:      format!("{username}@library.test"),
    password:   "demo".into(),
    first_name: first.into(),
    last_name:  last.into(),
    role,
    phone:      None,
  }
}

pub fn seed() -> Demo {
  let store = MemoryStore::new();
  let now = Utc::now();
  let days = TimeDelta::days;

  let dune = store.seed_book(
    NewBook::new("Dune", "Frank Herbert", "9780441013593", "Fiction", 3).with_publisher("Ace"),
  );
  let emma = store.seed_book(
    NewBook::new("Emma", "Jane Austen", "9780141439587", "Fiction", 1)
      .with_publisher("Penguin Classics"),
  );
  let cosmos = store.seed_book(
    NewBook::new("Cosmos", "Carl Sagan", "9780345539434", "Science", 2)
      .with_publisher("Ballantine"),
  );
  store.seed_book(
    NewBook::new("The Selfish Gene", "Richard Dawkins", "9780198788607", "Science", 2)
      .with_publisher("Oxford University Press"),
  );
  store.seed_book(
    NewBook::new("SPQR", "Mary Beard", "9781631492228", "History", 1).with_publisher("Liveright"),
  );

  let librarian = store.seed_user(person("librarian", "Grace", "Hopper", Role::Staff));
  let student = store.seed_user(person("ada", "Ada", "Lovelace", Role::Student));
  let visitor = store.seed_user(person("alan", "Alan", "Turing", Role::External));

  store.seed_issue(student.id, dune.id, now - days(5), now + days(9), false);
  store.seed_issue(visitor.id, emma.id, now - days(20), now - days(6), false);
  store.seed_issue(student.id, cosmos.id, now - days(30), now - days(16), true);
  store.seed_issue(visitor.id, cosmos.id, now - days(12), now + days(2), false);

  tracing::debug!("seeded offline demo library");
  Demo {
    store,
    librarian: librarian.id,
  }
}
