//! Book records and their create/update variants.

use serde::{Deserialize, Serialize};

use crate::dates;

pub type BookId = i64;

/// A title in the catalogue. `available_copies` is owned by the backend: it
/// drops on issue and rises on return, and the client only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
  pub id:               BookId,
  pub title:            String,
  pub author:           String,
  pub isbn:             String,
  pub category:         String,
  pub publisher:        String,
  pub total_copies:     u32,
  pub available_copies: u32,
}

impl Book {
  pub fn is_available(&self) -> bool { self.available_copies > 0 }

  /// Badge text for the catalogue, e.g. `"2 of 3 Available"`.
  pub fn availability_label(&self) -> String {
    dates::availability_label(self.available_copies, self.total_copies)
  }
}

/// Input to [`crate::backend::LibraryBackend::create_book`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
  pub title:            String,
  pub author:           String,
  pub isbn:             String,
  pub category:         String,
  pub publisher:        String,
  pub total_copies:     u32,
  pub available_copies: u32,
}

impl NewBook {
  /// A book with every copy on the shelf.
  pub fn new(
    title: impl Into<String>,
    author: impl Into<String>,
    isbn: impl Into<String>,
    category: impl Into<String>,
    copies: u32,
  ) -> Self {
    Self {
      title:            title.into(),
      author:           author.into(),
      isbn:             isbn.into(),
      category:         category.into(),
      publisher:        String::new(),
      total_copies:     copies,
      available_copies: copies,
    }
  }

  pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
    self.publisher = publisher.into();
    self
  }
}

/// Partial update sent as a `PATCH` body; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:            Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub isbn:             Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category:         Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub publisher:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_copies:     Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub available_copies: Option<u32>,
}

impl BookPatch {
  pub fn apply_to(self, book: &mut Book) {
    if let Some(v) = self.title {
      book.title = v;
    }
    if let Some(v) = self.author {
      book.author = v;
    }
    if let Some(v) = self.isbn {
      book.isbn = v;
    }
    if let Some(v) = self.category {
      book.category = v;
    }
    if let Some(v) = self.publisher {
      book.publisher = v;
    }
    if let Some(v) = self.total_copies {
      book.total_copies = v;
    }
    if let Some(v) = self.available_copies {
      book.available_copies = v;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_serializes_only_present_fields() {
    let patch = BookPatch {
      total_copies: Some(4),
      ..Default::default()
    };
    let json = serde_json::to_value(&patch).unwrap();
    assert_eq!(json, serde_json::json!({ "total_copies": 4 }));
  }

  #[test]
  fn deserializes_backend_record() {
    let book: Book = serde_json::from_value(serde_json::json!({
      "id": 7,
      "title": "Dune",
      "author": "Frank Herbert",
      "isbn": "9780441013593",
      "category": "Fiction",
      "publisher": "Ace",
      "total_copies": 3,
      "available_copies": 1
    }))
    .unwrap();
    assert_eq!(book.id, 7);
    assert!(book.is_available());
    assert_eq!(book.availability_label(), "1 of 3 Available");
  }
}
