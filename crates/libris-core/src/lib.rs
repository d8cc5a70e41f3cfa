//! Core types and loan rules for the Libris library dashboard.
//!
//! No HTTP lives here. The crate holds the domain records, the pure
//! date/status and filter functions, the role guard, and the
//! [`Library`](library::Library) engine that drives any
//! [`LibraryBackend`](backend::LibraryBackend).

pub mod backend;
pub mod book;
pub mod cache;
pub mod dates;
pub mod error;
pub mod filter;
pub mod guard;
pub mod issue;
pub mod library;
pub mod lifecycle;
pub mod stats;
pub mod user;

pub use error::{Error, Result, ValidationError};
