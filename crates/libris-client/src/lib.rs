//! HTTP implementation of [`libris_core::backend::LibraryBackend`].

mod client;

pub use client::{DEFAULT_TIMEOUT, HttpBackend, HttpConfig};
