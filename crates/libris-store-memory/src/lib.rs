//! In-process backend for the Libris core.
//!
//! [`MemoryStore`] enforces the same invariants the REST backend does
//! (availability bounds, decrement on issue, increment on return, terminal
//! returns) and counts every call it receives, which makes it the fixture of
//! choice for exercising [`libris_core::library::Library`].

mod store;

pub use store::{MemoryStore, Op};

#[cfg(test)]
mod tests;
