//! Role-gated mutations.
//!
//! The check runs before any backend call so a denied action never costs a
//! round trip. It is advisory: the backend must enforce the same rule.

use crate::{Result, ValidationError, user::{Role, User, UserId}};

/// Mutations that only an admin may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
  ReturnLoan,
  ChangeRole { target: UserId },
  SetActive { target: UserId },
}

impl Mutation {
  /// The message shown to a user who is refused.
  pub fn denial(&self) -> &'static str {
    match self {
      Self::ReturnLoan => "Only admins can mark books as returned",
      Self::ChangeRole { .. } => "Only admins can change user roles",
      Self::SetActive { .. } => "Only admins can activate or deactivate users",
    }
  }
}

pub fn is_admin(user: &User) -> bool {
  user.is_staff || user.is_superuser || user.role == Some(Role::Staff)
}

/// Refuse `mutation` unless `actor` is an admin. Role changes and activation
/// toggles are gated whoever the target is, the actor's own account
/// included.
pub fn authorize(actor: &User, mutation: Mutation) -> Result<()> {
  if is_admin(actor) {
    return Ok(());
  }
  tracing::warn!(actor = actor.id, ?mutation, "mutation denied");
  Err(ValidationError::NotAdmin { action: mutation }.into())
}
