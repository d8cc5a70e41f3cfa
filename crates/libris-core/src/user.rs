//! Library members and staff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumIter, EnumString};

pub type UserId = i64;

/// Membership category. Accounts created outside the registration form
/// (e.g. a backend superuser) may carry no role at all.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
  Student,
  Staff,
  External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:           UserId,
  pub username:     String,
  #[serde(default)]
  pub email:        String,
  #[serde(default)]
  pub first_name:   String,
  #[serde(default)]
  pub last_name:    String,
  #[serde(default, deserialize_with = "blank_role")]
  pub role:         Option<Role>,
  #[serde(default)]
  pub phone:        String,
  pub is_active:    bool,
  #[serde(default)]
  pub is_staff:     bool,
  #[serde(default)]
  pub is_superuser: bool,
  pub date_joined:  DateTime<Utc>,
}

impl User {
  /// `"First Last"`, falling back to the username when both are blank.
  pub fn display_name(&self) -> String {
    let full = format!("{} {}", self.first_name, self.last_name);
    let full = full.trim();
    if full.is_empty() {
      self.username.clone()
    } else {
      full.to_owned()
    }
  }

  pub fn role_name(&self) -> String {
    self.role.map(|r| r.to_string()).unwrap_or_default()
  }
}

/// The backend stores roles as a free `CharField`; treat `""` as unset.
fn blank_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<String>::deserialize(deserializer)?;
  match raw.as_deref().map(str::trim) {
    None | Some("") => Ok(None),
    Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
  }
}

/// Registration form input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
  pub username:   String,
  pub email:      String,
  pub password:   String,
  pub first_name: String,
  pub last_name:  String,
  pub role:       Role,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone:      Option<String>,
}

/// Profile, role and activation edits. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role:       Option<Role>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_active:  Option<bool>,
}

impl UserPatch {
  pub fn role(role: Role) -> Self {
    Self {
      role: Some(role),
      ..Default::default()
    }
  }

  pub fn active(is_active: bool) -> Self {
    Self {
      is_active: Some(is_active),
      ..Default::default()
    }
  }

  /// Applies every field except `password`, which the backend hashes and
  /// never echoes back.
  pub fn apply_to(self, user: &mut User) {
    if let Some(v) = self.username {
      user.username = v;
    }
    if let Some(v) = self.email {
      user.email = v;
    }
    if let Some(v) = self.first_name {
      user.first_name = v;
    }
    if let Some(v) = self.last_name {
      user.last_name = v;
    }
    if let Some(v) = self.role {
      user.role = Some(v);
    }
    if let Some(v) = self.phone {
      user.phone = v;
    }
    if let Some(v) = self.is_active {
      user.is_active = v;
    }
  }
}
