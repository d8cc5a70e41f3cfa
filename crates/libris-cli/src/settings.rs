//! Per-user display preferences, kept as one TOML file per user id.
//!
//! Nothing here is enforced by the loan engine; the backend owns the real
//! policy.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use libris_core::user::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub notifications: NotificationPrefs,
  pub policy:        LibraryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPrefs {
  pub due_reminders:      bool,
  pub system_alerts:      bool,
  /// How many days ahead a loan counts as "due soon".
  pub reminder_lead_days: u32,
}

impl Default for NotificationPrefs {
  fn default() -> Self {
    Self {
      due_reminders:      true,
      system_alerts:      true,
      reminder_lead_days: 3,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryPolicy {
  pub loan_period_days:   u32,
  pub fine_per_day_cents: u32,
  pub issue_limit:        u32,
}

impl Default for LibraryPolicy {
  fn default() -> Self {
    Self {
      loan_period_days:   14,
      fine_per_day_cents: 25,
      issue_limit:        5,
    }
  }
}

impl LibraryPolicy {
  /// The fine, in cents, a loan would carry after `days_overdue` days.
  pub fn fine_for(&self, days_overdue: i64) -> u64 {
    u64::try_from(days_overdue).unwrap_or(0) * u64::from(self.fine_per_day_cents)
  }
}

impl Settings {
  /// The dotted keys accepted by [`Settings::set`].
  pub const KEYS: [&'static str; 6] = [
    "notifications.due_reminders",
    "notifications.system_alerts",
    "notifications.reminder_lead_days",
    "policy.loan_period_days",
    "policy.fine_per_day_cents",
    "policy.issue_limit",
  ];

  /// Set one field from its dotted key and textual value.
  pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
      "notifications.due_reminders" => self.notifications.due_reminders = parse(key, value)?,
      "notifications.system_alerts" => self.notifications.system_alerts = parse(key, value)?,
      "notifications.reminder_lead_days" => {
        self.notifications.reminder_lead_days = parse(key, value)?
      }
      "policy.loan_period_days" => {
        let days: u32 = parse(key, value)?;
        if days == 0 {
          bail!("policy.loan_period_days must be at least 1");
        }
        self.policy.loan_period_days = days;
      }
      "policy.fine_per_day_cents" => self.policy.fine_per_day_cents = parse(key, value)?,
      "policy.issue_limit" => self.policy.issue_limit = parse(key, value)?,
      _ => bail!("unknown setting {key:?}; expected one of {}", Self::KEYS.join(", ")),
    }
    Ok(())
  }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
  T::Err: std::error::Error + Send + Sync + 'static,
{
  value
    .parse()
    .with_context(|| format!("invalid value {value:?} for {key}"))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Reads and writes `user-<id>.toml` files under one directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
  dir: PathBuf,
}

impl SettingsStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  pub fn dir(&self) -> &Path { &self.dir }

  fn path(&self, user: UserId) -> PathBuf { self.dir.join(format!("user-{user}.toml")) }

  /// The user's settings; defaults when nothing was saved yet.
  pub fn load(&self, user: UserId) -> Result<Settings> {
    let path = self.path(user);
    if !path.exists() {
      return Ok(Settings::default());
    }
    let raw = std::fs::read_to_string(&path)
      .with_context(|| format!("reading settings file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing settings file {}", path.display()))
  }

  pub fn save(&self, user: UserId, settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(&self.dir)
      .with_context(|| format!("creating settings directory {}", self.dir.display()))?;
    let path = self.path(user);
    let raw = toml::to_string_pretty(settings).context("serialising settings")?;
    std::fs::write(&path, raw).with_context(|| format!("writing settings file {}", path.display()))?;
    tracing::debug!(user, path = %path.display(), "settings saved");
    Ok(())
  }

  /// Load, change one key, save. Nothing is written if the change is
  /// rejected.
  pub fn update(&self, user: UserId, key: &str, value: &str) -> Result<Settings> {
    let mut settings = self.load(user)?;
    settings.set(key, value)?;
    self.save(user, &settings)?;
    Ok(settings)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_store() -> SettingsStore {
    SettingsStore::new(std::env::temp_dir().join(format!("libris-settings-{}", uuid::Uuid::new_v4())))
  }

  #[test]
  fn missing_file_yields_defaults() {
    let store = temp_store();
    let settings = store.load(4).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.policy.loan_period_days, 14);
  }

  #[test]
  fn update_persists_per_user() {
    let store = temp_store();
    store.update(4, "policy.issue_limit", "9").unwrap();
    store.update(4, "notifications.due_reminders", "false").unwrap();

    let reloaded = store.load(4).unwrap();
    assert_eq!(reloaded.policy.issue_limit, 9);
    assert!(!reloaded.notifications.due_reminders);
    assert_eq!(store.load(5).unwrap(), Settings::default(), "other users untouched");

    std::fs::remove_dir_all(store.dir()).ok();
  }

  #[test]
  fn rejected_values_are_not_saved() {
    let store = temp_store();
    assert!(store.update(1, "policy.issue_limit", "many").is_err());
    assert!(store.update(1, "policy.loan_period_days", "0").is_err());
    assert!(store.update(1, "theme", "dark").is_err());
    assert!(!store.dir().exists());
  }

  #[test]
  fn partial_file_fills_in_defaults() {
    let parsed: Settings = toml::from_str("[policy]\nissue_limit = 2\n").unwrap();
    assert_eq!(parsed.policy.issue_limit, 2);
    assert_eq!(parsed.policy.loan_period_days, 14);
    assert!(parsed.notifications.system_alerts);
  }

  #[test]
  fn fines_accrue_per_overdue_day() {
    let policy = LibraryPolicy::default();
    assert_eq!(policy.fine_for(4), 100);
    assert_eq!(policy.fine_for(0), 0);
    assert_eq!(policy.fine_for(-3), 0);
  }
}
