//! Subcommands, each one a call into [`Library`] plus rendering.

use anyhow::{Context as _, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Subcommand};
use libris_core::{
  backend::LibraryBackend,
  book::{BookId, BookPatch, NewBook},
  dates,
  filter::{self, BookFilter, CategoryFilter, IssueFilter, SearchQuery},
  issue::IssueId,
  library::Library,
  lifecycle::LoanStatus,
  stats,
  user::{NewUser, Role, User, UserId},
};

use crate::{render, settings::SettingsStore};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List the catalogue.
  Books {
    /// Match title, author, ISBN, category or publisher.
    #[arg(long)]
    search:   Option<String>,
    /// Exact category, or `all`.
    #[arg(long, default_value = CategoryFilter::ALL)]
    category: CategoryFilter,
  },
  /// List categories with their title counts.
  Categories,
  /// List users.
  Users {
    #[arg(long)]
    search: Option<String>,
  },
  /// List loans with their live status.
  Issues {
    #[arg(long)]
    search:   Option<String>,
    /// `active`, `overdue` or `returned`.
    #[arg(long)]
    status:   Option<LoanStatus>,
    #[arg(long)]
    user:     Option<UserId>,
    #[arg(long)]
    book:     Option<BookId>,
  },
  /// Dashboard counters.
  Stats,
  /// Lend a book.
  Issue {
    #[arg(long)]
    user: UserId,
    #[arg(long)]
    book: BookId,
    /// RFC 3339 due date; defaults to 14 days from now.
    #[arg(long)]
    due:  Option<DateTime<Utc>>,
  },
  /// Mark a loan returned (admin only).
  Return { issue: IssueId },
  /// Change a user's role (admin only).
  SetRole { user: UserId, role: Role },
  /// Activate or deactivate a user (admin only).
  SetActive {
    user:   UserId,
    #[arg(action = ArgAction::Set)]
    active: bool,
  },
  /// Delete a loan record. Copies are not put back on the shelf.
  DeleteIssue { issue: IssueId },
  /// Add, edit or delete catalogue entries.
  #[command(subcommand)]
  Book(BookCommand),
  /// Register or delete accounts.
  #[command(subcommand)]
  User(UserCommand),
  /// Show or change the acting user's preferences.
  #[command(subcommand)]
  Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
pub enum BookCommand {
  Add {
    title:     String,
    author:    String,
    isbn:      String,
    category:  String,
    #[arg(long, default_value_t = 1)]
    copies:    u32,
    #[arg(long)]
    publisher: Option<String>,
  },
  /// Change only the fields given.
  Edit {
    id:        BookId,
    #[arg(long)]
    title:     Option<String>,
    #[arg(long)]
    author:    Option<String>,
    #[arg(long)]
    isbn:      Option<String>,
    #[arg(long)]
    category:  Option<String>,
    #[arg(long)]
    publisher: Option<String>,
    #[arg(long)]
    total:     Option<u32>,
    #[arg(long)]
    available: Option<u32>,
  },
  /// Removes the book's loans too.
  Delete { id: BookId },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  Add {
    username: String,
    email:    String,
    #[arg(long, env = "LIBRIS_NEW_PASSWORD")]
    password: String,
    #[arg(long, default_value = "")]
    first:    String,
    #[arg(long, default_value = "")]
    last:     String,
    #[arg(long, default_value = "student")]
    role:     Role,
    #[arg(long)]
    phone:    Option<String>,
  },
  /// Removes the user's loans too.
  Delete { id: UserId },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
  Show,
  /// e.g. `settings set policy.issue_limit 3`
  Set { key: String, value: String },
}

/// Who is running the command and where their preferences live.
pub struct Session {
  pub actor:    Option<UserId>,
  pub settings: SettingsStore,
}

impl Session {
  fn actor_id(&self) -> Result<UserId> {
    self
      .actor
      .ok_or_else(|| anyhow!("no acting user; pass --as <USER_ID> or set actor_id"))
  }

  async fn actor<B: LibraryBackend>(&self, lib: &mut Library<B>) -> Result<User> {
    let id = self.actor_id()?;
    lib
      .lookup::<User>(id)
      .await
      .with_context(|| format!("looking up acting user {id}"))
  }
}

fn query(search: Option<String>) -> SearchQuery { SearchQuery::new(search.as_deref().unwrap_or("")) }

/// Run `command` and return what should be printed.
pub async fn run<B: LibraryBackend>(
  lib: &mut Library<B>,
  session: &Session,
  command: Command,
) -> Result<String> {
  match command {
    Command::Books { search, category } => {
      let filter = BookFilter {
        query: query(search),
        category,
      };
      Ok(render::books(&lib.search_books(&filter).await?))
    }
    Command::Categories => Ok(render::categories(&filter::categories(lib.books().await?))),
    Command::Users { search } => {
      let users = lib.search_users(&query(search)).await?;
      Ok(render::users(&users, filter::role_counts(&users)))
    }
    Command::Issues {
      search,
      status,
      user,
      book,
    } => {
      let filter = IssueFilter {
        query: query(search),
        status,
        user,
        book,
        ..Default::default()
      };
      Ok(render::loans(&lib.loan_views(&filter).await?))
    }
    Command::Stats => stats_report(lib, session).await,
    Command::Issue { user, book, due } => {
      let issue = lib.issue_book(user, book, due).await?;
      Ok(render::loan(&issue, "issued"))
    }
    Command::Return { issue } => {
      let actor = session.actor(lib).await?;
      let returned = lib.return_book(&actor, issue).await?;
      Ok(render::loan(&returned, "returned"))
    }
    Command::SetRole { user, role } => {
      let actor = session.actor(lib).await?;
      Ok(render::user(&lib.change_role(&actor, user, role).await?))
    }
    Command::SetActive { user, active } => {
      let actor = session.actor(lib).await?;
      Ok(render::user(&lib.set_active(&actor, user, active).await?))
    }
    Command::DeleteIssue { issue } => {
      lib.delete_issue(issue).await?;
      Ok(format!("issue {issue} deleted"))
    }
    Command::Book(cmd) => book_command(lib, cmd).await,
    Command::User(cmd) => user_command(lib, cmd).await,
    Command::Settings(SettingsCommand::Show) => {
      let settings = session.settings.load(session.actor_id()?)?;
      Ok(toml::to_string_pretty(&settings)?)
    }
    Command::Settings(SettingsCommand::Set { key, value }) => {
      let settings = session.settings.update(session.actor_id()?, &key, &value)?;
      Ok(toml::to_string_pretty(&settings)?)
    }
  }
}

async fn book_command<B: LibraryBackend>(lib: &mut Library<B>, cmd: BookCommand) -> Result<String> {
  match cmd {
    BookCommand::Add {
      title,
      author,
      isbn,
      category,
      copies,
      publisher,
    } => {
      let mut input = NewBook::new(title, author, isbn, category, copies);
      if let Some(publisher) = publisher {
        input = input.with_publisher(publisher);
      }
      Ok(render::book(&lib.create_book(input).await?, "added"))
    }
    BookCommand::Edit {
      id,
      title,
      author,
      isbn,
      category,
      publisher,
      total,
      available,
    } => {
      let patch = BookPatch {
        title,
        author,
        isbn,
        category,
        publisher,
        total_copies: total,
        available_copies: available,
      };
      if patch == BookPatch::default() {
        return Err(anyhow!("nothing to change for book {id}"));
      }
      Ok(render::book(&lib.update_book(id, patch).await?, "updated"))
    }
    BookCommand::Delete { id } => {
      lib.delete_book(id).await?;
      Ok(format!("book {id} deleted"))
    }
  }
}

async fn user_command<B: LibraryBackend>(lib: &mut Library<B>, cmd: UserCommand) -> Result<String> {
  match cmd {
    UserCommand::Add {
      username,
      email,
      password,
      first,
      last,
      role,
      phone,
    } => {
      let input = NewUser {
        username,
        email,
        password,
        first_name: first,
        last_name: last,
        role,
        phone,
      };
      Ok(render::user(&lib.register_user(input).await?))
    }
    UserCommand::Delete { id } => {
      lib.delete_user(id).await?;
      Ok(format!("user {id} deleted"))
    }
  }
}

/// Dashboard counters, plus due-soon and fine estimates from the acting
/// user's preferences when one is configured.
async fn stats_report<B: LibraryBackend>(lib: &mut Library<B>, session: &Session) -> Result<String> {
  let mut out = render::stats(&lib.stats().await?);
  let Some(actor) = session.actor else {
    return Ok(out);
  };

  let prefs = session.settings.load(actor)?;
  let now = lib.now();
  let issues = lib.issues().await?;

  if prefs.notifications.due_reminders {
    let lead = prefs.notifications.reminder_lead_days;
    let soon = stats::due_soon(issues, i64::from(lead), now).len();
    out.push_str(&format!("\nDue within {lead} days: {soon}"));
  }

  let fines: u64 = issues
    .iter()
    .filter(|i| LoanStatus::of(i, now) == LoanStatus::Overdue)
    .map(|i| prefs.policy.fine_for(-dates::days_until_due(i.due_date, now)))
    .sum();
  out.push_str(&format!("\nAccrued fines:   {}", render::money(fines)));
  Ok(out)
}
