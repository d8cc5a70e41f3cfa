//! Async JSON client for the library REST backend.

use std::{collections::HashSet, time::Duration};

use libris_core::{
  Error, Result,
  backend::{EntityKind, LibraryBackend, Page},
  book::{Book, BookId, BookPatch, NewBook},
  issue::{Issue, IssueId, IssuePatch, NewIssue},
  user::{NewUser, User, UserId, UserPatch},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the backend.
#[derive(Debug, Clone)]
pub struct HttpConfig {
  /// Root of the API, e.g. `http://localhost:8000/api`.
  pub base_url: String,
  pub timeout:  Duration,
}

impl HttpConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      timeout:  DEFAULT_TIMEOUT,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

/// [`LibraryBackend`] over HTTP.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  client: Client,
  config: HttpConfig,
}

/// List endpoints answer with a page envelope; a bare array is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
  Page(Page<T>),
  Plain(Vec<T>),
}

fn transport(e: reqwest::Error) -> Error { Error::Transport(e.to_string()) }

impl HttpBackend {
  pub fn new(config: HttpConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(transport)?;
    Ok(Self { client, config })
  }

  /// `/books/` or `/books/{id}/`; the backend insists on the trailing slash.
  fn url(&self, kind: EntityKind, id: Option<i64>) -> String {
    let base = self.config.base_url.trim_end_matches('/');
    match id {
      Some(id) => format!("{base}/{}/{id}/", kind.collection()),
      None => format!("{base}/{}/", kind.collection()),
    }
  }

  /// Send `req` and map a non-success status onto the core error taxonomy.
  async fn send(&self, req: RequestBuilder, kind: EntityKind, id: Option<i64>) -> Result<Response> {
    let resp = req.send().await.map_err(transport)?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(%status, %kind, ?id, %body, "backend refused request");
    Err(match (status, id) {
      (StatusCode::NOT_FOUND, Some(id)) => Error::not_found(kind, id),
      (StatusCode::CONFLICT | StatusCode::BAD_REQUEST, _) => {
        Error::Conflict(refusal_message(status, &body))
      }
      _ => Error::Transport(format!("{} request answered {status}", kind.collection())),
    })
  }

  /// Collect every page of a collection. A `next` link that points back at
  /// a page already fetched ends the walk.
  async fn list<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<Vec<T>> {
    let mut url = self.url(kind, None);
    let mut visited = HashSet::new();
    let mut records = Vec::new();
    loop {
      visited.insert(url.clone());
      tracing::debug!(%kind, %url, "GET page");
      let resp = self.send(self.client.get(&url), kind, None).await?;
      match decode::<ListBody<T>>(resp).await? {
        ListBody::Plain(all) => {
          records.extend(all);
          break;
        }
        ListBody::Page(page) => {
          records.extend(page.results);
          match page.next {
            Some(next) if !visited.contains(&next) => url = next,
            Some(next) => {
              tracing::warn!(%kind, %next, "page links loop back; stopping");
              break;
            }
            None => break,
          }
        }
      }
    }
    Ok(records)
  }

  async fn get<T: DeserializeOwned>(&self, kind: EntityKind, id: i64) -> Result<T> {
    tracing::debug!(%kind, id, "GET");
    let resp = self
      .send(self.client.get(self.url(kind, Some(id))), kind, Some(id))
      .await?;
    decode(resp).await
  }

  async fn post<B: Serialize + Sync, T: DeserializeOwned>(
    &self,
    kind: EntityKind,
    body: &B,
  ) -> Result<T> {
    tracing::debug!(%kind, "POST");
    let resp = self
      .send(self.client.post(self.url(kind, None)).json(body), kind, None)
      .await?;
    decode(resp).await
  }

  async fn patch<B: Serialize + Sync, T: DeserializeOwned>(
    &self,
    kind: EntityKind,
    id: i64,
    body: &B,
  ) -> Result<T> {
    tracing::debug!(%kind, id, "PATCH");
    let resp = self
      .send(self.client.patch(self.url(kind, Some(id))).json(body), kind, Some(id))
      .await?;
    decode(resp).await
  }

  async fn delete(&self, kind: EntityKind, id: i64) -> Result<()> {
    tracing::debug!(%kind, id, "DELETE");
    self
      .send(self.client.delete(self.url(kind, Some(id))), kind, Some(id))
      .await?;
    Ok(())
  }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
  let text = resp.text().await.map_err(transport)?;
  Ok(serde_json::from_str(&text)?)
}

/// The backend's explanation for a refused write: its `detail` or `error`
/// field when the body is a JSON object, otherwise the raw body.
fn refusal_message(status: StatusCode, body: &str) -> String {
  let body = body.trim();
  if body.is_empty() {
    return status.to_string();
  }
  match serde_json::from_str::<Value>(body) {
    Ok(Value::Object(map)) => map
      .get("detail")
      .or_else(|| map.get("error"))
      .and_then(Value::as_str)
      .map(str::to_owned)
      .unwrap_or_else(|| body.to_owned()),
    _ => body.to_owned(),
  }
}

impl LibraryBackend for HttpBackend {
  // ── Books ─────────────────────────────────────────────────────────────

  async fn list_books(&self) -> Result<Vec<Book>> { self.list(EntityKind::Book).await }

  async fn get_book(&self, id: BookId) -> Result<Book> { self.get(EntityKind::Book, id).await }

  async fn create_book(&self, input: NewBook) -> Result<Book> {
    self.post(EntityKind::Book, &input).await
  }

  async fn update_book(&self, id: BookId, patch: BookPatch) -> Result<Book> {
    self.patch(EntityKind::Book, id, &patch).await
  }

  async fn delete_book(&self, id: BookId) -> Result<()> {
    self.delete(EntityKind::Book, id).await
  }

  // ── Users ─────────────────────────────────────────────────────────────

  async fn list_users(&self) -> Result<Vec<User>> { self.list(EntityKind::User).await }

  async fn get_user(&self, id: UserId) -> Result<User> { self.get(EntityKind::User, id).await }

  async fn create_user(&self, input: NewUser) -> Result<User> {
    self.post(EntityKind::User, &input).await
  }

  async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User> {
    self.patch(EntityKind::User, id, &patch).await
  }

  async fn delete_user(&self, id: UserId) -> Result<()> {
    self.delete(EntityKind::User, id).await
  }

  // ── Issues ────────────────────────────────────────────────────────────

  async fn list_issues(&self) -> Result<Vec<Issue>> { self.list(EntityKind::Issue).await }

  async fn get_issue(&self, id: IssueId) -> Result<Issue> {
    self.get(EntityKind::Issue, id).await
  }

  async fn create_issue(&self, input: NewIssue) -> Result<Issue> {
    self.post(EntityKind::Issue, &input).await
  }

  async fn update_issue(&self, id: IssueId, patch: IssuePatch) -> Result<Issue> {
    self.patch(EntityKind::Issue, id, &patch).await
  }

  async fn delete_issue(&self, id: IssueId) -> Result<()> {
    self.delete(EntityKind::Issue, id).await
  }
}
