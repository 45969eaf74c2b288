//! Client model types
//!
//! This module defines data structures used by the client for API requests and responses.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Identifier of an entity.
///
/// Rows confirmed by the server carry the integer primary key; rows synthesized
/// locally before confirmation carry a `temp-...` placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Server(u64),
    Temp(String),
}

impl EntityId {
    /// Generate a fresh placeholder id (`temp-<millis>-<random>`).
    pub fn temporary() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect();
        EntityId::Temp(format!(
            "temp-{}-{}",
            Utc::now().timestamp_millis(),
            suffix.to_lowercase()
        ))
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, EntityId::Temp(_))
    }

    /// The server primary key, if this id has been assigned by the server.
    pub fn as_server(&self) -> Option<u64> {
        match self {
            EntityId::Server(id) => Some(*id),
            EntityId::Temp(_) => None,
        }
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId::Server(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Server(id) => write!(f, "{}", id),
            EntityId::Temp(id) => f.write_str(id),
        }
    }
}

/// List endpoint payload: either a bare array or a paginated page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Items(Vec<T>),
    Page {
        results: Vec<T>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
    },
}

impl<T> ListResponse<T> {
    /// Total number of items reported by the server, falling back to the page length.
    pub fn total(&self) -> u64 {
        match self {
            ListResponse::Items(items) => items.len() as u64,
            ListResponse::Page { results, count, .. } => {
                count.unwrap_or(results.len() as u64)
            }
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Items(items) => items,
            ListResponse::Page { results, .. } => results,
        }
    }
}

/// Error body returned by the server.
///
/// Accepted shapes: `{error}`, `{detail}`, `{<field>: [messages]}` and
/// `{non_field_errors: [...]}`. Anything else is kept verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApiErrorBody {
    raw: serde_json::Value,
}

const NON_FIELD_KEY: &str = "non_field_errors";
const GENERIC_KEYS: [&str; 2] = ["error", "detail"];

impl ApiErrorBody {
    pub fn from_json(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    /// Parse a response body; non-JSON bodies are kept as a plain string.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(raw) => Self { raw },
            Err(_) => Self {
                raw: serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
            },
        }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    /// First validation message: a named field such as `{"name": ["already taken"]}`,
    /// then `non_field_errors`.
    pub fn field_message(&self) -> Option<String> {
        let map = self.raw.as_object()?;
        map.iter()
            .filter(|(key, _)| {
                key.as_str() != NON_FIELD_KEY && !GENERIC_KEYS.contains(&key.as_str())
            })
            .find_map(|(_, value)| first_message(value))
            .or_else(|| map.get(NON_FIELD_KEY).and_then(first_message))
    }

    /// Generic server message: `error`, then `detail`.
    pub fn generic_message(&self) -> Option<String> {
        let map = self.raw.as_object()?;
        GENERIC_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(first_message))
    }

    /// User-facing message: field message, generic message, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.field_message()
            .or_else(|| self.generic_message())
            .unwrap_or_else(|| fallback.to_string())
    }
}

fn first_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(first_message),
        _ => None,
    }
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

// ============== Auth ==============

#[derive(Clone, Debug, Deserialize)]
pub struct CsrfResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Role of a user inside an organization
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Editor,
    Viewer,
}

// ============== Organizations ==============

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub namespace_count: u64,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct OrganizationDraft {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct OrganizationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub user: User,
    pub role: Role,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Expired,
    Revoked,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: u64,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub status: InvitationStatus,
    pub organization: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct InvitationDraft {
    pub email: String,
    pub role: Role,
}

// ============== Namespaces ==============

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization: u64,
    #[serde(default)]
    pub url_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NamespaceDraft {
    pub organization: u64,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NamespacePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============== Short URLs ==============

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShortUrl {
    pub id: EntityId,
    #[serde(default)]
    pub short_code: String,
    pub original_url: String,
    #[serde(default)]
    pub title: String,
    pub namespace: u64,
    #[serde(default)]
    pub click_count: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ShortUrlDraft {
    pub namespace: u64,
    pub original_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_code: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ShortUrlPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyClicks {
    pub date: NaiveDate,
    pub clicks: u64,
}

/// Click analytics for a single short URL
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickStats {
    pub total_clicks: u64,
    #[serde(default)]
    pub unique_clicks: u64,
    #[serde(default)]
    pub daily: Vec<DailyClicks>,
}
