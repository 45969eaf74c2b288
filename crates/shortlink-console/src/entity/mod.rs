//! Entity kinds managed by the console
//!
//! Each kind supplies what the generic mutation engine needs: how to address
//! its collection, how to synthesize a provisional row from a draft, how to
//! merge a patch locally and the three network calls behind [`EntityApi`].

mod namespace;
mod organization;
mod url;

pub use namespace::NamespaceApi;
pub use organization::OrganizationApi;
pub use url::UrlApi;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shortlink_client::EntityId;
use shortlink_client::error::Result;

use crate::cache::{CacheKey, EntityKind};

pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Fields sent on create
    type Draft: Send + Sync + 'static;
    /// Partial fields sent on update
    type Patch: Send + Sync + 'static;

    fn id(&self) -> &EntityId;

    /// Local stand-in for a row the server has not confirmed yet.
    /// Derived counters start at zero.
    fn provisional(draft: &Self::Draft, id: EntityId, now: DateTime<Utc>) -> Self;

    fn apply_patch(&mut self, patch: &Self::Patch);

    fn cache_key(scope: Option<u64>) -> CacheKey {
        CacheKey::collection(Self::KIND, scope)
    }
}

/// Network calls behind a mutation
#[async_trait]
pub trait EntityApi<T: Entity>: Send + Sync {
    async fn create(&self, draft: &T::Draft) -> Result<T>;

    async fn update(&self, id: &EntityId, patch: &T::Patch) -> Result<T>;

    async fn delete(&self, id: &EntityId) -> Result<()>;
}
