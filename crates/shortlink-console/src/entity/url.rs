use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shortlink_client::error::Result;
use shortlink_client::{EntityId, ShortUrl, ShortUrlDraft, ShortUrlPatch, ShortlinkApiClient};

use super::{Entity, EntityApi};
use crate::cache::EntityKind;

impl Entity for ShortUrl {
    const KIND: EntityKind = EntityKind::Url;

    type Draft = ShortUrlDraft;
    type Patch = ShortUrlPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn provisional(draft: &ShortUrlDraft, id: EntityId, now: DateTime<Utc>) -> Self {
        ShortUrl {
            id,
            short_code: draft.short_code.clone().unwrap_or_default(),
            original_url: draft.original_url.clone(),
            title: draft.title.clone(),
            namespace: draft.namespace,
            click_count: 0,
            is_active: true,
            created_at: now,
            expires_at: None,
        }
    }

    fn apply_patch(&mut self, patch: &ShortUrlPatch) {
        if let Some(original_url) = &patch.original_url {
            self.original_url = original_url.clone();
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(short_code) = &patch.short_code {
            self.short_code = short_code.clone();
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
    }
}

/// Short URL endpoints
#[derive(Clone)]
pub struct UrlApi {
    api: ShortlinkApiClient,
}

impl UrlApi {
    pub fn new(api: ShortlinkApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EntityApi<ShortUrl> for UrlApi {
    async fn create(&self, draft: &ShortUrlDraft) -> Result<ShortUrl> {
        self.api.url_create(draft).await
    }

    async fn update(&self, id: &EntityId, patch: &ShortUrlPatch) -> Result<ShortUrl> {
        self.api.url_update(id, patch).await
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        self.api.url_delete(id).await
    }
}
