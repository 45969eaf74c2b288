use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shortlink_client::error::Result;
use shortlink_client::{EntityId, Namespace, NamespaceDraft, NamespacePatch, ShortlinkApiClient};

use super::{Entity, EntityApi};
use crate::cache::EntityKind;

impl Entity for Namespace {
    const KIND: EntityKind = EntityKind::Namespace;

    type Draft = NamespaceDraft;
    type Patch = NamespacePatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn provisional(draft: &NamespaceDraft, id: EntityId, now: DateTime<Utc>) -> Self {
        Namespace {
            id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            organization: draft.organization,
            url_count: 0,
            created_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &NamespacePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }
}

/// Namespace endpoints
#[derive(Clone)]
pub struct NamespaceApi {
    api: ShortlinkApiClient,
}

impl NamespaceApi {
    pub fn new(api: ShortlinkApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EntityApi<Namespace> for NamespaceApi {
    async fn create(&self, draft: &NamespaceDraft) -> Result<Namespace> {
        self.api.namespace_create(draft).await
    }

    async fn update(&self, id: &EntityId, patch: &NamespacePatch) -> Result<Namespace> {
        self.api.namespace_update(id, patch).await
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        self.api.namespace_delete(id).await
    }
}
