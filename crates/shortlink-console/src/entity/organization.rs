use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shortlink_client::error::Result;
use shortlink_client::{
    EntityId, Organization, OrganizationDraft, OrganizationPatch, ShortlinkApiClient,
};

use super::{Entity, EntityApi};
use crate::cache::EntityKind;

impl Entity for Organization {
    const KIND: EntityKind = EntityKind::Organization;

    type Draft = OrganizationDraft;
    type Patch = OrganizationPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn provisional(draft: &OrganizationDraft, id: EntityId, now: DateTime<Utc>) -> Self {
        Organization {
            id,
            name: draft.name.clone(),
            slug: String::new(),
            description: draft.description.clone(),
            created_at: now,
            namespace_count: 0,
            member_count: 0,
            role: None,
        }
    }

    fn apply_patch(&mut self, patch: &OrganizationPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }
}

/// Organization endpoints
#[derive(Clone)]
pub struct OrganizationApi {
    api: ShortlinkApiClient,
}

impl OrganizationApi {
    pub fn new(api: ShortlinkApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EntityApi<Organization> for OrganizationApi {
    async fn create(&self, draft: &OrganizationDraft) -> Result<Organization> {
        self.api.organization_create(draft).await
    }

    async fn update(&self, id: &EntityId, patch: &OrganizationPatch) -> Result<Organization> {
        self.api.organization_update(id, patch).await
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        self.api.organization_delete(id).await
    }
}
