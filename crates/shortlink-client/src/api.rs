//! API client for Shortlink operations
//!
//! Provides typed methods for each REST endpoint.

use std::sync::Arc;

use serde::Serialize;

use crate::constants::api_path;
use crate::error::Result;
use crate::http::ShortlinkHttpClient;
use crate::model::{
    ClickStats, EntityId, Invitation, InvitationDraft, ListResponse, Member, Namespace,
    NamespaceDraft, NamespacePatch, Organization, OrganizationDraft, OrganizationPatch, ShortUrl,
    ShortUrlDraft, ShortUrlPatch, User,
};

/// API client wrapper providing typed access to the Shortlink REST API
#[derive(Clone)]
pub struct ShortlinkApiClient {
    http_client: Arc<ShortlinkHttpClient>,
}

impl ShortlinkApiClient {
    /// Create a new API client with the given HTTP client
    pub fn new(http_client: Arc<ShortlinkHttpClient>) -> Self {
        Self { http_client }
    }

    /// Get the underlying HTTP client
    pub fn http_client(&self) -> &Arc<ShortlinkHttpClient> {
        &self.http_client
    }

    // ============== Auth APIs ==============

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        self.http_client.login(username, password).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.http_client.logout().await
    }

    /// Get the logged-in user
    pub async fn current_user(&self) -> Result<User> {
        self.http_client.get(api_path::AUTH_ME).await
    }

    // ============== Organization APIs ==============

    pub async fn organization_list(&self) -> Result<Vec<Organization>> {
        let response: ListResponse<Organization> =
            self.http_client.get(api_path::ORGANIZATIONS).await?;
        Ok(response.into_items())
    }

    pub async fn organization_create(&self, draft: &OrganizationDraft) -> Result<Organization> {
        self.http_client
            .post_json(api_path::ORGANIZATIONS, draft)
            .await
    }

    pub async fn organization_update(
        &self,
        id: &EntityId,
        patch: &OrganizationPatch,
    ) -> Result<Organization> {
        self.http_client
            .patch_json(&api_path::detail(api_path::ORGANIZATIONS, id), patch)
            .await
    }

    pub async fn organization_delete(&self, id: &EntityId) -> Result<()> {
        self.http_client
            .delete(&api_path::detail(api_path::ORGANIZATIONS, id))
            .await
    }

    pub async fn organization_members(&self, organization_id: u64) -> Result<Vec<Member>> {
        let response: ListResponse<Member> = self
            .http_client
            .get(&api_path::nested(
                api_path::ORGANIZATIONS,
                organization_id,
                "members",
            ))
            .await?;
        Ok(response.into_items())
    }

    // ============== Invitation APIs ==============

    pub async fn invitation_list(&self, organization_id: u64) -> Result<Vec<Invitation>> {
        let response: ListResponse<Invitation> = self
            .http_client
            .get(&api_path::nested(
                api_path::ORGANIZATIONS,
                organization_id,
                "invitations",
            ))
            .await?;
        Ok(response.into_items())
    }

    pub async fn invitation_create(
        &self,
        organization_id: u64,
        draft: &InvitationDraft,
    ) -> Result<Invitation> {
        self.http_client
            .post_json(
                &api_path::nested(api_path::ORGANIZATIONS, organization_id, "invitations"),
                draft,
            )
            .await
    }

    pub async fn invitation_revoke(&self, invitation_id: u64) -> Result<()> {
        self.http_client
            .delete(&api_path::detail(api_path::INVITATIONS, invitation_id))
            .await
    }

    pub async fn invitation_accept(&self, token: &str) -> Result<Organization> {
        self.http_client
            .post_json(
                &api_path::nested(api_path::INVITATIONS, token, "accept"),
                &serde_json::json!({}),
            )
            .await
    }

    // ============== Namespace APIs ==============

    pub async fn namespace_list(&self, organization_id: u64) -> Result<Vec<Namespace>> {
        #[derive(Serialize)]
        struct Query {
            organization: u64,
        }

        let response: ListResponse<Namespace> = self
            .http_client
            .get_with_query(
                api_path::NAMESPACES,
                &Query {
                    organization: organization_id,
                },
            )
            .await?;
        Ok(response.into_items())
    }

    pub async fn namespace_create(&self, draft: &NamespaceDraft) -> Result<Namespace> {
        self.http_client
            .post_json(api_path::NAMESPACES, draft)
            .await
    }

    pub async fn namespace_update(
        &self,
        id: &EntityId,
        patch: &NamespacePatch,
    ) -> Result<Namespace> {
        self.http_client
            .patch_json(&api_path::detail(api_path::NAMESPACES, id), patch)
            .await
    }

    pub async fn namespace_delete(&self, id: &EntityId) -> Result<()> {
        self.http_client
            .delete(&api_path::detail(api_path::NAMESPACES, id))
            .await
    }

    // ============== Short URL APIs ==============

    pub async fn url_list(&self, namespace_id: u64) -> Result<Vec<ShortUrl>> {
        #[derive(Serialize)]
        struct Query {
            namespace: u64,
        }

        let response: ListResponse<ShortUrl> = self
            .http_client
            .get_with_query(
                api_path::URLS,
                &Query {
                    namespace: namespace_id,
                },
            )
            .await?;
        Ok(response.into_items())
    }

    /// Most recently created URLs across all namespaces the user can see
    pub async fn url_recent(&self, limit: usize) -> Result<Vec<ShortUrl>> {
        #[derive(Serialize)]
        struct Query<'a> {
            ordering: &'a str,
            page_size: usize,
        }

        let response: ListResponse<ShortUrl> = self
            .http_client
            .get_with_query(
                api_path::URLS,
                &Query {
                    ordering: "-created_at",
                    page_size: limit,
                },
            )
            .await?;
        let mut items = response.into_items();
        items.truncate(limit);
        Ok(items)
    }

    pub async fn url_create(&self, draft: &ShortUrlDraft) -> Result<ShortUrl> {
        self.http_client.post_json(api_path::URLS, draft).await
    }

    pub async fn url_update(&self, id: &EntityId, patch: &ShortUrlPatch) -> Result<ShortUrl> {
        self.http_client
            .patch_json(&api_path::detail(api_path::URLS, id), patch)
            .await
    }

    pub async fn url_delete(&self, id: &EntityId) -> Result<()> {
        self.http_client
            .delete(&api_path::detail(api_path::URLS, id))
            .await
    }

    /// Click analytics for a short URL
    pub async fn url_stats(&self, id: &EntityId) -> Result<ClickStats> {
        self.http_client
            .get(&api_path::nested(api_path::URLS, id, "stats"))
            .await
    }
}
