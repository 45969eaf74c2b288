// Console - facade wiring the client, caches, mutation engines and context

use std::sync::Arc;

use shortlink_client::{
    Namespace, Organization, Role, ShortUrl, ShortlinkApiClient, ShortlinkHttpClient, User,
};
use tokio::task::JoinHandle;

use crate::cache::{CacheKey, EntityKind, QueryCache};
use crate::config::ConsoleConfig;
use crate::context::OrganizationContext;
use crate::entity::{Entity, NamespaceApi, OrganizationApi, UrlApi};
use crate::error::{ConsoleError, Result};
use crate::mutation::MutationEngine;
use crate::poll::{Poller, Visibility};

/// Everything a console front end needs behind one handle
pub struct Console {
    config: ConsoleConfig,
    api: ShortlinkApiClient,
    organizations: QueryCache<Organization>,
    namespaces: QueryCache<Namespace>,
    urls: QueryCache<ShortUrl>,
    context: OrganizationContext,
    visibility: Visibility,
    session_watch: JoinHandle<()>,
}

impl Console {
    /// Create a console with a fresh HTTP client built from `config.http`.
    /// Must be called within a tokio runtime.
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        let http_client = ShortlinkHttpClient::new(config.http.clone())?;
        Ok(Self::from_http_client(config, Arc::new(http_client)))
    }

    /// Create a console over an existing client, e.g. one with a custom
    /// notifier or navigator. Must be called within a tokio runtime.
    pub fn from_http_client(config: ConsoleConfig, http_client: Arc<ShortlinkHttpClient>) -> Self {
        let context = OrganizationContext::new();
        let session_watch = context.watch_session(http_client.session_events());

        let urls = QueryCache::new();
        urls.register_view(Self::recent_urls_key(), config.recent_urls_limit);

        Self {
            config,
            api: ShortlinkApiClient::new(http_client),
            organizations: QueryCache::new(),
            namespaces: QueryCache::new(),
            urls,
            context,
            visibility: Visibility::new(),
            session_watch,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn api(&self) -> &ShortlinkApiClient {
        &self.api
    }

    pub fn context(&self) -> &OrganizationContext {
        &self.context
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn organizations_cache(&self) -> &QueryCache<Organization> {
        &self.organizations
    }

    pub fn namespaces_cache(&self) -> &QueryCache<Namespace> {
        &self.namespaces
    }

    pub fn urls_cache(&self) -> &QueryCache<ShortUrl> {
        &self.urls
    }

    pub fn recent_urls_key() -> CacheKey {
        CacheKey::recent(EntityKind::Url)
    }

    // ============== Session ==============

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        Ok(self.api.login(username, password).await?)
    }

    pub async fn logout(&self) -> Result<()> {
        self.context.clear();
        Ok(self.api.logout().await?)
    }

    // ============== Mutation engines ==============

    pub fn organizations(&self) -> MutationEngine<Organization> {
        MutationEngine::new(
            None,
            self.organizations.clone(),
            Arc::new(OrganizationApi::new(self.api.clone())),
            self.api.http_client().notifier(),
        )
    }

    pub fn namespaces(&self, organization_id: u64) -> MutationEngine<Namespace> {
        MutationEngine::new(
            Some(organization_id),
            self.namespaces.clone(),
            Arc::new(NamespaceApi::new(self.api.clone())),
            self.api.http_client().notifier(),
        )
    }

    /// URLs of one namespace; creates and deletes also show in the recent view
    pub fn urls(&self, namespace_id: u64) -> MutationEngine<ShortUrl> {
        MutationEngine::new(
            Some(namespace_id),
            self.urls.clone(),
            Arc::new(UrlApi::new(self.api.clone())),
            self.api.http_client().notifier(),
        )
        .with_view(Self::recent_urls_key())
    }

    // ============== Loaders ==============

    /// Cached organizations, refetched when stale
    pub async fn load_organizations(&self) -> Result<Vec<Organization>> {
        let key = Organization::cache_key(None);
        Ok(self
            .organizations
            .get_or_fetch(&key, || self.api.organization_list())
            .await?)
    }

    pub async fn load_namespaces(&self, organization_id: u64) -> Result<Vec<Namespace>> {
        let key = Namespace::cache_key(Some(organization_id));
        Ok(self
            .namespaces
            .get_or_fetch(&key, || self.api.namespace_list(organization_id))
            .await?)
    }

    pub async fn load_urls(&self, namespace_id: u64) -> Result<Vec<ShortUrl>> {
        let key = ShortUrl::cache_key(Some(namespace_id));
        Ok(self
            .urls
            .get_or_fetch(&key, || self.api.url_list(namespace_id))
            .await?)
    }

    pub async fn load_recent_urls(&self) -> Result<Vec<ShortUrl>> {
        let limit = self.config.recent_urls_limit;
        Ok(self
            .urls
            .get_or_fetch(&Self::recent_urls_key(), || self.api.url_recent(limit))
            .await?)
    }

    /// Refetch organizations regardless of freshness
    pub async fn refresh_organizations(&self) -> Result<Vec<Organization>> {
        let key = Organization::cache_key(None);
        Ok(self
            .organizations
            .fetch(&key, || self.api.organization_list())
            .await?)
    }

    // ============== Context ==============

    /// Make organization `id` current, using the role the server reports for
    /// the user. Users without a reported role get viewer permissions.
    pub async fn select_organization(&self, id: u64) -> Result<Organization> {
        let organization = self
            .load_organizations()
            .await?
            .into_iter()
            .find(|org| org.id.as_server() == Some(id))
            .ok_or(ConsoleError::OrganizationNotFound(id))?;

        let role = organization.role.unwrap_or(Role::Viewer);
        self.context.select(organization.clone(), role);
        Ok(organization)
    }

    // ============== Polling ==============

    /// Poller over the organizations, the current organization's namespaces
    /// and the recent URLs. Add further keys with [`Poller::watch`].
    pub fn poller(&self) -> Poller {
        let mut poller = Poller::new(self.config.poll_interval(), self.visibility.clone())
            .watch(
                Arc::new(self.organizations.clone()),
                Organization::cache_key(None),
            )
            .watch(Arc::new(self.urls.clone()), Self::recent_urls_key());

        if let Some(organization_id) = self.context.organization_id() {
            poller = poller.watch(
                Arc::new(self.namespaces.clone()),
                Namespace::cache_key(Some(organization_id)),
            );
        }
        poller
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.session_watch.abort();
    }
}
