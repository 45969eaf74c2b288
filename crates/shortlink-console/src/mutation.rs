//! Optimistic mutations
//!
//! Every operation runs the same four phases:
//!
//! 1. begin: cancel outstanding fetches of the affected keys, then snapshot them
//! 2. speculate: apply the edit locally with the rows flagged provisional
//! 3. reconcile: on success write the server's answer, on failure roll back
//!    and raise a notice
//! 4. settle: invalidate the affected keys whatever the outcome
//!
//! Mutations run on their own task and finish even if the caller stops
//! awaiting them.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use shortlink_client::error::Result;
use shortlink_client::{ClientError, EntityId, Notice, Notifier};
use tracing::{debug, warn};

use crate::cache::{CacheKey, QueryCache, Row, Snapshot};
use crate::entity::{Entity, EntityApi};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    pub fn verb(&self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Create/update/delete for one collection of `T`, plus any secondary views
/// that mirror it.
pub struct MutationEngine<T: Entity> {
    key: CacheKey,
    views: Vec<CacheKey>,
    cache: QueryCache<T>,
    api: Arc<dyn EntityApi<T>>,
    notifier: Arc<dyn Notifier>,
}

impl<T: Entity> Clone for MutationEngine<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            views: self.views.clone(),
            cache: self.cache.clone(),
            api: Arc::clone(&self.api),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<T: Entity> MutationEngine<T> {
    pub fn new(
        scope: Option<u64>,
        cache: QueryCache<T>,
        api: Arc<dyn EntityApi<T>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            key: T::cache_key(scope),
            views: Vec::new(),
            cache,
            api,
            notifier,
        }
    }

    /// Mirror creates and deletes into a secondary view such as "recent URLs"
    pub fn with_view(mut self, view: CacheKey) -> Self {
        if view != self.key && !self.views.contains(&view) {
            self.views.push(view);
        }
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn cache(&self) -> &QueryCache<T> {
        &self.cache
    }

    fn keys(&self) -> Vec<CacheKey> {
        std::iter::once(self.key)
            .chain(self.views.iter().copied())
            .collect()
    }

    pub async fn create(&self, draft: T::Draft) -> Result<T> {
        let engine = self.clone();
        spawn(async move { engine.run_create(draft).await }).await
    }

    pub async fn update(&self, id: EntityId, patch: T::Patch) -> Result<T> {
        let engine = self.clone();
        spawn(async move { engine.run_update(id, patch).await }).await
    }

    pub async fn delete(&self, id: EntityId) -> Result<()> {
        let engine = self.clone();
        spawn(async move { engine.run_delete(id).await }).await
    }

    async fn run_create(self, draft: T::Draft) -> Result<T> {
        let snapshot = self.begin();

        let temp_id = EntityId::temporary();
        let provisional = T::provisional(&draft, temp_id.clone(), Utc::now());
        let versions =
            self.speculate(|rows| rows.insert(0, Row::provisional(provisional.clone())));
        debug!("Created provisional {} {}", T::KIND, temp_id);

        let result = self.api.create(&draft).await;
        match &result {
            Ok(created) => {
                for key in self.keys() {
                    self.cache.update(&key, |rows| {
                        rows.retain(|row| row.entity.id() != &temp_id);
                        rows.insert(0, Row::confirmed(created.clone()));
                    });
                }
            }
            Err(err) => {
                self.rollback(&snapshot, &versions, |rows, _| {
                    rows.retain(|row| row.entity.id() != &temp_id);
                });
                self.report(MutationAction::Create, err);
            }
        }

        self.settle();
        result
    }

    async fn run_update(self, id: EntityId, patch: T::Patch) -> Result<T> {
        let snapshot = self.begin();

        let versions = self.speculate(|rows| {
            if let Some(row) = rows.iter_mut().find(|row| row.entity.id() == &id) {
                row.entity.apply_patch(&patch);
                row.provisional = true;
            }
        });

        let result = self.api.update(&id, &patch).await;
        match &result {
            Ok(updated) => {
                self.cache.update(&self.key, |rows| {
                    match rows.iter().position(|row| row.entity.id() == &id) {
                        Some(index) => rows[index] = Row::confirmed(updated.clone()),
                        None => rows.push(Row::confirmed(updated.clone())),
                    }
                });
                for view in &self.views {
                    self.cache.update(view, |rows| {
                        if let Some(row) = rows.iter_mut().find(|row| row.entity.id() == &id) {
                            *row = Row::confirmed(updated.clone());
                        }
                    });
                }
            }
            Err(err) => {
                self.rollback(&snapshot, &versions, |rows, original| {
                    let before = original.iter().find(|row| row.entity.id() == &id);
                    let current = rows.iter_mut().find(|row| row.entity.id() == &id);
                    if let (Some(before), Some(current)) = (before, current) {
                        *current = before.clone();
                    }
                });
                self.report(MutationAction::Update, err);
            }
        }

        self.settle();
        result
    }

    async fn run_delete(self, id: EntityId) -> Result<()> {
        let snapshot = self.begin();

        let versions = self.speculate(|rows| rows.retain(|row| row.entity.id() != &id));

        let result = self.api.delete(&id).await;
        if let Err(err) = &result {
            self.rollback(&snapshot, &versions, |rows, original| {
                reinsert(rows, original, &id);
            });
            self.report(MutationAction::Delete, err);
        }

        self.settle();
        result
    }

    // ============== Phases ==============

    fn begin(&self) -> Snapshot<T> {
        let keys = self.keys();
        for key in &keys {
            self.cache.cancel_fetches(key);
        }
        self.cache.snapshot(&keys)
    }

    fn speculate<F>(&self, edit: F) -> Vec<(CacheKey, u64)>
    where
        F: Fn(&mut Vec<Row<T>>),
    {
        self.keys()
            .into_iter()
            .map(|key| {
                let version = self.cache.update(&key, &edit);
                (key, version)
            })
            .collect()
    }

    fn rollback<F>(&self, snapshot: &Snapshot<T>, versions: &[(CacheKey, u64)], revert: F)
    where
        F: Fn(&mut Vec<Row<T>>, &[Row<T>]),
    {
        for (key, version) in versions {
            if !self.cache.rollback(snapshot, key, *version, &revert) {
                debug!("Reverted own edit of {} on top of later writes", key);
            }
        }
        warn!("Rolled back optimistic {} changes", T::KIND);
    }

    fn report(&self, action: MutationAction, err: &ClientError) {
        // The request pipeline already told the user the session ended.
        if matches!(err, ClientError::SessionExpired) {
            return;
        }
        let fallback = format!("Failed to {} {}", action, T::KIND);
        self.notifier.notify(Notice::error(err.user_message(&fallback)));
    }

    fn settle(&self) {
        for key in self.keys() {
            self.cache.invalidate(&key);
        }
    }
}

async fn spawn<R, F>(future: F) -> Result<R>
where
    F: std::future::Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    tokio::spawn(future)
        .await
        .map_err(|e| ClientError::Other(anyhow::Error::new(e)))?
}

/// Put the snapshot row `id` back between its old neighbours.
fn reinsert<T: Entity>(rows: &mut Vec<Row<T>>, original: &[Row<T>], id: &EntityId) {
    if rows.iter().any(|row| row.entity.id() == id) {
        return;
    }
    let Some(pos) = original.iter().position(|row| row.entity.id() == id) else {
        return;
    };
    let current = rows.as_slice();
    let index_of = |neighbour: &Row<T>| {
        current
            .iter()
            .position(|row| row.entity.id() == neighbour.entity.id())
    };

    let index = original[pos + 1..]
        .iter()
        .find_map(index_of)
        .or_else(|| {
            original[..pos]
                .iter()
                .rev()
                .find_map(|prev| index_of(prev).map(|i| i + 1))
        })
        .unwrap_or(current.len().min(pos));
    rows.insert(index, original[pos].clone());
}
