//! Query cache keyed by entity kind and scope
//!
//! Each [`CacheKey`] addresses exactly one collection. All reads and writes go
//! through key-scoped operations so that fetch cancellation, snapshots and
//! invalidation stay consistent. Locks are never held across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

/// Kind of entity stored in a collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Organization,
    Namespace,
    Url,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organization",
            EntityKind::Namespace => "namespace",
            EntityKind::Url => "url",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which rendition of a kind the key addresses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum View {
    /// The full collection for a parent scope
    Collection,
    /// A capped "recent items" list
    Recent,
}

/// Composite cache key: entity kind + parent scope + view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub scope: Option<u64>,
    pub view: View,
}

impl CacheKey {
    pub fn collection(kind: EntityKind, scope: Option<u64>) -> Self {
        Self {
            kind,
            scope,
            view: View::Collection,
        }
    }

    pub fn recent(kind: EntityKind) -> Self {
        Self {
            kind,
            scope: None,
            view: View::Recent,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = match self.view {
            View::Collection => "",
            View::Recent => ":recent",
        };
        match self.scope {
            Some(scope) => write!(f, "{}s[{}]{}", self.kind, scope, view),
            None => write!(f, "{}s{}", self.kind, view),
        }
    }
}

/// A cached entity and its provisional marker
#[derive(Clone, Debug, PartialEq)]
pub struct Row<T> {
    pub entity: T,
    /// Set while the row reflects a speculative local edit
    pub provisional: bool,
}

impl<T> Row<T> {
    pub fn confirmed(entity: T) -> Self {
        Self {
            entity,
            provisional: false,
        }
    }

    pub fn provisional(entity: T) -> Self {
        Self {
            entity,
            provisional: true,
        }
    }
}

#[derive(Debug)]
struct Entry<T> {
    rows: Vec<Row<T>>,
    /// True until loaded, and again after invalidation
    stale: bool,
    fetch_generation: u64,
    /// Bumped on every row write
    version: u64,
    invalidations: u64,
    limit: Option<usize>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            stale: true,
            fetch_generation: 0,
            version: 0,
            invalidations: 0,
            limit: None,
        }
    }
}

impl<T> Entry<T> {
    fn write(&mut self) -> u64 {
        if let Some(limit) = self.limit {
            self.rows.truncate(limit);
        }
        self.version += 1;
        self.version
    }
}

/// Immutable copy of one or more collections taken before a speculative edit
#[derive(Clone, Debug)]
pub struct Snapshot<T> {
    entries: Vec<(CacheKey, Option<Vec<Row<T>>>)>,
}

impl<T> Snapshot<T> {
    /// Rows of `key` at snapshot time; `None` if the collection did not exist.
    pub fn rows(&self, key: &CacheKey) -> Option<&[Row<T>]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, rows)| rows.as_deref())
    }
}

/// Something that can mark cache keys stale
pub trait Invalidate: Send + Sync + 'static {
    /// Returns `true` if the key transitioned from fresh to stale.
    fn invalidate_key(&self, key: &CacheKey) -> bool;
}

/// Shared, process-wide cache of collections of `T`
pub struct QueryCache<T> {
    inner: Arc<RwLock<HashMap<CacheKey, Entry<T>>>>,
    changes: broadcast::Sender<CacheKey>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            changes: self.changes.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    /// Receive the key of every collection whose rows or freshness change
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.changes.subscribe()
    }

    fn changed(&self, key: &CacheKey) {
        let _ = self.changes.send(*key);
    }

    /// Cap the number of rows kept under `key`
    pub fn register_view(&self, key: CacheKey, limit: usize) {
        let mut guard = self.inner.write();
        let entry = guard.entry(key).or_default();
        entry.limit = Some(limit);
        entry.rows.truncate(limit);
    }

    // ============== Reads ==============

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn rows(&self, key: &CacheKey) -> Vec<Row<T>> {
        self.inner
            .read()
            .get(key)
            .map(|e| e.rows.clone())
            .unwrap_or_default()
    }

    pub fn entities(&self, key: &CacheKey) -> Vec<T> {
        self.inner
            .read()
            .get(key)
            .map(|e| e.rows.iter().map(|r| r.entity.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether the next read of `key` must refetch. Unknown keys are stale.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.inner.read().get(key).is_none_or(|e| e.stale)
    }

    /// Number of fresh-to-stale transitions of `key`
    pub fn invalidation_count(&self, key: &CacheKey) -> u64 {
        self.inner
            .read()
            .get(key)
            .map(|e| e.invalidations)
            .unwrap_or(0)
    }

    /// Write counter of `key`; changes whenever its rows are replaced or edited
    pub fn version(&self, key: &CacheKey) -> u64 {
        self.inner.read().get(key).map(|e| e.version).unwrap_or(0)
    }

    // ============== Writes ==============

    /// Replace `key` with server data and mark it fresh
    pub fn set(&self, key: &CacheKey, items: Vec<T>) {
        {
            let mut guard = self.inner.write();
            let entry = guard.entry(*key).or_default();
            entry.rows = items.into_iter().map(Row::confirmed).collect();
            entry.stale = false;
            entry.write();
        }
        self.changed(key);
    }

    /// Edit the rows of `key` in place; returns the new version
    pub fn update<F>(&self, key: &CacheKey, f: F) -> u64
    where
        F: FnOnce(&mut Vec<Row<T>>),
    {
        let version = {
            let mut guard = self.inner.write();
            let entry = guard.entry(*key).or_default();
            f(&mut entry.rows);
            entry.write()
        };
        self.changed(key);
        version
    }

    /// Mark `key` stale. Idempotent: only the first call after a load counts.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let transitioned = {
            let mut guard = self.inner.write();
            let entry = guard.entry(*key).or_default();
            if entry.stale {
                false
            } else {
                entry.stale = true;
                entry.invalidations += 1;
                true
            }
        };
        if transitioned {
            debug!("Invalidated {}", key);
            self.changed(key);
        }
        transitioned
    }

    // ============== Fetches ==============

    /// Cancel every outstanding fetch of `key`; their results will be discarded.
    pub fn cancel_fetches(&self, key: &CacheKey) {
        if let Some(entry) = self.inner.write().get_mut(key) {
            entry.fetch_generation += 1;
        }
    }

    fn begin_fetch(&self, key: &CacheKey) -> u64 {
        let mut guard = self.inner.write();
        let entry = guard.entry(*key).or_default();
        entry.fetch_generation += 1;
        entry.fetch_generation
    }

    fn finish_fetch(&self, key: &CacheKey, generation: u64, items: Vec<T>) -> bool {
        {
            let mut guard = self.inner.write();
            let Some(entry) = guard.get_mut(key) else {
                return false;
            };
            if entry.fetch_generation != generation {
                return false;
            }
            entry.rows = items.into_iter().map(Row::confirmed).collect();
            entry.stale = false;
            entry.write();
        }
        self.changed(key);
        true
    }

    /// Load `key` with `loader`. A fetch cancelled while in flight does not
    /// write to the cache, but its data is still returned to the caller.
    pub async fn fetch<F, Fut, E>(&self, key: &CacheKey, loader: F) -> Result<Vec<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let generation = self.begin_fetch(key);
        let items = loader().await?;
        if !self.finish_fetch(key, generation, items.clone()) {
            debug!("Discarding cancelled fetch of {}", key);
        }
        Ok(items)
    }

    /// Serve `key` from the cache while fresh, otherwise refetch it.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &CacheKey, loader: F) -> Result<Vec<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        if !self.is_stale(key) {
            return Ok(self.entities(key));
        }
        self.fetch(key, loader).await
    }

    // ============== Snapshots ==============

    pub fn snapshot(&self, keys: &[CacheKey]) -> Snapshot<T> {
        let guard = self.inner.read();
        Snapshot {
            entries: keys
                .iter()
                .map(|k| (*k, guard.get(k).map(|e| e.rows.clone())))
                .collect(),
        }
    }

    /// Put the snapshot rows of `key` back verbatim
    pub fn restore_key(&self, snapshot: &Snapshot<T>, key: &CacheKey) {
        let Some((_, rows)) = snapshot.entries.iter().find(|(k, _)| k == key) else {
            return;
        };
        {
            let mut guard = self.inner.write();
            match rows {
                Some(rows) => {
                    let entry = guard.entry(*key).or_default();
                    entry.rows = rows.clone();
                    entry.write();
                }
                None => {
                    guard.remove(key);
                }
            }
        }
        self.changed(key);
    }

    /// Undo a speculative write that left `key` at `version`.
    ///
    /// When nothing else has written to `key` since, the snapshot rows are put
    /// back verbatim. Otherwise `revert` receives the current rows and the
    /// snapshot rows and must undo only its own edit. Returns `true` for a
    /// verbatim restore.
    pub fn rollback<F>(
        &self,
        snapshot: &Snapshot<T>,
        key: &CacheKey,
        version: u64,
        revert: F,
    ) -> bool
    where
        F: FnOnce(&mut Vec<Row<T>>, &[Row<T>]),
    {
        let Some((_, original)) = snapshot.entries.iter().find(|(k, _)| k == key) else {
            return false;
        };
        let verbatim = {
            let mut guard = self.inner.write();
            let current = guard.get(key).map(|e| e.version);
            match (current, original) {
                (Some(current), Some(rows)) if current == version => {
                    if let Some(entry) = guard.get_mut(key) {
                        entry.rows = rows.clone();
                        entry.write();
                    }
                    true
                }
                (Some(current), None) if current == version => {
                    guard.remove(key);
                    true
                }
                (Some(_), original) => {
                    if let Some(entry) = guard.get_mut(key) {
                        revert(&mut entry.rows, original.as_deref().unwrap_or_default());
                        entry.write();
                    }
                    false
                }
                (None, _) => false,
            }
        };
        self.changed(key);
        verbatim
    }

    pub fn restore(&self, snapshot: &Snapshot<T>) {
        for (key, _) in &snapshot.entries {
            self.restore_key(snapshot, key);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Invalidate for QueryCache<T> {
    fn invalidate_key(&self, key: &CacheKey) -> bool {
        self.invalidate(key)
    }
}
