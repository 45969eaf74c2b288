//! Optimistic Mutation Tests
//!
//! Drive the mutation engine against a scripted API whose calls block until
//! the test releases them, so the provisional state can be inspected mid-flight.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::json;
use shortlink_client::error::Result as ClientResult;
use shortlink_client::{
    ApiErrorBody, ClientError, EntityId, HttpClientConfig, Namespace, NamespaceDraft,
    NamespacePatch, Notice, Organization, OrganizationDraft, OrganizationPatch, QueuedNotifier,
    ShortUrl, ShortUrlDraft, ShortUrlPatch, ShortlinkHttpClient,
};
use shortlink_console::{
    CacheKey, Console, ConsoleConfig, Entity, EntityApi, EntityKind, MutationEngine, QueryCache,
    Row,
};
use tokio::sync::{Notify, oneshot};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============== Scripted API ==============

enum Reply<T> {
    Entity(T),
    Done,
    Fail(ClientError),
}

struct ScriptedApi<T> {
    gates: Mutex<VecDeque<oneshot::Receiver<Reply<T>>>>,
    calls: Mutex<Vec<String>>,
    started: Notify,
}

impl<T: Entity> ScriptedApi<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gates: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            started: Notify::new(),
        })
    }

    /// Queue the reply for the next call; the call blocks until it is sent.
    fn gate(&self) -> oneshot::Sender<Reply<T>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn reply(&self, call: String) -> Reply<T> {
        let gate = self.gates.lock().pop_front();
        self.calls.lock().push(call);
        self.started.notify_one();
        match gate {
            Some(gate) => gate.await.unwrap_or(Reply::Fail(ClientError::Timeout)),
            None => Reply::Fail(ClientError::Timeout),
        }
    }
}

#[async_trait]
impl<T: Entity> EntityApi<T> for ScriptedApi<T> {
    async fn create(&self, _draft: &T::Draft) -> ClientResult<T> {
        match self.reply("create".to_string()).await {
            Reply::Entity(entity) => Ok(entity),
            Reply::Done => panic!("create needs an entity reply"),
            Reply::Fail(err) => Err(err),
        }
    }

    async fn update(&self, id: &EntityId, _patch: &T::Patch) -> ClientResult<T> {
        match self.reply(format!("update {}", id)).await {
            Reply::Entity(entity) => Ok(entity),
            Reply::Done => panic!("update needs an entity reply"),
            Reply::Fail(err) => Err(err),
        }
    }

    async fn delete(&self, id: &EntityId) -> ClientResult<()> {
        match self.reply(format!("delete {}", id)).await {
            Reply::Entity(_) | Reply::Done => Ok(()),
            Reply::Fail(err) => Err(err),
        }
    }
}

// ============== Fixtures ==============

fn created_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn namespace(id: u64, name: &str) -> Namespace {
    Namespace {
        id: EntityId::Server(id),
        name: name.to_string(),
        description: String::new(),
        organization: 7,
        url_count: 3,
        created_at: created_at(),
    }
}

fn short_url(id: u64, title: &str) -> ShortUrl {
    ShortUrl {
        id: EntityId::Server(id),
        short_code: format!("c{}", id),
        original_url: "https://example.com".to_string(),
        title: title.to_string(),
        namespace: 3,
        click_count: 10,
        is_active: true,
        created_at: created_at(),
        expires_at: None,
    }
}

fn organization(id: u64, name: &str) -> Organization {
    Organization {
        id: EntityId::Server(id),
        name: name.to_string(),
        slug: name.to_lowercase(),
        description: String::new(),
        created_at: created_at(),
        namespace_count: 2,
        member_count: 4,
        role: None,
    }
}

fn bad_request(body: serde_json::Value) -> ClientError {
    ClientError::Http {
        status: StatusCode::BAD_REQUEST,
        body: ApiErrorBody::from_json(body),
    }
}

fn server_error() -> ClientError {
    ClientError::Http {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ApiErrorBody::from_bytes(b"Internal Server Error"),
    }
}

struct Fixture<T: Entity> {
    cache: QueryCache<T>,
    api: Arc<ScriptedApi<T>>,
    notices: Arc<QueuedNotifier>,
    engine: MutationEngine<T>,
    key: CacheKey,
}

fn fixture<T: Entity>(scope: Option<u64>, rows: Vec<T>) -> Fixture<T> {
    let cache = QueryCache::new();
    let key = T::cache_key(scope);
    cache.set(&key, rows);

    let api = ScriptedApi::new();
    let notices = Arc::new(QueuedNotifier::new());
    let engine = MutationEngine::new(scope, cache.clone(), api.clone(), notices.clone());

    Fixture {
        cache,
        api,
        notices,
        engine,
        key,
    }
}

fn provisional_count<T>(rows: &[Row<T>]) -> usize {
    rows.iter().filter(|row| row.provisional).count()
}

fn messages(notices: &QueuedNotifier) -> Vec<String> {
    notices.drain().into_iter().map(|n: Notice| n.message).collect()
}

/// Run one failing mutation and check the collection comes back unchanged.
async fn assert_rolls_back<T, F, Fut, R>(scope: Option<u64>, rows: Vec<T>, notice: &str, run: F)
where
    T: Entity + PartialEq + Debug,
    F: FnOnce(MutationEngine<T>) -> Fut,
    Fut: Future<Output = ClientResult<R>>,
{
    let f = fixture(scope, rows);
    let before = f.cache.rows(&f.key);
    f.api.gate().send(Reply::Fail(server_error())).ok();

    let result = run(f.engine.clone()).await;

    assert!(result.is_err(), "{} should fail", notice);
    assert_eq!(f.cache.rows(&f.key), before, "{} left the collection changed", notice);
    assert_eq!(messages(&f.notices), vec![notice]);
    assert_eq!(f.cache.invalidation_count(&f.key), 1);
}

// ============== Rollback per kind ==============

#[tokio::test]
async fn test_url_mutations_roll_back() {
    let rows = || vec![short_url(41, "first"), short_url(42, "second")];

    assert_rolls_back(Some(3), rows(), "Failed to create url", |engine| async move {
        engine
            .create(ShortUrlDraft {
                namespace: 3,
                original_url: "https://rust-lang.org".to_string(),
                ..Default::default()
            })
            .await
    })
    .await;

    assert_rolls_back(Some(3), rows(), "Failed to update url", |engine| async move {
        engine
            .update(
                EntityId::Server(42),
                ShortUrlPatch {
                    title: Some("New Title".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
    })
    .await;

    assert_rolls_back(Some(3), rows(), "Failed to delete url", |engine| async move {
        engine.delete(EntityId::Server(41)).await
    })
    .await;
}

#[tokio::test]
async fn test_namespace_mutations_roll_back() {
    let rows = || vec![namespace(1, "alpha"), namespace(2, "beta")];

    assert_rolls_back(Some(7), rows(), "Failed to create namespace", |engine| async move {
        engine
            .create(NamespaceDraft {
                organization: 7,
                name: "demo".to_string(),
                ..Default::default()
            })
            .await
    })
    .await;

    assert_rolls_back(Some(7), rows(), "Failed to update namespace", |engine| async move {
        engine
            .update(
                EntityId::Server(1),
                NamespacePatch {
                    description: Some("changed".to_string()),
                    ..Default::default()
                },
            )
            .await
    })
    .await;

    assert_rolls_back(Some(7), rows(), "Failed to delete namespace", |engine| async move {
        engine.delete(EntityId::Server(2)).await
    })
    .await;
}

#[tokio::test]
async fn test_organization_mutations_roll_back() {
    let rows = || vec![organization(1, "Acme"), organization(2, "Globex")];

    assert_rolls_back(None, rows(), "Failed to create organization", |engine| async move {
        engine
            .create(OrganizationDraft {
                name: "Initech".to_string(),
                ..Default::default()
            })
            .await
    })
    .await;

    assert_rolls_back(None, rows(), "Failed to update organization", |engine| async move {
        engine
            .update(
                EntityId::Server(2),
                OrganizationPatch {
                    name: Some("Globex Corp".to_string()),
                    ..Default::default()
                },
            )
            .await
    })
    .await;

    assert_rolls_back(None, rows(), "Failed to delete organization", |engine| async move {
        engine.delete(EntityId::Server(1)).await
    })
    .await;
}

// ============== Create ==============

#[tokio::test]
async fn test_create_failure_restores_collection() {
    let f = fixture(Some(7), vec![namespace(1, "alpha"), namespace(2, "beta")]);
    let before = f.cache.rows(&f.key);
    let gate = f.api.gate();

    let engine = f.engine.clone();
    let task = tokio::spawn(async move {
        engine
            .create(NamespaceDraft {
                organization: 7,
                name: "demo".to_string(),
                ..Default::default()
            })
            .await
    });
    f.api.started.notified().await;

    let rows = f.cache.rows(&f.key);
    assert_eq!(rows.len(), 3);
    assert_eq!(provisional_count(&rows), 1);
    let provisional = &rows[0];
    assert!(provisional.provisional);
    assert!(provisional.entity.id.is_temporary());
    assert!(provisional.entity.id.to_string().starts_with("temp-"));
    assert_eq!(provisional.entity.name, "demo");
    assert_eq!(provisional.entity.url_count, 0);

    gate.send(Reply::Fail(ClientError::Timeout)).ok();
    let result = task.await.unwrap();

    assert!(matches!(result, Err(ClientError::Timeout)));
    assert_eq!(f.cache.rows(&f.key), before);
    assert_eq!(messages(&f.notices), vec!["Failed to create namespace"]);
    assert!(f.cache.is_stale(&f.key));
    assert_eq!(f.cache.invalidation_count(&f.key), 1);
}

#[tokio::test]
async fn test_create_success_replaces_provisional_row() {
    let f = fixture(Some(7), vec![namespace(1, "alpha")]);
    f.api
        .gate()
        .send(Reply::Entity(namespace(9, "demo")))
        .ok();

    let created = f
        .engine
        .create(NamespaceDraft {
            organization: 7,
            name: "demo".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(created.id, EntityId::Server(9));
    let rows = f.cache.rows(&f.key);
    assert_eq!(rows.len(), 2);
    assert_eq!(provisional_count(&rows), 0);
    assert_eq!(rows[0].entity, namespace(9, "demo"));
    assert!(f.notices.is_empty());
    assert_eq!(f.cache.invalidation_count(&f.key), 1);
}

#[tokio::test]
async fn test_create_failure_prefers_server_message() {
    let f = fixture(Some(7), vec![namespace(1, "alpha")]);
    f.api
        .gate()
        .send(Reply::Fail(bad_request(json!({
            "detail": "Invalid input.",
            "name": ["Namespace with this name already exists."]
        }))))
        .ok();

    let result = f
        .engine
        .create(NamespaceDraft {
            organization: 7,
            name: "alpha".to_string(),
            ..Default::default()
        })
        .await;

    assert!(result.is_err());
    assert_eq!(
        messages(&f.notices),
        vec!["Namespace with this name already exists."]
    );
}

#[tokio::test]
async fn test_create_organization_failure_restores_collection() {
    let f = fixture(None, vec![organization(1, "Acme")]);
    let before = f.cache.rows(&f.key);
    f.api
        .gate()
        .send(Reply::Fail(bad_request(json!({"error": "Plan limit reached"}))))
        .ok();

    let result = f
        .engine
        .create(OrganizationDraft {
            name: "Globex".to_string(),
            ..Default::default()
        })
        .await;

    assert!(result.is_err());
    assert_eq!(f.cache.rows(&f.key), before);
    assert_eq!(messages(&f.notices), vec!["Plan limit reached"]);
}

#[tokio::test]
async fn test_create_mirrors_into_capped_recent_view() {
    let f = fixture(Some(3), vec![short_url(1, "one")]);
    let recent = CacheKey::recent(EntityKind::Url);
    f.cache.register_view(recent, 2);
    f.cache.set(&recent, vec![short_url(1, "one"), short_url(5, "five")]);
    let engine = f.engine.clone().with_view(recent);
    let gate = f.api.gate();

    let task = tokio::spawn(async move {
        engine
            .create(ShortUrlDraft {
                namespace: 3,
                original_url: "https://rust-lang.org".to_string(),
                ..Default::default()
            })
            .await
    });
    f.api.started.notified().await;

    let rows = f.cache.rows(&recent);
    assert_eq!(rows.len(), 2);
    assert!(rows[0].provisional);
    assert_eq!(rows[1].entity.id, EntityId::Server(1));

    gate.send(Reply::Entity(short_url(8, "rust"))).ok();
    task.await.unwrap().unwrap();

    let ids: Vec<EntityId> = f.cache.entities(&recent).into_iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![EntityId::Server(8), EntityId::Server(1)]);
    assert!(f.cache.is_stale(&recent));
    assert!(f.cache.is_stale(&f.key));
}

// ============== Update ==============

#[tokio::test]
async fn test_update_success_takes_server_row() {
    let f = fixture(Some(3), vec![short_url(41, "other"), short_url(42, "Old Title")]);
    let gate = f.api.gate();

    let engine = f.engine.clone();
    let task = tokio::spawn(async move {
        engine
            .update(
                EntityId::Server(42),
                ShortUrlPatch {
                    title: Some("New Title".to_string()),
                    ..Default::default()
                },
            )
            .await
    });
    f.api.started.notified().await;

    let rows = f.cache.rows(&f.key);
    assert_eq!(rows[1].entity.title, "New Title");
    assert!(rows[1].provisional);
    assert!(!rows[0].provisional);

    let mut canonical = short_url(42, "New Title");
    canonical.click_count = 11;
    gate.send(Reply::Entity(canonical.clone())).ok();
    task.await.unwrap().unwrap();

    let rows = f.cache.rows(&f.key);
    assert_eq!(rows[1], Row::confirmed(canonical));
    assert_eq!(f.api.calls(), vec!["update 42"]);
}

#[tokio::test]
async fn test_update_failure_restores_collection() {
    let f = fixture(Some(7), vec![namespace(1, "alpha"), namespace(2, "beta")]);
    let before = f.cache.rows(&f.key);
    f.api.gate().send(Reply::Fail(server_error())).ok();

    let result = f
        .engine
        .update(
            EntityId::Server(2),
            NamespacePatch {
                name: Some("gamma".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(result.is_err());
    assert_eq!(f.cache.rows(&f.key), before);
    assert_eq!(messages(&f.notices), vec!["Failed to update namespace"]);
    assert_eq!(f.cache.invalidation_count(&f.key), 1);
}

#[tokio::test]
async fn test_update_of_unknown_row_still_calls_server() {
    let f = fixture(Some(3), vec![short_url(1, "one")]);
    let gate = f.api.gate();

    let engine = f.engine.clone();
    let task = tokio::spawn(async move {
        engine
            .update(
                EntityId::Server(99),
                ShortUrlPatch {
                    title: Some("ghost".to_string()),
                    ..Default::default()
                },
            )
            .await
    });
    f.api.started.notified().await;

    assert_eq!(f.cache.entities(&f.key), vec![short_url(1, "one")]);

    gate.send(Reply::Entity(short_url(99, "ghost"))).ok();
    task.await.unwrap().unwrap();

    assert_eq!(f.api.calls(), vec!["update 99"]);
    assert_eq!(
        f.cache.entities(&f.key),
        vec![short_url(1, "one"), short_url(99, "ghost")]
    );
}

// ============== Delete ==============

#[tokio::test]
async fn test_delete_failure_restores_collection() {
    let f = fixture(None, vec![organization(1, "Acme"), organization(2, "Globex")]);
    let before = f.cache.rows(&f.key);
    let gate = f.api.gate();

    let engine = f.engine.clone();
    let task = tokio::spawn(async move { engine.delete(EntityId::Server(1)).await });
    f.api.started.notified().await;

    assert_eq!(f.cache.entities(&f.key), vec![organization(2, "Globex")]);

    gate.send(Reply::Fail(server_error())).ok();
    assert!(task.await.unwrap().is_err());

    assert_eq!(f.cache.rows(&f.key), before);
    assert_eq!(messages(&f.notices), vec!["Failed to delete organization"]);
}

#[tokio::test]
async fn test_two_rapid_deletes_roll_back_independently() {
    let f = fixture(
        Some(7),
        vec![namespace(1, "a"), namespace(2, "b"), namespace(3, "c")],
    );
    let first_gate = f.api.gate();
    let second_gate = f.api.gate();

    let engine = f.engine.clone();
    let first = tokio::spawn(async move { engine.delete(EntityId::Server(1)).await });
    f.api.started.notified().await;
    let engine = f.engine.clone();
    let second = tokio::spawn(async move { engine.delete(EntityId::Server(2)).await });
    f.api.started.notified().await;

    assert_eq!(f.cache.entities(&f.key), vec![namespace(3, "c")]);

    first_gate.send(Reply::Fail(server_error())).ok();
    assert!(first.await.unwrap().is_err());
    second_gate.send(Reply::Done).ok();
    assert!(second.await.unwrap().is_ok());

    assert_eq!(
        f.cache.entities(&f.key),
        vec![namespace(1, "a"), namespace(3, "c")]
    );
    assert_eq!(provisional_count(&f.cache.rows(&f.key)), 0);
}

#[tokio::test]
async fn test_two_rapid_deletes_settling_in_reverse_order() {
    let f = fixture(
        Some(7),
        vec![namespace(1, "a"), namespace(2, "b"), namespace(3, "c")],
    );
    let first_gate = f.api.gate();
    let second_gate = f.api.gate();

    let engine = f.engine.clone();
    let first = tokio::spawn(async move { engine.delete(EntityId::Server(1)).await });
    f.api.started.notified().await;
    let engine = f.engine.clone();
    let second = tokio::spawn(async move { engine.delete(EntityId::Server(2)).await });
    f.api.started.notified().await;

    second_gate.send(Reply::Done).ok();
    assert!(second.await.unwrap().is_ok());
    first_gate.send(Reply::Fail(server_error())).ok();
    assert!(first.await.unwrap().is_err());

    assert_eq!(
        f.cache.entities(&f.key),
        vec![namespace(1, "a"), namespace(3, "c")]
    );
}

// ============== Fetch cancellation ==============

#[tokio::test]
async fn test_mutation_cancels_inflight_fetch() {
    let f = fixture(Some(7), vec![namespace(1, "alpha")]);
    let (fetch_tx, fetch_rx) = oneshot::channel::<Vec<Namespace>>();

    let cache = f.cache.clone();
    let key = f.key;
    let fetch = tokio::spawn(async move {
        cache
            .fetch(&key, || async move { Ok::<_, ClientError>(fetch_rx.await.unwrap()) })
            .await
    });
    tokio::task::yield_now().await;

    let gate = f.api.gate();
    let engine = f.engine.clone();
    let task = tokio::spawn(async move { engine.delete(EntityId::Server(1)).await });
    f.api.started.notified().await;

    // A stale response that still contains the row being deleted.
    fetch_tx.send(vec![namespace(1, "alpha")]).ok();
    fetch.await.unwrap().unwrap();
    assert!(f.cache.entities(&f.key).is_empty());

    gate.send(Reply::Done).ok();
    task.await.unwrap().unwrap();
    assert!(f.cache.entities(&f.key).is_empty());
}

#[tokio::test]
async fn test_mutation_outlives_its_caller() {
    let f = fixture(Some(7), vec![namespace(1, "alpha")]);
    let gate = f.api.gate();

    let engine = f.engine.clone();
    let caller = tokio::spawn(async move { engine.delete(EntityId::Server(1)).await });
    f.api.started.notified().await;
    caller.abort();

    gate.send(Reply::Fail(server_error())).ok();
    for _ in 0..10 {
        if !f.notices.is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(f.cache.entities(&f.key), vec![namespace(1, "alpha")]);
    assert_eq!(messages(&f.notices), vec!["Failed to delete namespace"]);
}

// ============== Console end to end ==============

#[tokio::test]
async fn test_console_namespace_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"csrfToken": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/namespaces/"))
        .and(query_param("organization", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "results": [{
                "id": 1,
                "name": "alpha",
                "organization": 7,
                "url_count": 3,
                "created_at": "2024-01-01T00:00:00Z"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/namespaces/"))
        .and(body_json(json!({"organization": 7, "name": "demo"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 2,
            "name": "demo",
            "organization": 7,
            "url_count": 0,
            "created_at": "2024-01-02T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notices = Arc::new(QueuedNotifier::new());
    let http_client = ShortlinkHttpClient::new(HttpClientConfig::new(&server.uri()))
        .unwrap()
        .with_notifier(notices.clone());
    let console = Console::from_http_client(
        ConsoleConfig::new(&server.uri()),
        Arc::new(http_client),
    );

    let listed = console.load_namespaces(7).await.unwrap();
    assert_eq!(listed.len(), 1);
    // Served from the cache while fresh.
    console.load_namespaces(7).await.unwrap();

    let created = console
        .namespaces(7)
        .create(NamespaceDraft {
            organization: 7,
            name: "demo".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.id, EntityId::Server(2));

    let key = Namespace::cache_key(Some(7));
    let names: Vec<String> = console
        .namespaces_cache()
        .entities(&key)
        .into_iter()
        .map(|ns| ns.name)
        .collect();
    assert_eq!(names, vec!["demo", "alpha"]);
    assert!(console.namespaces_cache().is_stale(&key));
    assert!(notices.is_empty());
}
