//! HTTP request pipeline with CSRF handling and session refresh
//!
//! Every API call goes through [`ShortlinkHttpClient::send`], which:
//! - attaches `X-CSRFToken` to state-changing requests (cache, then cookie, then fetch)
//! - times the round trip and logs slow responses
//! - on 401 refreshes the session once and replays the request once
//! - tears the session down when the refresh itself fails

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::HttpClientConfig;
use crate::constants::api_path;
use crate::csrf::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME, CsrfTokenCache, parse_cookie};
use crate::error::{ClientError, Result};
use crate::metrics::{RequestMetrics, status_class};
use crate::model::{ApiErrorBody, CsrfResponse, LoginRequest, User};
use crate::notice::{Notice, Notifier, TracingNotifier};
use crate::session::{LogoutReason, Navigator, SessionEvent, SessionEvents, TracingNavigator};

/// A replayable API request
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: None,
            body: None,
            retried: false,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach URL-encoded query parameters
    pub fn with_query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(query)
            .map_err(|e| ClientError::Other(e.into()))?;
        self.query = (!encoded.is_empty()).then_some(encoded);
        Ok(self)
    }

    /// Attach a JSON body
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Whether this request has already been replayed after a session refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    fn needs_csrf(&self) -> bool {
        self.method != Method::GET && self.path != api_path::AUTH_CSRF
    }
}

/// A fully read response
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    /// Decode the body as JSON; an empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// HTTP client wrapping every API call in the CSRF/refresh pipeline
pub struct ShortlinkHttpClient {
    client: Client,
    config: HttpClientConfig,
    base_url: Url,
    cookies: Arc<Jar>,
    csrf: CsrfTokenCache,
    session: SessionEvents,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Bumped after every refresh attempt
    refresh_epoch: AtomicU64,
    /// Outcome of the attempt that set `refresh_epoch`
    last_refresh_ok: AtomicBool,
    metrics: RequestMetrics,
}

impl ShortlinkHttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(cookies.clone())
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(ClientError::Network)?;
        let metrics = RequestMetrics::new().map_err(|e| ClientError::Other(e.into()))?;

        Ok(Self {
            client,
            csrf: CsrfTokenCache::new(config.csrf_ttl()),
            config,
            base_url,
            cookies,
            session: SessionEvents::new(),
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(TracingNavigator),
            refresh_lock: tokio::sync::Mutex::new(()),
            refresh_epoch: AtomicU64::new(0),
            last_refresh_ok: AtomicBool::new(true),
            metrics,
        })
    }

    /// Route user-facing notices to `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Route forced navigation to `navigator`
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Publish session events on an existing bus
    pub fn with_session_events(mut self, session: SessionEvents) -> Self {
        self.session = session;
        self
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn csrf_cache(&self) -> &CsrfTokenCache {
        &self.csrf
    }

    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }

    pub fn session_events(&self) -> &SessionEvents {
        &self.session
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    /// Build full URL with the API prefix
    pub fn build_url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let prefix = self.config.api_prefix.trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}{}", base, prefix, path))?)
    }

    // ============== Pipeline ==============

    /// Send a request through the pipeline.
    ///
    /// A 401 is answered with at most one session refresh and one replay.
    /// Auth endpoints and already replayed requests are never retried.
    pub async fn send(&self, mut request: ApiRequest) -> Result<RawResponse> {
        let epoch = self.refresh_epoch.load(Ordering::Acquire);
        let response = self.dispatch(&request).await?;

        if response.status != StatusCode::UNAUTHORIZED {
            return self.finish(&request, response);
        }
        if api_path::is_auth_endpoint(&request.path) || request.retried {
            debug!(
                "Not retrying 401 for {} {} (auth endpoint or already retried)",
                request.method, request.path
            );
            return self.finish(&request, response);
        }

        request.retried = true;
        warn!(
            "Received 401 for {} {}, refreshing session",
            request.method, request.path
        );
        self.refresh_after_unauthorized(epoch).await?;

        let response = self.dispatch(&request).await?;
        self.finish(&request, response)
    }

    /// Perform one HTTP round trip: CSRF attachment, timing, body read.
    async fn dispatch(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut url = self.build_url(&request.path)?;
        if let Some(query) = &request.query {
            url.set_query(Some(query));
        }

        let mut builder = self.client.request(request.method.clone(), url);
        if request.needs_csrf() {
            let token = self.csrf_token().await?;
            builder = builder.header(CSRF_HEADER_NAME, token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.transport_failure(request, e, start)),
        };
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Err(self.transport_failure(request, e, start)),
        };

        let elapsed = start.elapsed();
        self.metrics
            .record_latency(request.method.as_str(), status_class(status.as_u16()), elapsed);
        if elapsed > self.config.slow_request_threshold() {
            self.metrics.slow_requests.inc();
            warn!(
                "Slow request: {} {} took {}ms",
                request.method,
                request.path,
                elapsed.as_millis()
            );
        }
        debug!(
            "{} {} -> {} in {}ms",
            request.method,
            request.path,
            status,
            elapsed.as_millis()
        );

        Ok(RawResponse { status, body })
    }

    fn transport_failure(
        &self,
        request: &ApiRequest,
        err: reqwest::Error,
        start: Instant,
    ) -> ClientError {
        let err = ClientError::from(err);
        let timed_out = matches!(err, ClientError::Timeout);
        let label = if timed_out { "timeout" } else { "network" };
        self.metrics
            .record_latency(request.method.as_str(), label, start.elapsed());
        warn!("{} {} failed: {}", request.method, request.path, err);

        let notice = if timed_out {
            Notice::timeout()
        } else {
            Notice::network()
        };
        self.notifier.notify(notice);
        err
    }

    /// Map a non-success response to an error and raise notices for 403/5xx.
    fn finish(&self, request: &ApiRequest, response: RawResponse) -> Result<RawResponse> {
        let status = response.status;
        if status.is_success() {
            return Ok(response);
        }

        let body = ApiErrorBody::from_bytes(&response.body);
        if status.is_server_error() {
            error!(
                "Request {} {} failed with status {}: {}",
                request.method, request.path, status, body
            );
            self.notifier.notify(Notice::server_error());
        } else if status == StatusCode::FORBIDDEN {
            self.notifier.notify(Notice::permission_denied());
        }

        Err(ClientError::Http { status, body })
    }

    /// Refresh the session once for a request that observed a 401 at `epoch`.
    ///
    /// Concurrent 401s queue on the refresh lock; an attempt that completed after
    /// the request was sent is reused instead of issuing another one. If that
    /// attempt failed the session is already over.
    async fn refresh_after_unauthorized(&self, epoch: u64) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        if self.refresh_epoch.load(Ordering::Acquire) != epoch {
            if self.last_refresh_ok.load(Ordering::Acquire) {
                debug!("Session was refreshed concurrently, replaying request");
                return Ok(());
            }
            debug!("Concurrent session refresh failed, not refreshing again");
            return Err(ClientError::SessionExpired);
        }

        match self.refresh_session().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Session refresh failed: {}", e);
                self.end_session(LogoutReason::SessionExpired);
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// Call the refresh endpoint. The CSRF cache is cleared whatever the outcome.
    pub async fn refresh_session(&self) -> Result<()> {
        let request = ApiRequest::post(api_path::AUTH_REFRESH);
        let outcome = match self.dispatch(&request).await {
            Ok(response) if response.status.is_success() => Ok(()),
            Ok(response) => Err(ClientError::Http {
                status: response.status,
                body: ApiErrorBody::from_bytes(&response.body),
            }),
            Err(e) => Err(e),
        };

        self.csrf.clear();
        self.metrics.record_refresh(outcome.is_ok());
        self.last_refresh_ok.store(outcome.is_ok(), Ordering::Release);
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);
        if outcome.is_ok() {
            debug!("Session refreshed");
        }
        outcome
    }

    /// Tear down local session state and broadcast the logout.
    fn end_session(&self, reason: LogoutReason) {
        self.csrf.clear();
        self.session.publish(SessionEvent::LoggedOut { reason });
        if reason == LogoutReason::SessionExpired {
            self.notifier.notify(Notice::session_expired());
            self.navigator.navigate(&self.config.login_path);
        }
    }

    // ============== CSRF ==============

    /// Resolve a CSRF token: fresh cache entry, then cookie, then the CSRF endpoint.
    async fn csrf_token(&self) -> Result<String> {
        if let Some(token) = self.csrf.get_fresh() {
            return Ok(token);
        }
        if let Some(token) = self.cookie_csrf_token() {
            debug!("Using CSRF token from cookie");
            self.csrf.store(token.clone());
            return Ok(token);
        }
        self.fetch_csrf_token().await
    }

    fn cookie_csrf_token(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.base_url)?;
        parse_cookie(header.to_str().ok()?, CSRF_COOKIE_NAME)
    }

    /// Fetch a token from the CSRF endpoint and cache it.
    pub async fn fetch_csrf_token(&self) -> Result<String> {
        self.metrics.csrf_fetches.inc();
        let request = ApiRequest::get(api_path::AUTH_CSRF);
        // dispatch -> csrf_token -> fetch_csrf_token cycles, so the future is boxed.
        let response = Box::pin(self.dispatch(&request)).await?;
        let response = self.finish(&request, response)?;
        let parsed: CsrfResponse = response.json()?;

        debug!("Fetched CSRF token");
        self.csrf.store(parsed.csrf_token.clone());
        Ok(parsed.csrf_token)
    }

    // ============== Session ==============

    /// Log in with username and password
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(api_path::AUTH_LOGIN)
            .with_json(&LoginRequest { username, password })?;
        let user: User = self.send(request).await?.json()?;

        // The server rotates the token on login
        self.csrf.clear();
        self.session.publish(SessionEvent::LoggedIn {
            username: user.username.clone(),
        });
        Ok(user)
    }

    /// Log out; local session state is torn down even if the server call fails.
    pub async fn logout(&self) -> Result<()> {
        let result = self.send(ApiRequest::post(api_path::AUTH_LOGOUT)).await;
        self.end_session(LogoutReason::UserInitiated);
        result.map(|_| ())
    }

    // ============== Typed verbs ==============

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        self.send(ApiRequest::get(path).with_query(query)?)
            .await?
            .json()
    }

    /// Make a POST request with JSON body
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(ApiRequest::post(path).with_json(body)?)
            .await?
            .json()
    }

    /// Make a PUT request with JSON body
    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(ApiRequest::put(path).with_json(body)?)
            .await?
            .json()
    }

    /// Make a PATCH request with JSON body
    pub async fn patch_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(ApiRequest::patch(path).with_json(body)?)
            .await?
            .json()
    }

    /// Make a DELETE request, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }
}
