//! Shortlink Client - Rust SDK for the Shortlink REST API
//!
//! This crate provides:
//! - HTTP request pipeline with CSRF token caching and refresh-on-401
//! - API client with typed methods for the organization, namespace and URL endpoints
//! - Model types for API requests and responses
//! - Session event bus, user-facing notices and navigation seams
//! - Prometheus request metrics

pub mod api;
pub mod config;
pub mod constants;
pub mod csrf;
pub mod error;
pub mod http;
pub mod metrics;
pub mod model;
pub mod notice;
pub mod session;

pub use api::ShortlinkApiClient;
pub use config::HttpClientConfig;
pub use error::ClientError;
pub use http::{ApiRequest, RawResponse, ShortlinkHttpClient};
pub use model::*;
pub use notice::{FnNotifier, Notice, NoticeLevel, Notifier, QueuedNotifier, TracingNotifier};
pub use session::{
    FnNavigator, LogoutReason, Navigator, SessionEvent, SessionEvents, TracingNavigator,
};
