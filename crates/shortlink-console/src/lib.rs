//! Shortlink Console - optimistic client state for the Shortlink API
//!
//! This crate provides:
//! - A process-wide query cache with key-scoped reads, snapshots and invalidation
//! - One generic optimistic mutation engine for organizations, namespaces and URLs
//! - The current organization context with role-based permissions
//! - Interval polling gated on application visibility
//! - Configuration loading and logging setup

pub mod cache;
pub mod config;
pub mod console;
pub mod context;
pub mod entity;
pub mod error;
pub mod logging;
pub mod mutation;
pub mod poll;

pub use cache::{CacheKey, EntityKind, Invalidate, QueryCache, Row, Snapshot, View};
pub use config::ConsoleConfig;
pub use console::Console;
pub use context::{OrganizationContext, Permission};
pub use entity::{Entity, EntityApi, NamespaceApi, OrganizationApi, UrlApi};
pub use error::ConsoleError;
pub use logging::init_logging;
pub use mutation::{MutationAction, MutationEngine};
pub use poll::{PollHandle, Poller, Visibility};
