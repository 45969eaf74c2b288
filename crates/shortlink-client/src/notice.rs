//! User-facing notices
//!
//! Every failure the pipeline or a mutation cannot resolve on its own ends up
//! here as a transient notice for the embedding application to display.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient user-facing message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn session_expired() -> Self {
        Self::error("Your session has expired. Please log in again.")
    }

    pub fn server_error() -> Self {
        Self::error("Server error. Please try again later.")
    }

    pub fn permission_denied() -> Self {
        Self::error("You do not have permission to perform this action.")
    }

    pub fn timeout() -> Self {
        Self::error("Request timed out. Please check your connection.")
    }

    pub fn network() -> Self {
        Self::error("Network error. Please check your connection.")
    }
}

/// Receives user-facing notices.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: Notice);
}

/// Notifier that writes notices to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Warning | NoticeLevel::Error => warn!("{}", notice.message),
        }
    }
}

/// A notifier that invokes a closure.
pub struct FnNotifier<F>
where
    F: Fn(Notice) + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnNotifier<F>
where
    F: Fn(Notice) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Notifier for FnNotifier<F>
where
    F: Fn(Notice) + Send + Sync + 'static,
{
    fn notify(&self, notice: Notice) {
        (self.f)(notice);
    }
}

/// Notifier that queues notices until the application drains them.
#[derive(Debug, Default)]
pub struct QueuedNotifier {
    queue: Mutex<VecDeque<Notice>>,
}

impl QueuedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Notifier for QueuedNotifier {
    fn notify(&self, notice: Notice) {
        self.queue.lock().push_back(notice);
    }
}
