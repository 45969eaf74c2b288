//! Session lifecycle events and navigation
//!
//! Session teardown is broadcast on a typed channel so that every part of the
//! application that keeps per-session state can reset itself.

use tokio::sync::broadcast;
use tracing::info;

/// Why a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out
    UserInitiated,
    /// A refresh attempt failed after the server rejected the session
    SessionExpired,
}

/// Events published on the session bus
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    LoggedOut { reason: LogoutReason },
}

/// Broadcast bus for [`SessionEvent`]s
#[derive(Clone, Debug)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Moves the embedding application to another entry point (e.g. the login page).
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, path: &str);
}

/// Navigator that only records the request in the log.
#[derive(Debug, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, path: &str) {
        info!("Navigation requested to {}", path);
    }
}

/// A navigator that invokes a closure.
pub struct FnNavigator<F>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnNavigator<F>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Navigator for FnNavigator<F>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn navigate(&self, path: &str) {
        (self.f)(path);
    }
}
