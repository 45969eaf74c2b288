//! Current organization and the permissions the user holds in it
//!
//! Kept in memory only. The context is emptied when the session ends.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use shortlink_client::{Organization, Role, SessionEvent, SessionEvents};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOrganization,
    ManageOrganization,
    DeleteOrganization,
    ViewMembers,
    ManageMembers,
    ViewNamespaces,
    ManageNamespaces,
    ViewUrls,
    ManageUrls,
    ViewAnalytics,
}

const VIEWER: &[Permission] = &[
    Permission::ViewOrganization,
    Permission::ViewMembers,
    Permission::ViewNamespaces,
    Permission::ViewUrls,
    Permission::ViewAnalytics,
];

const EDITOR: &[Permission] = &[
    Permission::ViewOrganization,
    Permission::ViewMembers,
    Permission::ViewNamespaces,
    Permission::ManageNamespaces,
    Permission::ViewUrls,
    Permission::ManageUrls,
    Permission::ViewAnalytics,
];

const ADMIN: &[Permission] = &[
    Permission::ViewOrganization,
    Permission::ManageOrganization,
    Permission::ViewMembers,
    Permission::ManageMembers,
    Permission::ViewNamespaces,
    Permission::ManageNamespaces,
    Permission::ViewUrls,
    Permission::ManageUrls,
    Permission::ViewAnalytics,
];

const OWNER: &[Permission] = &[
    Permission::ViewOrganization,
    Permission::ManageOrganization,
    Permission::DeleteOrganization,
    Permission::ViewMembers,
    Permission::ManageMembers,
    Permission::ViewNamespaces,
    Permission::ManageNamespaces,
    Permission::ViewUrls,
    Permission::ManageUrls,
    Permission::ViewAnalytics,
];

/// Permissions granted by `role`
pub fn role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::Owner => OWNER,
        Role::Admin => ADMIN,
        Role::Editor => EDITOR,
        Role::Viewer => VIEWER,
    }
}

#[derive(Clone, Debug)]
struct Selection {
    organization: Organization,
    role: Role,
    permissions: HashSet<Permission>,
}

#[derive(Clone, Debug, Default)]
pub struct OrganizationContext {
    inner: Arc<RwLock<Option<Selection>>>,
}

impl OrganizationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current organization and recompute permissions for `role`
    pub fn select(&self, organization: Organization, role: Role) {
        info!("Selected organization {} as {:?}", organization.name, role);
        let permissions = role_permissions(role).iter().copied().collect();
        *self.inner.write() = Some(Selection {
            organization,
            role,
            permissions,
        });
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn organization(&self) -> Option<Organization> {
        self.inner.read().as_ref().map(|s| s.organization.clone())
    }

    pub fn organization_id(&self) -> Option<u64> {
        self.inner
            .read()
            .as_ref()
            .and_then(|s| s.organization.id.as_server())
    }

    pub fn role(&self) -> Option<Role> {
        self.inner.read().as_ref().map(|s| s.role)
    }

    /// Whether the user may do `permission` in the current organization.
    /// Always `false` with no organization selected.
    pub fn can(&self, permission: Permission) -> bool {
        self.inner
            .read()
            .as_ref()
            .is_some_and(|s| s.permissions.contains(&permission))
    }

    /// Empty the context whenever the session ends
    pub fn watch_session(&self, events: &SessionEvents) -> JoinHandle<()> {
        let context = self.clone();
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::LoggedOut { reason }) => {
                        debug!("Session ended ({:?}), clearing organization context", reason);
                        context.clear();
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => context.clear(),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
