// REST API path constants, relative to the configured API prefix

pub mod api_path {
    // Auth
    pub const AUTH_PREFIX: &str = "/auth/";
    pub const AUTH_CSRF: &str = "/auth/csrf/";
    pub const AUTH_LOGIN: &str = "/auth/login/";
    pub const AUTH_LOGOUT: &str = "/auth/logout/";
    pub const AUTH_REFRESH: &str = "/auth/refresh/";
    pub const AUTH_ME: &str = "/auth/me/";

    // Organizations
    pub const ORGANIZATIONS: &str = "/organizations/";

    // Invitations
    pub const INVITATIONS: &str = "/invitations/";

    // Namespaces
    pub const NAMESPACES: &str = "/namespaces/";

    // Short URLs
    pub const URLS: &str = "/urls/";

    /// `/<collection>/<id>/`
    pub fn detail(collection: &str, id: impl std::fmt::Display) -> String {
        format!("{}{}/", collection, id)
    }

    /// `/<collection>/<id>/<action>/`
    pub fn nested(collection: &str, id: impl std::fmt::Display, action: &str) -> String {
        format!("{}{}/{}/", collection, id, action)
    }

    pub fn is_auth_endpoint(path: &str) -> bool {
        path.starts_with(AUTH_PREFIX)
    }
}
