//! Shared handler state

use crate::auth::{AppRegistry, SessionStore};
use crate::storage::{CredentialVerifier, UserDirectory};
use std::sync::Arc;

/// HTTP-facing settings
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Origin the portal's own pages are served from, e.g. `https://portal.example.com`
    pub trusted_domain: String,
    /// Hosts accepted as origins during local development
    pub dev_hosts: Vec<String>,
    pub cookie_name: String,
    pub secure_cookies: bool,
    /// Length of passwords generated by admin resets
    pub reset_password_length: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            trusted_domain: "http://localhost:3333".into(),
            dev_hosts: vec!["localhost".into()],
            cookie_name: "portal_session".into(),
            secure_cookies: true,
            reset_password_length: 16,
        }
    }
}

/// Everything a handler or check can reach
#[derive(Clone)]
pub struct PortalState {
    pub sessions: Arc<SessionStore>,
    pub apps: Arc<AppRegistry>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub directory: Arc<dyn UserDirectory>,
    pub settings: Arc<HttpSettings>,
}

impl PortalState {
    pub fn new(
        sessions: Arc<SessionStore>,
        apps: Arc<AppRegistry>,
        credentials: Arc<dyn CredentialVerifier>,
        directory: Arc<dyn UserDirectory>,
        settings: HttpSettings,
    ) -> Self {
        Self {
            sessions,
            apps,
            credentials,
            directory,
            settings: Arc::new(settings),
        }
    }
}
