//! The individual authorization checks
//!
//! | Check           | Rejects with |
//! |-----------------|--------------|
//! | `Shape`         | 400          |
//! | `Origin`        | 400          |
//! | `Token`         | configurable (400 first-party, 401 federated) |
//! | `Ownership`     | 401 (400 when the user id is missing or malformed) |
//! | `Elevation`     | 401          |
//! | `SelfProtection`| 500          |
//! | `FederatedParams`, `AppCredentials` | 401 |

use crate::auth::{is_well_formed, AppRegistry, SessionStore};
use crate::authz::context::{AuthorizationContext, ClaimedUser};
use crate::authz::pipeline::{Check, Rejection};
use crate::storage::UserDirectory;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use std::sync::Arc;
use tracing::{error, warn};
use url::Url;

/// POST with a non-empty `application/json` body
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeCheck;

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[async_trait]
impl Check for ShapeCheck {
    fn name(&self) -> &'static str {
        "shape"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        if ctx.method != Method::POST {
            return Err(Rejection::bad_request("This route only accepts POST request"));
        }

        if !ctx.content_type.as_deref().is_some_and(is_json) {
            return Err(Rejection::bad_request("Content-Type not set to application/json"));
        }

        if !ctx.has_body {
            return Err(Rejection::bad_request("Request body is missing"));
        }

        Ok(())
    }
}

/// Which `Origin`/`Referer` values count as first-party
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    trusted: String,
    trusted_origin: Option<String>,
    dev_hosts: Vec<String>,
}

impl OriginPolicy {
    pub fn new(trusted_domain: &str, dev_hosts: Vec<String>) -> Self {
        let trusted = trusted_domain.trim().trim_end_matches('/').to_string();
        let trusted_origin = Url::parse(&trusted)
            .ok()
            .map(|url| url.origin().ascii_serialization())
            .filter(|origin| origin != "null");

        Self {
            trusted,
            trusted_origin,
            dev_hosts: dev_hosts
                .into_iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn trusted_domain(&self) -> &str {
        &self.trusted
    }

    fn is_dev_host(&self, value: &str) -> bool {
        let value = value.trim().to_ascii_lowercase();
        if self.dev_hosts.iter().any(|h| *h == value) {
            return true;
        }

        Url::parse(&value)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.trim_matches(['[', ']']).to_string()))
            .is_some_and(|host| self.dev_hosts.iter().any(|h| *h == host))
    }

    /// `Origin` matches the trusted domain exactly (trailing slash ignored)
    pub fn origin_allowed(&self, origin: &str) -> bool {
        origin.trim().trim_end_matches('/') == self.trusted || self.is_dev_host(origin)
    }

    /// `Referer` matches when it was sent from a page on the trusted origin
    pub fn referer_allowed(&self, referer: &str) -> bool {
        let referer = referer.trim();
        if referer.trim_end_matches('/') == self.trusted || self.is_dev_host(referer) {
            return true;
        }

        match (&self.trusted_origin, Url::parse(referer)) {
            (Some(trusted), Ok(url)) => url.origin().ascii_serialization() == *trusted,
            _ => false,
        }
    }

    pub fn allows(&self, origin: Option<&str>, referer: Option<&str>) -> bool {
        origin.is_some_and(|o| self.origin_allowed(o))
            || referer.is_some_and(|r| self.referer_allowed(r))
    }
}

/// Request was sent from the portal's own pages (or a local dev host)
#[derive(Debug, Clone)]
pub struct OriginCheck {
    policy: Arc<OriginPolicy>,
}

impl OriginCheck {
    pub fn new(policy: Arc<OriginPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Check for OriginCheck {
    fn name(&self) -> &'static str {
        "origin"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        if self
            .policy
            .allows(ctx.origin.as_deref(), ctx.referer.as_deref())
        {
            Ok(())
        } else {
            warn!(
                origin = ?ctx.origin,
                referer = ?ctx.referer,
                trusted = %self.policy.trusted_domain(),
                "Cross-origin request refused"
            );
            Err(Rejection::bad_request("Origin nor Referer are authorized"))
        }
    }
}

/// Bearer token names a live session
#[derive(Clone)]
pub struct TokenCheck {
    sessions: Arc<SessionStore>,
    failure: StatusCode,
}

impl TokenCheck {
    pub fn new(sessions: Arc<SessionStore>, failure: StatusCode) -> Self {
        Self { sessions, failure }
    }
}

#[async_trait]
impl Check for TokenCheck {
    fn name(&self) -> &'static str {
        "token"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        match ctx.bearer_token.as_deref() {
            Some(token) if is_well_formed(token) && self.sessions.is_valid(token) => Ok(()),
            _ => Err(Rejection::new(self.failure, "Access token is unauthorized")),
        }
    }
}

/// Bearer token's session belongs to the user the request claims to act as
#[derive(Clone)]
pub struct OwnershipCheck {
    sessions: Arc<SessionStore>,
}

impl OwnershipCheck {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Check for OwnershipCheck {
    fn name(&self) -> &'static str {
        "ownership"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        let user_id = match &ctx.claimed_user {
            ClaimedUser::Id(id) => *id,
            ClaimedUser::Absent => return Err(Rejection::bad_request("Missing user id")),
            ClaimedUser::Invalid(reason) => return Err(Rejection::bad_request(reason.clone())),
        };

        match ctx.bearer_token.as_deref() {
            Some(token) if self.sessions.owns_user(token, user_id) => Ok(()),
            _ => Err(Rejection::unauthorized("Access token is not authorized for user")),
        }
    }
}

const NOT_ADMIN: &str = "User is not an admin. Unauthorized action.";

/// Acting user holds the admin flag
#[derive(Clone)]
pub struct ElevationCheck {
    directory: Arc<dyn UserDirectory>,
}

impl ElevationCheck {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Check for ElevationCheck {
    fn name(&self) -> &'static str {
        "elevation"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        let Some(user_id) = ctx.claimed_user.id() else {
            return Err(Rejection::unauthorized(NOT_ADMIN));
        };

        match self.directory.is_admin(user_id).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(user_id, "Admin action attempted by non-admin");
                Err(Rejection::unauthorized(NOT_ADMIN))
            }
            Err(e) => {
                error!(user_id, error = %e, "Admin lookup failed");
                Err(Rejection::unauthorized(NOT_ADMIN))
            }
        }
    }
}

/// Destructive admin actions may not target the acting admin
#[derive(Clone)]
pub struct SelfProtectionCheck {
    directory: Arc<dyn UserDirectory>,
}

impl SelfProtectionCheck {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Check for SelfProtectionCheck {
    fn name(&self) -> &'static str {
        "self-protection"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        let Some(user_id) = ctx.claimed_user.id() else {
            return Err(Rejection::bad_request("Missing user id"));
        };
        let Some(target) = ctx.target_user.as_deref() else {
            return Err(Rejection::bad_request("Missing username"));
        };

        match self.directory.name_of(user_id).await {
            Ok(name) if name == target => Err(Rejection::conflict("Cannot target yourself")),
            Ok(_) => Ok(()),
            Err(e) => {
                error!(user_id, error = %e, "Acting user lookup failed");
                Err(Rejection::conflict("Could not resolve acting user"))
            }
        }
    }
}

/// All four federated verification parameters are present
#[derive(Debug, Clone, Copy, Default)]
pub struct FederatedParamsCheck;

#[async_trait]
impl Check for FederatedParamsCheck {
    fn name(&self) -> &'static str {
        "federated-params"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        let complete = ctx.bearer_token.is_some()
            && ctx.claimed_user != ClaimedUser::Absent
            && ctx.app_name.is_some()
            && ctx.app_secret.is_some();

        if complete {
            Ok(())
        } else {
            Err(Rejection::unauthorized(
                "Must include access_token, user_id, app_name, and secret in query params",
            ))
        }
    }
}

/// Caller is a registered app presenting its own secret
#[derive(Clone)]
pub struct AppCredentialsCheck {
    registry: Arc<AppRegistry>,
}

impl AppCredentialsCheck {
    pub fn new(registry: Arc<AppRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Check for AppCredentialsCheck {
    fn name(&self) -> &'static str {
        "app-credentials"
    }

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        match (ctx.app_name.as_deref(), ctx.app_secret.as_deref()) {
            (Some(name), Some(secret)) if self.registry.verify(name, secret) => Ok(()),
            _ => Err(Rejection::unauthorized("Application credentials are not recognized")),
        }
    }
}
