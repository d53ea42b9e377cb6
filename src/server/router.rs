//! Route table and per-route authorization chains

use crate::authz::{
    AppCredentialsCheck, ElevationCheck, FederatedParamsCheck, OriginCheck, OriginPolicy,
    OwnershipCheck, Pipeline, SelfProtectionCheck, ShapeCheck, TokenCheck,
};
use crate::server::guard::{guard, ContextSource, Guard};
use crate::server::handlers;
use crate::server::state::PortalState;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{any, get, MethodRouter};
use axum::Router;
use std::sync::Arc;

/// The named check chains the routes are built from
#[derive(Clone)]
pub struct Chains {
    /// Shape, Origin
    pub login: Pipeline,
    /// login + Token, Ownership
    pub self_service: Pipeline,
    /// self_service + Elevation
    pub admin: Pipeline,
    /// admin + SelfProtection
    pub destructive: Pipeline,
    /// Token, Ownership (cookie-authenticated GET)
    pub welcome: Pipeline,
    /// FederatedParams, AppCredentials, Token, Ownership
    pub federated: Pipeline,
}

impl Chains {
    pub fn new(state: &PortalState) -> Self {
        let sessions = &state.sessions;
        let directory = &state.directory;
        let policy = Arc::new(OriginPolicy::new(
            &state.settings.trusted_domain,
            state.settings.dev_hosts.clone(),
        ));

        let login = Pipeline::new().then(ShapeCheck).then(OriginCheck::new(policy));
        let self_service = login
            .clone()
            .then(TokenCheck::new(sessions.clone(), StatusCode::BAD_REQUEST))
            .then(OwnershipCheck::new(sessions.clone()));
        let admin = self_service
            .clone()
            .then(ElevationCheck::new(directory.clone()));
        let destructive = admin
            .clone()
            .then(SelfProtectionCheck::new(directory.clone()));

        let welcome = Pipeline::new()
            .then(TokenCheck::new(sessions.clone(), StatusCode::BAD_REQUEST))
            .then(OwnershipCheck::new(sessions.clone()));

        let federated = Pipeline::new()
            .then(FederatedParamsCheck)
            .then(AppCredentialsCheck::new(state.apps.clone()))
            .then(TokenCheck::new(sessions.clone(), StatusCode::UNAUTHORIZED))
            .then(OwnershipCheck::new(sessions.clone()));

        Self {
            login,
            self_service,
            admin,
            destructive,
            welcome,
            federated,
        }
    }
}

/// Build the portal's HTTP router
pub fn create_router(state: PortalState) -> Router {
    let chains = Chains::new(&state);
    let cookie_name: Arc<str> = Arc::from(state.settings.cookie_name.as_str());

    let guarded = |route: MethodRouter<PortalState>,
                   pipeline: &Pipeline,
                   source: ContextSource|
     -> MethodRouter<PortalState> {
        let guard_state = Guard::new(pipeline.clone(), source, cookie_name.clone());
        route.layer(from_fn_with_state(guard_state, guard))
    };

    // POST routes accept any method so the shape check can reject the rest with 400
    Router::new()
        .route(
            "/login/credentials",
            guarded(any(handlers::login), &chains.login, ContextSource::FirstParty),
        )
        .route(
            "/register/credentials",
            guarded(any(handlers::register), &chains.admin, ContextSource::FirstParty),
        )
        .route(
            "/update/username",
            guarded(
                any(handlers::update_username),
                &chains.self_service,
                ContextSource::FirstParty,
            ),
        )
        .route(
            "/update/password",
            guarded(
                any(handlers::update_password),
                &chains.self_service,
                ContextSource::FirstParty,
            ),
        )
        .route(
            "/admin/password",
            guarded(
                any(handlers::admin_reset_password),
                &chains.admin,
                ContextSource::FirstParty,
            ),
        )
        .route(
            "/admin/new",
            guarded(any(handlers::admin_grant), &chains.admin, ContextSource::FirstParty),
        )
        .route(
            "/admin/revoke",
            guarded(
                any(handlers::admin_revoke),
                &chains.destructive,
                ContextSource::FirstParty,
            ),
        )
        .route(
            "/admin/delete/user",
            guarded(
                any(handlers::admin_delete_user),
                &chains.destructive,
                ContextSource::FirstParty,
            ),
        )
        .route(
            "/verify/token",
            guarded(get(handlers::verify_token), &chains.federated, ContextSource::Federated),
        )
        .route(
            "/welcome",
            guarded(get(handlers::welcome), &chains.welcome, ContextSource::FirstParty),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
}
