//! Route handlers
//!
//! Handlers only run after their route's guard has passed, so the acting
//! user arrives as an [`Actor`] extension rather than being re-derived here.

use crate::auth::password::generate_password;
use crate::authz::{bearer_from_headers, normalize_username, Rejection};
use crate::error::PortalError;
use crate::server::cookies::session_cookie;
use crate::server::guard::Actor;
use crate::server::state::PortalState;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{info, warn};

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, PortalError> {
    Ok(serde_json::from_slice(body)?)
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, PortalError> {
    if value.is_empty() {
        Err(PortalError::Malformed(format!("{} must not be empty", field)))
    } else {
        Ok(value)
    }
}

/// Same normalisation the authorization checks saw for this body
fn require_username(value: &str) -> Result<&str, PortalError> {
    normalize_username(value)
        .ok_or_else(|| PortalError::Malformed("username must not be empty".into()))
}

/// Accepts `true`/`false` or their string spellings
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
    })
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: i64,
    pub access_token: String,
    pub name: String,
}

/// `POST /login/credentials`
pub async fn login(
    State(state): State<PortalState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<LoginResponse>), PortalError> {
    let creds: Credentials = parse_body(&body)?;

    let identity = match state.credentials.check_login(&creds.username, &creds.password).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            warn!(username = %creds.username, "Failed login");
            return Err(PortalError::InvalidCredentials);
        }
        Err(e) => {
            warn!(username = %creds.username, error = %e, "Credential check failed");
            return Err(PortalError::InvalidCredentials);
        }
    };

    let session = state.sessions.issue(&identity)?;
    info!(session = %session.id, user_id = session.user_id, "User logged in");

    let cookie = session_cookie(&state.settings, &session.token, state.sessions.policy().ttl());
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            id: session.user_id,
            access_token: session.token,
            name: session.user_name,
        }),
    ))
}

/// `GET /verify/token`
pub async fn verify_token() -> Json<serde_json::Value> {
    Json(json!({ "message": "Authorized" }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub id: i64,
    pub name: String,
    pub apps: Vec<String>,
}

/// `GET /welcome?user_id=`
pub async fn welcome(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Json<WelcomeResponse>, PortalError> {
    // The session may have lapsed between the guard and here
    let session = bearer_from_headers(&headers, &state.settings.cookie_name)
        .and_then(|token| state.sessions.lookup(&token))
        .ok_or_else(|| Rejection::bad_request("Access token is unauthorized"))?;

    Ok(Json(WelcomeResponse {
        id: session.user_id,
        name: session.user_name,
        apps: state.apps.names().into_iter().map(str::to_string).collect(),
    }))
}

#[derive(Debug, Deserialize)]
struct Registration {
    username: String,
    password: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    admin: bool,
}

/// `POST /register/credentials`
pub async fn register(
    State(state): State<PortalState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<&'static str, PortalError> {
    let reg: Registration = parse_body(&body)?;
    let username = require_username(&reg.username)?;
    let password = require("password", &reg.password)?;

    let created = state.directory.create_user(username, password, reg.admin).await?;
    info!(actor = actor.user_id, user_id = created.id, admin = reg.admin, "User registered");

    Ok("New user has been registered")
}

#[derive(Debug, Deserialize)]
struct UsernameChange {
    username: String,
}

/// `POST /update/username`
pub async fn update_username(
    State(state): State<PortalState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<StatusCode, PortalError> {
    let change: UsernameChange = parse_body(&body)?;
    let username = require_username(&change.username)?;

    state.directory.rename_user(actor.user_id, username).await?;
    info!(user_id = actor.user_id, "Username updated");

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct PasswordChange {
    old_password: String,
    new_password: String,
}

/// `POST /update/password`
pub async fn update_password(
    State(state): State<PortalState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<StatusCode, PortalError> {
    let change: PasswordChange = parse_body(&body)?;
    let new_password = require("new_password", &change.new_password)?;

    if !state.credentials.verify_password(actor.user_id, &change.old_password).await? {
        warn!(user_id = actor.user_id, "Password change with wrong old password");
        return Err(PortalError::WrongPassword);
    }

    state.directory.set_password(actor.user_id, new_password).await?;
    info!(user_id = actor.user_id, "Password updated");

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct AdminTarget {
    username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResponse {
    pub password: String,
}

/// `POST /admin/password`: replace a user's password with a generated one
pub async fn admin_reset_password(
    State(state): State<PortalState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<Json<PasswordResponse>, PortalError> {
    let target: AdminTarget = parse_body(&body)?;
    let username = require_username(&target.username)?;

    let password = generate_password(state.settings.reset_password_length);
    state.directory.reset_password(username, &password).await?;
    info!(actor = actor.user_id, target = %username, "Password reset by admin");

    Ok(Json(PasswordResponse { password }))
}

/// `POST /admin/new`
pub async fn admin_grant(
    State(state): State<PortalState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<StatusCode, PortalError> {
    let target: AdminTarget = parse_body(&body)?;
    let username = require_username(&target.username)?;

    state.directory.set_admin(username, true).await?;
    info!(actor = actor.user_id, target = %username, "Admin granted");

    Ok(StatusCode::OK)
}

/// `POST /admin/revoke`
pub async fn admin_revoke(
    State(state): State<PortalState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<StatusCode, PortalError> {
    let target: AdminTarget = parse_body(&body)?;
    let username = require_username(&target.username)?;

    state.directory.set_admin(username, false).await?;
    info!(actor = actor.user_id, target = %username, "Admin revoked");

    Ok(StatusCode::OK)
}

/// `POST /admin/delete/user`
pub async fn admin_delete_user(
    State(state): State<PortalState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<StatusCode, PortalError> {
    let target: AdminTarget = parse_body(&body)?;
    let username = require_username(&target.username)?;

    state.directory.delete_user(username).await?;
    info!(actor = actor.user_id, target = %username, "User deleted");

    Ok(StatusCode::OK)
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
