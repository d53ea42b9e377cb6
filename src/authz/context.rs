//! Per-request facts the checks decide on

use axum::http::header::{CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum_extra::extract::cookie::CookieJar;
use serde_json::Value;
use std::collections::HashMap;

/// The user id a request claims to act as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimedUser {
    Absent,
    /// Present but not an integer; carries the parse error
    Invalid(String),
    Id(i64),
}

impl ClaimedUser {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(ClaimedUser::Id)
                .unwrap_or_else(|| ClaimedUser::Invalid(format!("invalid user id: {}", n))),
            Value::String(s) => Self::from_text(s),
            other => ClaimedUser::Invalid(format!("invalid user id: {}", other)),
        }
    }

    /// Exact decimal only; surrounding whitespace is rejected
    fn from_text(text: &str) -> Self {
        match text.parse::<i64>() {
            Ok(id) => ClaimedUser::Id(id),
            Err(e) => ClaimedUser::Invalid(format!("invalid user id {:?}: {}", text, e)),
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            ClaimedUser::Id(id) => Some(*id),
            _ => None,
        }
    }
}

/// Everything the authorization checks look at, gathered once per request
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    pub method: Method,
    pub content_type: Option<String>,
    pub has_body: bool,
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub bearer_token: Option<String>,
    pub claimed_user: ClaimedUser,
    /// Username a request acts upon (admin routes)
    pub target_user: Option<String>,
    pub app_name: Option<String>,
    pub app_secret: Option<String>,
}

fn header_str(headers: &HeaderMap, name: impl axum::http::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn query_pairs(parts: &Parts) -> HashMap<String, String> {
    parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// The canonical form of a username taken from a request body.
///
/// Checks and handlers both go through this, so a check compares the exact
/// name a handler will later act on. Blank names yield `None`.
pub fn normalize_username(raw: &str) -> Option<&str> {
    let name = raw.trim();
    (!name.is_empty()).then_some(name)
}

/// Find the session token a browser or first-party client presented.
///
/// The named session cookie wins. A `Cookie` header holding nothing but a
/// bare token is also accepted.
pub fn bearer_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty() && !v.contains('=') && !v.contains(';'))
        .map(str::to_string)
}

impl AuthorizationContext {
    /// Context for a first-party request: token from the cookie, claimed user
    /// from the JSON body's `id` (or the `user_id` query parameter)
    pub fn from_request(parts: &Parts, body: &[u8], cookie_name: &str) -> Self {
        let headers = &parts.headers;
        let mut claimed_user = ClaimedUser::Absent;
        let mut target_user = None;

        if !body.is_empty() {
            match serde_json::from_slice::<Value>(body) {
                Ok(Value::Object(fields)) => {
                    if let Some(id) = fields.get("id") {
                        claimed_user = ClaimedUser::from_json(id);
                    }
                    target_user = fields
                        .get("username")
                        .and_then(Value::as_str)
                        .and_then(normalize_username)
                        .map(str::to_string);
                }
                Ok(_) => {
                    claimed_user = ClaimedUser::Invalid("request body is not a JSON object".into());
                }
                Err(e) => claimed_user = ClaimedUser::Invalid(e.to_string()),
            }
        }

        if claimed_user == ClaimedUser::Absent {
            if let Some(id) = query_pairs(parts).get("user_id") {
                claimed_user = ClaimedUser::from_text(id);
            }
        }

        Self {
            method: parts.method.clone(),
            content_type: header_str(headers, CONTENT_TYPE),
            has_body: !body.is_empty(),
            origin: header_str(headers, ORIGIN),
            referer: header_str(headers, REFERER),
            bearer_token: bearer_from_headers(headers, cookie_name),
            claimed_user,
            target_user,
            app_name: None,
            app_secret: None,
        }
    }

    /// Context for a server-to-server verification call: everything comes
    /// from the query string
    pub fn from_federated_query(parts: &Parts) -> Self {
        let mut query = query_pairs(parts);
        let claimed_user = query
            .get("user_id")
            .map(|id| ClaimedUser::from_text(id))
            .unwrap_or(ClaimedUser::Absent);

        Self {
            method: parts.method.clone(),
            content_type: None,
            has_body: false,
            origin: None,
            referer: None,
            bearer_token: query.remove("access_token"),
            claimed_user,
            target_user: None,
            app_name: query.remove("app_name"),
            app_secret: query.remove("secret"),
        }
    }
}
