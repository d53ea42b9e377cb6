//! Session cookie construction

use crate::server::state::HttpSettings;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::TimeDelta;
use time::Duration;

/// Cookie carrying the session token back to the browser
pub(super) fn session_cookie(settings: &HttpSettings, token: &str, ttl: TimeDelta) -> Cookie<'static> {
    Cookie::build((settings.cookie_name.clone(), token.to_string()))
        .http_only(true)
        .secure(settings.secure_cookies)
        .same_site(SameSite::Strict)
        .path("/".to_string())
        .max_age(Duration::seconds(ttl.num_seconds()))
        .build()
}
