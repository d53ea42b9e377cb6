//! Integration tests for the portal HTTP surface
//!
//! The router is driven in-process; time is a manual clock so expiry can be
//! exercised without sleeping.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::TimeDelta;
use portal::auth::{AppRegistry, ManualClock, SessionStore};
use portal::server::{HttpSettings, LoginResponse, PortalServer, PortalServerConfig};
use portal::storage::{InMemoryDirectory, UserDirectory};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const TRUSTED: &str = "https://portal.example.com";

struct Harness {
    router: Router,
    clock: Arc<ManualClock>,
    directory: Arc<InMemoryDirectory>,
    sessions: Arc<SessionStore>,
}

/// alice (id 1) is an admin, bob (id 2) is not
async fn harness() -> Harness {
    let directory = Arc::new(InMemoryDirectory::new());
    directory.create_user("alice", "pw", true).await.unwrap();
    directory.create_user("bob", "builder", false).await.unwrap();

    let clock = Arc::new(ManualClock::starting_now());
    let config = PortalServerConfig {
        http: HttpSettings {
            trusted_domain: TRUSTED.into(),
            ..Default::default()
        },
        session_ttl: Duration::from_secs(2 * 60 * 60),
        ..Default::default()
    };

    let server = PortalServer::with_collaborators(
        config,
        AppRegistry::from_pairs([("billing", "s3cret")]),
        directory.clone(),
        directory.clone(),
        clock.clone(),
    );

    Harness {
        router: server.router(),
        clock,
        directory,
        sessions: server.sessions(),
    }
}

fn post(path: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, TRUSTED);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("portal_session={}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

async fn login(router: &Router, username: &str, password: &str) -> LoginResponse {
    let (status, body) = send(
        router,
        post(
            "/login/credentials",
            json!({ "username": username, "password": password }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    serde_json::from_str(&body).unwrap()
}

fn verify_uri(token: &str, user_id: i64, app: &str, secret: &str) -> String {
    format!(
        "/verify/token?access_token={}&user_id={}&app_name={}&secret={}",
        token, user_id, app, secret
    )
}

#[tokio::test]
async fn test_login_issues_token_and_cookie() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(post(
            "/login/credentials",
            json!({ "username": "alice", "password": "pw" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("portal_session="));
    assert!(cookie.contains("HttpOnly"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["id"], 1);
    assert_eq!(body["name"], "alice");

    let token = body["accessToken"].as_str().unwrap();
    assert_eq!(token.len(), 10);
    assert!(cookie.contains(token));
    assert!(h.sessions.is_valid(token));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let h = harness().await;

    let (status, _) = send(
        &h.router,
        post(
            "/login/credentials",
            json!({ "username": "alice", "password": "nope" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &h.router,
        post(
            "/login/credentials",
            json!({ "username": "nobody", "password": "pw" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.sessions.is_empty());
}

#[tokio::test]
async fn test_relogin_keeps_earlier_sessions() {
    let h = harness().await;

    let first = login(&h.router, "alice", "pw").await;
    let second = login(&h.router, "alice", "pw").await;

    assert_ne!(first.access_token, second.access_token);
    assert!(h.sessions.is_valid(&first.access_token));
    assert!(h.sessions.is_valid(&second.access_token));
}

#[tokio::test]
async fn test_federated_verify() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;

    let (status, body) = send(
        &h.router,
        get(&verify_uri(&alice.access_token, 1, "billing", "s3cret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({ "message": "Authorized" })
    );

    // Token belongs to user 1
    let (status, _) = send(
        &h.router,
        get(&verify_uri(&alice.access_token, 2, "billing", "s3cret")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_federated_verify_rejects_app_credentials() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;

    let (wrong_secret, wrong_secret_body) = send(
        &h.router,
        get(&verify_uri(&alice.access_token, 1, "billing", "guess")),
    )
    .await;
    let (unknown_app, unknown_app_body) = send(
        &h.router,
        get(&verify_uri(&alice.access_token, 1, "payroll", "s3cret")),
    )
    .await;

    assert_eq!(wrong_secret, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_app, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_secret_body, unknown_app_body);

    let (status, _) = send(
        &h.router,
        get(&format!("/verify/token?access_token={}&user_id=1", alice.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&h.router, get(&verify_uri("ZZZZZZZZZZ", 1, "billing", "s3cret"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_expires_with_clock() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;
    let uri = verify_uri(&alice.access_token, 1, "billing", "s3cret");

    h.clock.advance(TimeDelta::minutes(119));
    let (status, _) = send(&h.router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    h.clock.advance(TimeDelta::minutes(2));
    let (status, _) = send(&h.router, get(&uri)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Expired on the cookie routes too
    let (status, _) = send(
        &h.router,
        post(
            "/update/username",
            json!({ "id": 1, "username": "alicia" }),
            Some(&alice.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shape_and_origin_gating() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;
    let body = json!({ "id": 2, "username": "robert" });

    // Wrong method
    let request = Request::builder()
        .method(Method::GET)
        .uri("/update/username")
        .header(header::ORIGIN, TRUSTED)
        .header(header::COOKIE, format!("portal_session={}", bob.access_token))
        .body(Body::empty())
        .unwrap();
    let (status, message) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "This route only accepts POST request");

    // Wrong content type
    let request = Request::builder()
        .method(Method::POST)
        .uri("/update/username")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::ORIGIN, TRUSTED)
        .header(header::COOKIE, format!("portal_session={}", bob.access_token))
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Foreign origin and referer, valid token
    let request = Request::builder()
        .method(Method::POST)
        .uri("/update/username")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "https://evil.example.net")
        .header(header::REFERER, "https://evil.example.net/page")
        .header(header::COOKIE, format!("portal_session={}", bob.access_token))
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No effect happened
    assert_eq!(h.directory.name_of(2).await.unwrap(), "bob");

    // Referer alone is enough
    let request = Request::builder()
        .method(Method::POST)
        .uri("/update/username")
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .header(header::REFERER, format!("{}/settings", TRUSTED))
        .header(header::COOKIE, format!("portal_session={}", bob.access_token))
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_username() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;

    let (status, _) = send(
        &h.router,
        post(
            "/update/username",
            json!({ "id": "2", "username": "robert" }),
            Some(&bob.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.directory.name_of(2).await.unwrap(), "robert");
}

#[tokio::test]
async fn test_ownership_isolation() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;

    let (status, message) = send(
        &h.router,
        post(
            "/update/username",
            json!({ "id": 1, "username": "mallory" }),
            Some(&bob.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "Access token is not authorized for user");
    assert_eq!(h.directory.name_of(1).await.unwrap(), "alice");

    // Missing and malformed ids
    let (status, _) = send(
        &h.router,
        post("/update/username", json!({ "username": "x" }), Some(&bob.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.router,
        post(
            "/update/username",
            json!({ "id": "two", "username": "x" }),
            Some(&bob.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_token_is_bad_request() {
    let h = harness().await;

    let (status, message) = send(
        &h.router,
        post("/update/username", json!({ "id": 2, "username": "robert" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "Access token is unauthorized");
}

#[tokio::test]
async fn test_bare_cookie_header_token() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/update/username")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, TRUSTED)
        .header(header::COOKIE, bob.access_token.as_str())
        .body(Body::from(json!({ "id": 2, "username": "robert" }).to_string()))
        .unwrap();
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_password() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;

    let (status, _) = send(
        &h.router,
        post(
            "/update/password",
            json!({ "id": 2, "old_password": "wrong", "new_password": "carpenter" }),
            Some(&bob.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &h.router,
        post(
            "/update/password",
            json!({ "id": 2, "old_password": "builder", "new_password": "carpenter" }),
            Some(&bob.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let relogin = login(&h.router, "bob", "carpenter").await;
    assert_eq!(relogin.id, 2);
}

#[tokio::test]
async fn test_non_admin_is_refused() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;

    let (status, message) = send(
        &h.router,
        post(
            "/admin/new",
            json!({ "id": 2, "username": "bob" }),
            Some(&bob.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "User is not an admin. Unauthorized action.");
    assert!(!h.directory.is_admin(2).await.unwrap());
}

#[tokio::test]
async fn test_admin_grant_and_revoke() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;

    let (status, _) = send(
        &h.router,
        post(
            "/admin/new",
            json!({ "id": 1, "username": "bob" }),
            Some(&alice.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.directory.is_admin(2).await.unwrap());

    let (status, _) = send(
        &h.router,
        post(
            "/admin/revoke",
            json!({ "id": 1, "username": "bob" }),
            Some(&alice.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!h.directory.is_admin(2).await.unwrap());
}

#[tokio::test]
async fn test_admin_cannot_target_self() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;

    // Surrounding whitespace names the same user the handler would act on
    for path in ["/admin/revoke", "/admin/delete/user"] {
        for name in ["alice", " alice", "alice ", "\talice\n"] {
            let (status, message) = send(
                &h.router,
                post(path, json!({ "id": 1, "username": name }), Some(&alice.access_token)),
            )
            .await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{} {:?}", path, name);
            assert_eq!(message, "Cannot target yourself");
        }
    }

    assert!(h.directory.is_admin(1).await.unwrap());
    assert_eq!(h.directory.name_of(1).await.unwrap(), "alice");
}

#[tokio::test]
async fn test_admin_delete_user() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;

    let (status, _) = send(
        &h.router,
        post(
            "/admin/delete/user",
            json!({ "id": 1, "username": "bob" }),
            Some(&alice.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.directory.name_of(2).await.is_err());

    let (status, _) = send(
        &h.router,
        post(
            "/login/credentials",
            json!({ "username": "bob", "password": "builder" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Unknown target
    let (status, _) = send(
        &h.router,
        post(
            "/admin/delete/user",
            json!({ "id": 1, "username": "bob" }),
            Some(&alice.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_password_reset() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;

    let (status, body) = send(
        &h.router,
        post(
            "/admin/password",
            json!({ "id": 1, "username": "bob" }),
            Some(&alice.access_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    let password = body["password"].as_str().unwrap();
    assert_eq!(password.len(), 16);

    let bob = login(&h.router, "bob", password).await;
    assert_eq!(bob.id, 2);
}

#[tokio::test]
async fn test_register_requires_admin() {
    let h = harness().await;
    let alice = login(&h.router, "alice", "pw").await;
    let bob = login(&h.router, "bob", "builder").await;

    let registration = |id: i64| json!({ "id": id, "username": "carol", "password": "c", "admin": "false" });

    let (status, _) = send(
        &h.router,
        post("/register/credentials", registration(2), Some(&bob.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, message) = send(
        &h.router,
        post("/register/credentials", registration(1), Some(&alice.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message, "New user has been registered");

    let carol = login(&h.router, "carol", "c").await;
    assert!(!h.directory.is_admin(carol.id).await.unwrap());

    // Name already taken
    let (status, _) = send(
        &h.router,
        post("/register/credentials", registration(1), Some(&alice.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_after_checks() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;

    let (status, _) = send(
        &h.router,
        post("/update/password", json!({ "id": 2 }), Some(&bob.access_token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_welcome() {
    let h = harness().await;
    let bob = login(&h.router, "bob", "builder").await;

    let request = Request::builder()
        .uri("/welcome?user_id=2")
        .header(header::COOKIE, format!("portal_session={}", bob.access_token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["id"], 2);
    assert_eq!(body["name"], "bob");
    assert_eq!(body["apps"], json!(["billing"]));

    let (status, _) = send(&h.router, get("/welcome?user_id=2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;

    let (status, body) = send(&h.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}
