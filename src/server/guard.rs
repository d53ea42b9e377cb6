//! Middleware that runs a route's authorization pipeline before its handler

use crate::authz::{AuthorizationContext, Pipeline, Rejection};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Largest request body the guard will buffer
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Where the authorization facts of a request come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Headers, cookie, and JSON body
    FirstParty,
    /// Query string only (server-to-server verification)
    Federated,
}

/// A route's pipeline plus what the guard needs to build its context
#[derive(Clone)]
pub struct Guard {
    pipeline: Pipeline,
    source: ContextSource,
    cookie_name: Arc<str>,
}

impl Guard {
    pub fn new(pipeline: Pipeline, source: ContextSource, cookie_name: Arc<str>) -> Self {
        Self {
            pipeline,
            source,
            cookie_name,
        }
    }
}

/// The user the guard verified the request is acting as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
}

/// Buffer the body, build the context, run the pipeline, then hand the
/// rebuilt request to the handler with an [`Actor`] extension attached.
pub async fn guard(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Rejection::bad_request("Request body is too large or unreadable")
                .into_response()
        }
    };

    let ctx = match guard.source {
        ContextSource::FirstParty => {
            AuthorizationContext::from_request(&parts, &bytes, &guard.cookie_name)
        }
        ContextSource::Federated => AuthorizationContext::from_federated_query(&parts),
    };

    if let Err(rejection) = guard.pipeline.run(&ctx).await {
        return rejection.into_response();
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    if let Some(user_id) = ctx.claimed_user.id() {
        request.extensions_mut().insert(Actor { user_id });
    }

    next.run(request).await
}
