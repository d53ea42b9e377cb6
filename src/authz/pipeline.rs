//! Check trait, rejection type, and the runner that strings checks together

use crate::authz::context::AuthorizationContext;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why a request was turned away
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Rejection {
    pub status: StatusCode,
    pub message: Cow<'static, str>,
}

impl Rejection {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// A request that conflicts with the acting user's own account
    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, self.message.into_owned()).into_response()
    }
}

/// One named authorization check
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self, ctx: &AuthorizationContext) -> Result<(), Rejection>;
}

/// Ordered list of checks; a request is authorized iff every check passes
#[derive(Clone, Default)]
pub struct Pipeline {
    checks: Vec<Arc<dyn Check>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a check to the end of the pipeline
    pub fn then(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run the checks in order, stopping at the first rejection
    pub async fn run(&self, ctx: &AuthorizationContext) -> Result<(), Rejection> {
        for check in &self.checks {
            if let Err(rejection) = check.check(ctx).await {
                debug!(
                    check = check.name(),
                    status = rejection.status.as_u16(),
                    "Request rejected"
                );
                return Err(rejection);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
