//! Layered request authorization
//!
//! Every protected route declares an ordered list of named checks. A
//! [`Pipeline`] runs them against an [`AuthorizationContext`] built from the
//! request; the first failing check ends the request with its [`Rejection`].
//!
//! Checks:
//! - `shape`: POST, `application/json`, non-empty body
//! - `origin`: `Origin` or `Referer` is the trusted domain (or a dev host)
//! - `token`: bearer token names a live session
//! - `ownership`: that session belongs to the claimed user id
//! - `elevation`: the claimed user is an admin
//! - `self-protection`: destructive admin actions never target the actor
//! - `federated-params`, `app-credentials`: server-to-server verification

mod checks;
mod context;
mod pipeline;

pub use checks::{
    AppCredentialsCheck, ElevationCheck, FederatedParamsCheck, OriginCheck, OriginPolicy,
    OwnershipCheck, SelfProtectionCheck, ShapeCheck, TokenCheck,
};
pub use context::{bearer_from_headers, normalize_username, AuthorizationContext, ClaimedUser};
pub use pipeline::{Check, Pipeline, Rejection};
