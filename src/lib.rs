//! Portal - identity portal session and token authority
//!
//! Users log in with a username and password and receive a short opaque
//! access token bound to their user id. First-party pages present the token
//! as a cookie on self-service and admin routes; registered applications
//! verify a token server-to-server by presenting their own app secret.
//!
//! Every protected route runs an explicit, ordered chain of authorization
//! checks (see [`authz`]) before its handler is entered.

pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod server;
pub mod storage;

pub use auth::{AppRegistry, Identity, Session, SessionStore};
pub use authz::{Pipeline, Rejection};
pub use error::PortalError;
pub use server::{PortalServer, PortalServerConfig};
