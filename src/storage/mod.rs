//! User directories
//!
//! The portal never owns user records itself; it talks to a directory through
//! [`CredentialVerifier`] and [`UserDirectory`].
//!
//! - Memory: process-local directory for development and tests
//! - Postgres: durable directory backed by a `portal_users` table

mod memory;
mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::{PostgresConfig, PostgresDirectory};

use crate::auth::{password, Identity};
pub use async_trait::async_trait;
use thiserror::Error;

/// Directory errors
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("password hashing error: {0}")]
    Hashing(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Checks credentials presented at login
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// The matching identity, or `None` when the username or password is wrong
    async fn check_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, DirectoryError>;

    /// Whether `password` is the current password of `user_id`
    async fn verify_password(&self, user_id: i64, password: &str) -> Result<bool, DirectoryError>;
}

/// User lookups and the mutations behind the self-service and admin routes
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn is_admin(&self, user_id: i64) -> Result<bool, DirectoryError>;

    async fn name_of(&self, user_id: i64) -> Result<String, DirectoryError>;

    /// Register a new user; fails with `Conflict` if the name is taken
    async fn create_user(
        &self,
        username: &str,
        password: &str,
        admin: bool,
    ) -> Result<Identity, DirectoryError>;

    async fn rename_user(&self, user_id: i64, new_name: &str) -> Result<(), DirectoryError>;

    async fn set_password(&self, user_id: i64, password: &str) -> Result<(), DirectoryError>;

    /// Replace the password of the user called `username`
    async fn reset_password(&self, username: &str, password: &str) -> Result<(), DirectoryError>;

    async fn set_admin(&self, username: &str, admin: bool) -> Result<(), DirectoryError>;

    async fn delete_user(&self, username: &str) -> Result<(), DirectoryError>;
}

/// Argon2 is deliberately slow, keep it off the async workers
pub(crate) async fn hash_blocking(password: &str) -> Result<String, DirectoryError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| DirectoryError::Hashing(e.to_string()))?
        .map_err(|e| DirectoryError::Hashing(e.to_string()))
}

pub(crate) async fn verify_blocking(hash: String, password: &str) -> Result<bool, DirectoryError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || password::verify_password(&hash, &password))
        .await
        .map_err(|e| DirectoryError::Hashing(e.to_string()))
}
