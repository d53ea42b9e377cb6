//! Process-local user directory

use crate::auth::Identity;
use crate::storage::{
    async_trait, hash_blocking, verify_blocking, CredentialVerifier, DirectoryError, UserDirectory,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

#[derive(Debug, Clone)]
struct UserRecord {
    name: String,
    password_hash: String,
    admin: bool,
}

/// User directory held in memory; contents vanish with the process
pub struct InMemoryDirectory {
    users: RwLock<HashMap<i64, UserRecord>>,
    next_id: AtomicI64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn id_by_name(users: &HashMap<i64, UserRecord>, username: &str) -> Option<i64> {
        users
            .iter()
            .find(|(_, user)| user.name == username)
            .map(|(id, _)| *id)
    }

    fn not_found(what: impl std::fmt::Display) -> DirectoryError {
        DirectoryError::NotFound(format!("user {}", what))
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialVerifier for InMemoryDirectory {
    async fn check_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, DirectoryError> {
        let found = {
            let users = self.users.read();
            Self::id_by_name(&users, username).and_then(|id| {
                users
                    .get(&id)
                    .map(|user| (id, user.name.clone(), user.password_hash.clone()))
            })
        };

        let Some((id, name, hash)) = found else {
            return Ok(None);
        };

        if verify_blocking(hash, password).await? {
            Ok(Some(Identity { id, name }))
        } else {
            Ok(None)
        }
    }

    async fn verify_password(&self, user_id: i64, password: &str) -> Result<bool, DirectoryError> {
        let hash = self
            .users
            .read()
            .get(&user_id)
            .map(|user| user.password_hash.clone())
            .ok_or_else(|| Self::not_found(user_id))?;

        verify_blocking(hash, password).await
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn is_admin(&self, user_id: i64) -> Result<bool, DirectoryError> {
        self.users
            .read()
            .get(&user_id)
            .map(|user| user.admin)
            .ok_or_else(|| Self::not_found(user_id))
    }

    async fn name_of(&self, user_id: i64) -> Result<String, DirectoryError> {
        self.users
            .read()
            .get(&user_id)
            .map(|user| user.name.clone())
            .ok_or_else(|| Self::not_found(user_id))
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
        admin: bool,
    ) -> Result<Identity, DirectoryError> {
        let password_hash = hash_blocking(password).await?;

        let mut users = self.users.write();
        if Self::id_by_name(&users, username).is_some() {
            return Err(DirectoryError::Conflict(format!("username {} is taken", username)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        users.insert(
            id,
            UserRecord {
                name: username.to_string(),
                password_hash,
                admin,
            },
        );

        debug!(user_id = id, admin, "Created user");
        Ok(Identity::new(id, username))
    }

    async fn rename_user(&self, user_id: i64, new_name: &str) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        if let Some(existing) = Self::id_by_name(&users, new_name) {
            if existing != user_id {
                return Err(DirectoryError::Conflict(format!("username {} is taken", new_name)));
            }
        }

        let user = users.get_mut(&user_id).ok_or_else(|| Self::not_found(user_id))?;
        user.name = new_name.to_string();
        Ok(())
    }

    async fn set_password(&self, user_id: i64, password: &str) -> Result<(), DirectoryError> {
        let password_hash = hash_blocking(password).await?;

        let mut users = self.users.write();
        let user = users.get_mut(&user_id).ok_or_else(|| Self::not_found(user_id))?;
        user.password_hash = password_hash;
        Ok(())
    }

    async fn reset_password(&self, username: &str, password: &str) -> Result<(), DirectoryError> {
        let password_hash = hash_blocking(password).await?;

        let mut users = self.users.write();
        let id = Self::id_by_name(&users, username).ok_or_else(|| Self::not_found(username))?;
        if let Some(user) = users.get_mut(&id) {
            user.password_hash = password_hash;
        }
        Ok(())
    }

    async fn set_admin(&self, username: &str, admin: bool) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let id = Self::id_by_name(&users, username).ok_or_else(|| Self::not_found(username))?;
        if let Some(user) = users.get_mut(&id) {
            user.admin = admin;
        }
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let id = Self::id_by_name(&users, username).ok_or_else(|| Self::not_found(username))?;
        users.remove(&id);

        debug!(user_id = id, "Deleted user");
        Ok(())
    }
}
