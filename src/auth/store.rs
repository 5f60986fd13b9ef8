use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::repo_types::User;
use crate::error::ModelError;

pub type ModelResult<T> = Result<T, ModelError>;

/// Everything the auth layers need from a user store.
///
/// Each layer (validator, storage) implements this. At the storage layer
/// `by_remember` takes the stored hash; the validator accepts the plaintext
/// token and hashes it before delegating.
#[async_trait]
pub trait UserDb: Send + Sync {
    async fn by_id(&self, id: i64) -> ModelResult<User>;
    async fn by_email(&self, email: &str) -> ModelResult<User>;
    async fn by_remember(&self, remember: &str) -> ModelResult<User>;

    /// Inserts `user`, back-filling `id` and timestamps.
    async fn create(&self, user: &mut User) -> ModelResult<()>;
    /// Overwrites every stored column of the user with `user.id`.
    async fn update(&self, user: &mut User) -> ModelResult<()>;
    async fn delete(&self, id: i64) -> ModelResult<()>;

    async fn migrate(&self) -> ModelResult<()>;
    /// Drops every table and migrates again.
    async fn destructive_reset(&self) -> ModelResult<()>;
}

#[derive(Default)]
struct MemoryTables {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

/// In-process store with the same uniqueness and not-null rules as the
/// `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_columns(tables: &MemoryTables, user: &User) -> ModelResult<()> {
        if user.email.is_empty() || user.password_hash.is_empty() || user.remember_hash.is_empty()
        {
            return Err(ModelError::Storage(anyhow::anyhow!(
                "null value violates not-null constraint on users"
            )));
        }
        for other in tables.users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(ModelError::EmailTaken);
            }
            if other.remember_hash == user.remember_hash {
                return Err(ModelError::Storage(anyhow::anyhow!(
                    "duplicate key value violates unique constraint users_remember_hash_key"
                )));
            }
        }
        Ok(())
    }

    fn stored(user: &User) -> User {
        User {
            password: String::new(),
            remember: String::new(),
            ..user.clone()
        }
    }

    #[cfg(test)]
    pub(crate) async fn raw(&self, id: i64) -> Option<User> {
        self.tables.read().await.users.get(&id).cloned()
    }
}

#[async_trait]
impl UserDb for MemoryUserStore {
    async fn by_id(&self, id: i64) -> ModelResult<User> {
        let tables = self.tables.read().await;
        tables.users.get(&id).cloned().ok_or(ModelError::NotFound)
    }

    async fn by_email(&self, email: &str) -> ModelResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(ModelError::NotFound)
    }

    async fn by_remember(&self, remember_hash: &str) -> ModelResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.remember_hash == remember_hash)
            .cloned()
            .ok_or(ModelError::NotFound)
    }

    async fn create(&self, user: &mut User) -> ModelResult<()> {
        let mut tables = self.tables.write().await;
        let row = User {
            id: 0,
            ..Self::stored(user)
        };
        Self::check_columns(&tables, &row)?;
        tables.next_id += 1;
        let now = OffsetDateTime::now_utc();
        user.id = tables.next_id;
        user.created_at = Some(now);
        user.updated_at = Some(now);
        tables.users.insert(user.id, Self::stored(user));
        Ok(())
    }

    async fn update(&self, user: &mut User) -> ModelResult<()> {
        let mut tables = self.tables.write().await;
        let created_at = tables
            .users
            .get(&user.id)
            .map(|u| u.created_at)
            .ok_or(ModelError::NotFound)?;
        Self::check_columns(&tables, user)?;
        user.created_at = created_at;
        user.updated_at = Some(OffsetDateTime::now_utc());
        tables.users.insert(user.id, Self::stored(user));
        Ok(())
    }

    async fn delete(&self, id: i64) -> ModelResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(ModelError::NotFound)
    }

    async fn migrate(&self) -> ModelResult<()> {
        Ok(())
    }

    async fn destructive_reset(&self) -> ModelResult<()> {
        *self.tables.write().await = MemoryTables::default();
        Ok(())
    }
}
