use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::repo_types::User;
use super::store::{ModelResult, UserDb};
use crate::error::ModelError;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, remember_hash, created_at, updated_at";

/// Postgres-backed user storage.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn first(&self, column: &str, value: &str) -> ModelResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("select user by {column}"))?
            .ok_or(ModelError::NotFound)
    }
}

/// Unique violations on the email column are the one storage error with a
/// model meaning: another account won the race for that address.
fn map_write_error(e: sqlx::Error, what: &'static str) -> ModelError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
            return ModelError::EmailTaken;
        }
    }
    ModelError::Storage(anyhow::Error::new(e).context(what))
}

#[async_trait]
impl UserDb for PgUserStore {
    async fn by_id(&self, id: i64) -> ModelResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("select user by id")?
            .ok_or(ModelError::NotFound)
    }

    async fn by_email(&self, email: &str) -> ModelResult<User> {
        self.first("email", email).await
    }

    async fn by_remember(&self, remember_hash: &str) -> ModelResult<User> {
        self.first("remember_hash", remember_hash).await
    }

    async fn create(&self, user: &mut User) -> ModelResult<()> {
        let row = sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime)>(
            r#"
            INSERT INTO users (name, email, password_hash, remember_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.remember_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert user"))?;
        let (id, created_at, updated_at) = row;
        user.id = id;
        user.created_at = Some(created_at);
        user.updated_at = Some(updated_at);
        Ok(())
    }

    async fn update(&self, user: &mut User) -> ModelResult<()> {
        let row = sqlx::query_as::<_, (OffsetDateTime, OffsetDateTime)>(
            r#"
            UPDATE users
               SET name = $2, email = $3, password_hash = $4, remember_hash = $5,
                   updated_at = now()
             WHERE id = $1
            RETURNING created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.remember_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "update user"))?;
        let (created_at, updated_at) = row.ok_or(ModelError::NotFound)?;
        user.created_at = Some(created_at);
        user.updated_at = Some(updated_at);
        Ok(())
    }

    async fn delete(&self, id: i64) -> ModelResult<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        if res.rows_affected() == 0 {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }

    async fn migrate(&self) -> ModelResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn destructive_reset(&self) -> ModelResult<()> {
        for table in ["galleries", "users", "_sqlx_migrations"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table} CASCADE"))
                .execute(&self.db)
                .await
                .with_context(|| format!("drop table {table}"))?;
        }
        self.migrate().await
    }
}
