use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::repo_types::Gallery;
use super::store::GalleryDb;
use crate::auth::store::ModelResult;
use crate::error::ModelError;

#[derive(Clone)]
pub struct PgGalleryStore {
    db: PgPool,
}

impl PgGalleryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GalleryDb for PgGalleryStore {
    async fn by_id(&self, id: i64) -> ModelResult<Gallery> {
        sqlx::query_as::<_, Gallery>(
            r#"
            SELECT id, user_id, title, created_at
              FROM galleries
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select gallery by id")?
        .ok_or(ModelError::NotFound)
    }

    async fn by_user_id(&self, user_id: i64) -> ModelResult<Vec<Gallery>> {
        let rows = sqlx::query_as::<_, Gallery>(
            r#"
            SELECT id, user_id, title, created_at
              FROM galleries
             WHERE user_id = $1
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list galleries by user")?;
        Ok(rows)
    }

    async fn create(&self, gallery: &mut Gallery) -> ModelResult<()> {
        let (id, created_at) = sqlx::query_as::<_, (i64, OffsetDateTime)>(
            r#"
            INSERT INTO galleries (user_id, title)
            VALUES ($1, $2)
            RETURNING id, created_at
            "#,
        )
        .bind(gallery.user_id)
        .bind(&gallery.title)
        .fetch_one(&self.db)
        .await
        .context("insert gallery")?;
        gallery.id = id;
        gallery.created_at = Some(created_at);
        Ok(())
    }

    async fn update(&self, gallery: &mut Gallery) -> ModelResult<()> {
        let res = sqlx::query("UPDATE galleries SET user_id = $2, title = $3 WHERE id = $1")
            .bind(gallery.id)
            .bind(gallery.user_id)
            .bind(&gallery.title)
            .execute(&self.db)
            .await
            .context("update gallery")?;
        if res.rows_affected() == 0 {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> ModelResult<()> {
        let res = sqlx::query("DELETE FROM galleries WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete gallery")?;
        if res.rows_affected() == 0 {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }
}
