use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::repo_types::Gallery;
use crate::auth::store::ModelResult;
use crate::error::ModelError;

#[async_trait]
pub trait GalleryDb: Send + Sync {
    async fn by_id(&self, id: i64) -> ModelResult<Gallery>;
    async fn by_user_id(&self, user_id: i64) -> ModelResult<Vec<Gallery>>;
    async fn create(&self, gallery: &mut Gallery) -> ModelResult<()>;
    async fn update(&self, gallery: &mut Gallery) -> ModelResult<()>;
    async fn delete(&self, id: i64) -> ModelResult<()>;
}

#[derive(Default)]
struct MemoryTables {
    next_id: i64,
    galleries: BTreeMap<i64, Gallery>,
}

#[derive(Default)]
pub struct MemoryGalleryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryGalleryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GalleryDb for MemoryGalleryStore {
    async fn by_id(&self, id: i64) -> ModelResult<Gallery> {
        let tables = self.tables.read().await;
        tables.galleries.get(&id).cloned().ok_or(ModelError::NotFound)
    }

    async fn by_user_id(&self, user_id: i64) -> ModelResult<Vec<Gallery>> {
        let tables = self.tables.read().await;
        Ok(tables
            .galleries
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(&self, gallery: &mut Gallery) -> ModelResult<()> {
        let mut tables = self.tables.write().await;
        tables.next_id += 1;
        gallery.id = tables.next_id;
        gallery.created_at = Some(OffsetDateTime::now_utc());
        tables.galleries.insert(gallery.id, gallery.clone());
        Ok(())
    }

    async fn update(&self, gallery: &mut Gallery) -> ModelResult<()> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .galleries
            .get_mut(&gallery.id)
            .ok_or(ModelError::NotFound)?;
        gallery.created_at = existing.created_at;
        *existing = gallery.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> ModelResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .galleries
            .remove(&id)
            .map(|_| ())
            .ok_or(ModelError::NotFound)
    }
}
