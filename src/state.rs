use crate::auth::{repo::PgUserStore, services::UserService, store::MemoryUserStore};
use crate::config::AppConfig;
use crate::galleries::{
    repo::PgGalleryStore, services::GalleryService, store::MemoryGalleryStore,
};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<UserService>,
    pub galleries: Arc<GalleryService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; using in-memory storage");
            return Self::in_memory(config);
        };

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;

        let users = UserService::new(Box::new(PgUserStore::new(db.clone())), &config.auth)?;
        let galleries = GalleryService::new(Box::new(PgGalleryStore::new(db)));

        Ok(Self {
            config,
            users: Arc::new(users),
            galleries: Arc::new(galleries),
        })
    }

    pub fn in_memory(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let users = UserService::new(Box::new(MemoryUserStore::new()), &config.auth)?;
        let galleries = GalleryService::new(Box::new(MemoryGalleryStore::new()));
        Ok(Self {
            config,
            users: Arc::new(users),
            galleries: Arc::new(galleries),
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            env: "test".into(),
            database_url: None,
            max_connections: 1,
            reset_db: false,
            auth: crate::auth::services::test_auth_config(),
        });
        Self::in_memory(config).expect("in-memory state")
    }
}
