use super::repo_types::Gallery;
use super::store::GalleryDb;
use crate::auth::store::ModelResult;
use crate::error::ModelError;

type GalleryValFn = fn(&mut Gallery) -> ModelResult<()>;

fn user_id_required(g: &mut Gallery) -> ModelResult<()> {
    if g.user_id <= 0 {
        return Err(ModelError::UserIdRequired);
    }
    Ok(())
}

fn title_required(g: &mut Gallery) -> ModelResult<()> {
    g.title = g.title.trim().to_string();
    if g.title.is_empty() {
        return Err(ModelError::TitleRequired);
    }
    Ok(())
}

fn positive_id(g: &mut Gallery) -> ModelResult<()> {
    if g.id <= 0 {
        return Err(ModelError::IdInvalid);
    }
    Ok(())
}

fn run_gallery_val_fns(gallery: &mut Gallery, fns: &[GalleryValFn]) -> ModelResult<()> {
    fns.iter().try_for_each(|f| f(gallery))
}

/// Gallery CRUD with validation in front of storage.
pub struct GalleryService {
    db: Box<dyn GalleryDb>,
}

impl GalleryService {
    pub fn new(db: Box<dyn GalleryDb>) -> Self {
        Self { db }
    }

    pub async fn by_id(&self, id: i64) -> ModelResult<Gallery> {
        self.db.by_id(id).await
    }

    pub async fn by_user_id(&self, user_id: i64) -> ModelResult<Vec<Gallery>> {
        self.db.by_user_id(user_id).await
    }

    pub async fn create(&self, gallery: &mut Gallery) -> ModelResult<()> {
        run_gallery_val_fns(gallery, &[user_id_required, title_required])?;
        self.db.create(gallery).await
    }

    pub async fn update(&self, gallery: &mut Gallery) -> ModelResult<()> {
        run_gallery_val_fns(gallery, &[user_id_required, title_required])?;
        self.db.update(gallery).await
    }

    pub async fn delete(&self, id: i64) -> ModelResult<()> {
        let mut gallery = Gallery {
            id,
            ..Gallery::default()
        };
        run_gallery_val_fns(&mut gallery, &[positive_id])?;
        self.db.delete(id).await
    }
}
