use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Gallery record; `user_id` is the owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct Gallery {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}
