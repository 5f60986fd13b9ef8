use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record. `password` and `remember` are plaintext and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[sqlx(skip)]
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub password_hash: String,
    #[sqlx(skip)]
    #[serde(skip)]
    pub remember: String,
    #[serde(skip)]
    pub remember_hash: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}
