use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for post
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub date: DateTime<Utc>,
}
