use sqlx::FromRow;

/// Database model for comment
#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
}
