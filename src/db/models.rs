use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A chat identity linked to an LMS web-service token.
/// Corresponds to the `user_tokens` table.
///
/// `token` holds whatever was written to the column: the raw token, or its
/// ciphertext when encryption at rest is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserToken {
    pub chat_id: i64,
    pub first_name: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A group chat where `/deadlines` was used; target of group broadcasts.
/// Corresponds to the `group_chats` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupChat {
    pub chat_id: i64,
    pub registered_at: DateTime<Utc>,
}
