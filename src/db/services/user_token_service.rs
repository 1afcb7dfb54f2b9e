use chrono::Utc;
use sqlx::{Result, SqlitePool};

use crate::db::models::UserToken;

// --- User Token Service Functions ---

/// Inserts the token for `chat_id`, replacing any previous one.
pub async fn upsert_user_token(
    pool: &SqlitePool,
    chat_id: i64,
    first_name: &str,
    token: &str,
) -> Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO user_tokens (chat_id, first_name, token, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chat_id) DO UPDATE SET
            first_name = excluded.first_name,
            token = excluded.token,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(chat_id)
    .bind(first_name)
    .bind(token)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Retrieves the stored record for `chat_id`.
pub async fn get_user_token(pool: &SqlitePool, chat_id: i64) -> Result<Option<UserToken>> {
    sqlx::query_as::<_, UserToken>(
        "SELECT chat_id, first_name, token, created_at, updated_at FROM user_tokens WHERE chat_id = ?",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await
}

/// Deletes the record for `chat_id`. Returns `true` if a row was removed.
pub async fn delete_user_token(pool: &SqlitePool, chat_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_tokens WHERE chat_id = ?")
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn user_token_exists(pool: &SqlitePool, chat_id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM user_tokens WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// All chat ids with a stored token, in registration order.
pub async fn get_all_user_chat_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    sqlx::query_scalar("SELECT chat_id FROM user_tokens ORDER BY id")
        .fetch_all(pool)
        .await
}
