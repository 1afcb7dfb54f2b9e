use chrono::Utc;
use sqlx::{Result, SqlitePool};

use crate::db::models::GroupChat;

// --- Group Chat Service Functions ---

/// Registers a group chat. Returns `false` if it was already known.
pub async fn insert_group_chat(pool: &SqlitePool, chat_id: i64) -> Result<bool> {
    let result =
        sqlx::query("INSERT OR IGNORE INTO group_chats (chat_id, registered_at) VALUES (?, ?)")
            .bind(chat_id)
            .bind(Utc::now())
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_all_group_chats(pool: &SqlitePool) -> Result<Vec<GroupChat>> {
    sqlx::query_as::<_, GroupChat>("SELECT chat_id, registered_at FROM group_chats ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn get_all_group_chat_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    sqlx::query_scalar("SELECT chat_id FROM group_chats ORDER BY id")
        .fetch_all(pool)
        .await
}
