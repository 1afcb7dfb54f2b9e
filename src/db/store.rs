use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use super::models::{GroupChat, UserToken};
use super::services;
use crate::services::encryption_service::{CryptoError, TokenCipher};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Credential encryption error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Chat identity → LMS token mapping, plus the registered group chats.
///
/// Every operation touches a single key; there are no multi-key transactions.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
    cipher: Option<TokenCipher>,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool, cipher: Option<TokenCipher>) -> Self {
        Self { pool, cipher }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upserts the token for `chat_id`.
    pub async fn put(
        &self,
        chat_id: i64,
        display_name: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        let stored = match &self.cipher {
            Some(cipher) => cipher.encrypt(token)?,
            None => token.to_string(),
        };
        services::upsert_user_token(&self.pool, chat_id, display_name, &stored).await?;
        debug!(chat_id, "Stored credential.");
        Ok(())
    }

    pub async fn get(&self, chat_id: i64) -> Result<Option<String>, StoreError> {
        Ok(self.get_record(chat_id).await?.map(|record| record.token))
    }

    /// The full record with the token already decrypted.
    pub async fn get_record(&self, chat_id: i64) -> Result<Option<UserToken>, StoreError> {
        let Some(mut record) = services::get_user_token(&self.pool, chat_id).await? else {
            return Ok(None);
        };
        if let Some(cipher) = &self.cipher {
            record.token = cipher.decrypt(&record.token)?;
        }
        Ok(Some(record))
    }

    /// Removes the token; absent keys are not an error.
    pub async fn delete(&self, chat_id: i64) -> Result<bool, StoreError> {
        let removed = services::delete_user_token(&self.pool, chat_id).await?;
        debug!(chat_id, removed, "Deleted credential.");
        Ok(removed)
    }

    pub async fn is_registered(&self, chat_id: i64) -> Result<bool, StoreError> {
        Ok(services::user_token_exists(&self.pool, chat_id).await?)
    }

    pub async fn list_user_chat_ids(&self) -> Result<Vec<i64>, StoreError> {
        Ok(services::get_all_user_chat_ids(&self.pool).await?)
    }

    pub async fn register_group_chat(&self, chat_id: i64) -> Result<bool, StoreError> {
        Ok(services::insert_group_chat(&self.pool, chat_id).await?)
    }

    pub async fn list_group_chats(&self) -> Result<Vec<GroupChat>, StoreError> {
        Ok(services::get_all_group_chats(&self.pool).await?)
    }

    pub async fn list_group_chat_ids(&self) -> Result<Vec<i64>, StoreError> {
        Ok(services::get_all_group_chat_ids(&self.pool).await?)
    }
}
