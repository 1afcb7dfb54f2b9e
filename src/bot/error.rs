use thiserror::Error;

use crate::calculator::ValidationError;
use crate::db::StoreError;
use crate::services::encryption_service::CryptoError;
use crate::telegram::TelegramError;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("LMS rejected the token")]
    InvalidCredential,
    #[error("LMS is unavailable")]
    RemoteUnavailable,
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("Chat has no registered token")]
    NotRegistered,
    #[error("Chat is not the admin chat")]
    NotAdmin,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for BotError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => BotError::Database(e),
            StoreError::Crypto(e) => BotError::Crypto(e),
        }
    }
}

impl BotError {
    /// Text shown to the user when a handler fails with this error.
    pub fn user_message(&self, locale: &str) -> String {
        match self {
            BotError::InvalidCredential => t!("token.invalid", locale = locale),
            BotError::RemoteUnavailable => t!("deadlines.unavailable", locale = locale),
            BotError::Validation(ValidationError::NotANumber(_)) => {
                t!("calculator.not_a_number", locale = locale)
            }
            BotError::Validation(ValidationError::OutOfRange(_)) => {
                t!("calculator.out_of_range", locale = locale)
            }
            BotError::NotRegistered => t!("token.not_registered", locale = locale),
            BotError::NotAdmin => t!("admin.not_admin", locale = locale),
            BotError::Database(_)
            | BotError::Crypto(_)
            | BotError::Telegram(_)
            | BotError::Io(_) => t!("common.error", locale = locale),
        }
        .into_owned()
    }
}
