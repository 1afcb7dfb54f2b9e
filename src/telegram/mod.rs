//! Telegram Bot API: wire models, the client and menu builders.

pub mod client;
pub mod keyboards;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use client::TelegramClient;
pub use models::{OutgoingMessage, ReplyMarkup, Update};

/// Hard limit of a single Telegram text message, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Telegram API error {code}: {description}")]
    Api { code: i32, description: String },
    #[error("Telegram API returned ok without a result")]
    EmptyResult,
}

/// Outbound and polling operations the bot uses.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError>;

    async fn send_message(&self, message: OutgoingMessage) -> Result<(), TelegramError>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError>;

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError>;

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), TelegramError>;
}

/// Escapes text for Telegram MarkdownV2.
/// Characters to escape: _ * [ ] ( ) ~ ` > # + - = | { } . !
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped_text = String::with_capacity(text.len());
    for char_to_escape in text.chars() {
        match char_to_escape {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' | '\\' => {
                escaped_text.push('\\');
                escaped_text.push(char_to_escape);
            }
            _ => {
                escaped_text.push(char_to_escape);
            }
        }
    }
    escaped_text
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn truncate_utf16(text: &str, limit: usize) -> String {
    let mut used = 0;
    text.chars()
        .take_while(|c| {
            used += c.len_utf16();
            used <= limit
        })
        .collect()
}

/// Joins `parts` with `separator` into as few messages as fit in `limit`.
///
/// Parts are never split unless a single part is longer than `limit` by itself.
pub fn pack_messages(parts: &[String], separator: &str, limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    for part in parts {
        let part = if utf16_len(part) > limit {
            truncate_utf16(part, limit)
        } else {
            part.clone()
        };
        if current.is_empty() {
            current = part;
            continue;
        }
        if utf16_len(&current) + utf16_len(separator) + utf16_len(&part) > limit {
            messages.push(std::mem::take(&mut current));
            current = part;
        } else {
            current.push_str(separator);
            current.push_str(&part);
        }
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}
