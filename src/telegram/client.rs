use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::models::{ApiResponse, OutgoingMessage, Update};
use super::{TelegramApi, TelegramError};

/// Client for the Telegram Bot API.
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
}

#[derive(Serialize)]
struct DeleteMessage {
    chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
}

impl TelegramClient {
    /// `request_timeout` bounds ordinary calls; long polls get their own timeout on top.
    pub fn new(
        api_url: &str,
        bot_token: &str,
        request_timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{bot_token}", api_url.trim_end_matches('/')),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<P: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &P,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(payload)
            .send()
            .await?;
        unwrap_response(response.json::<ApiResponse<T>>().await?)
    }
}

fn unwrap_response<T>(response: ApiResponse<T>) -> Result<T, TelegramError> {
    if !response.ok {
        return Err(TelegramError::Api {
            code: response.error_code.unwrap_or_default(),
            description: response
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }
    response.result.ok_or(TelegramError::EmptyResult)
}

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let payload = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        // leave headroom so the server answers before the client gives up
        let timeout = Duration::from_secs(timeout_secs) + DEFAULT_CALL_TIMEOUT;
        self.call("getUpdates", &payload, timeout).await
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", &message, DEFAULT_CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let payload = EditMessageText {
            chat_id,
            message_id,
            text,
        };
        let _: serde_json::Value = self
            .call("editMessageText", &payload, DEFAULT_CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        let payload = DeleteMessage {
            chat_id,
            message_id,
        };
        let _: bool = self
            .call("deleteMessage", &payload, DEFAULT_CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError> {
        let payload = AnswerCallbackQuery { callback_query_id };
        let _: bool = self
            .call("answerCallbackQuery", &payload, DEFAULT_CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), TelegramError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        let _: serde_json::Value = unwrap_response(response.json().await?)?;
        Ok(())
    }
}
