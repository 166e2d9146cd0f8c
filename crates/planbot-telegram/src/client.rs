use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::TelegramError;
use crate::types::InlineKeyboardMarkup;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A message the bot posts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
    pub text: String,
    /// Message id this one replies to.
    pub reply_to: Option<i64>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            thread_id: None,
            text: text.into(),
            reply_to: None,
            keyboard: None,
        }
    }

    pub fn in_thread(mut self, thread_id: Option<i64>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    fn to_body(&self) -> Value {
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": self.text,
        });
        if let Some(thread_id) = self.thread_id {
            body["message_thread_id"] = json!(thread_id);
        }
        if let Some(reply_to) = self.reply_to {
            body["reply_parameters"] = json!({
                "message_id": reply_to,
                "allow_sending_without_reply": true,
            });
        }
        if let Some(keyboard) = &self.keyboard {
            body["reply_markup"] = json!(keyboard);
        }
        body
    }
}

/// The Bot API calls the adapter makes.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), TelegramError>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError>;

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TelegramError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError>;

    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&SecretString>,
    ) -> Result<(), TelegramError>;
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    description: Option<String>,
    error_code: Option<i64>,
}

/// Bot API client over HTTPS.
pub struct HttpBotApi {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl HttpBotApi {
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TelegramError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn call(&self, method: &str, body: Value) -> Result<(), TelegramError> {
        let url = format!(
            "{}/bot{}/{}",
            self.base_url,
            self.token.expose_secret(),
            method
        );
        // URLs carry the token, so errors are stripped of them before surfacing
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TelegramError::Network(e.without_url().to_string()))?;
        let status = resp.status();
        let envelope: ApiEnvelope = resp
            .json()
            .await
            .map_err(|e| TelegramError::Decode(e.without_url().to_string()))?;

        if envelope.ok {
            debug!(method, "bot api call succeeded");
            Ok(())
        } else {
            Err(TelegramError::Api {
                code: envelope.error_code.unwrap_or(i64::from(status.as_u16())),
                description: envelope.description.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    #[instrument(skip_all, fields(chat_id = message.chat_id))]
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), TelegramError> {
        self.call("sendMessage", message.to_body()).await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.call(
            "editMessageText",
            json!({"chat_id": chat_id, "message_id": message_id, "text": text}),
        )
        .await
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        let mut body = json!({"callback_query_id": callback_id, "show_alert": show_alert});
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call("answerCallbackQuery", body).await
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        self.call(
            "deleteMessage",
            json!({"chat_id": chat_id, "message_id": message_id}),
        )
        .await
    }

    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&SecretString>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret_token {
            body["secret_token"] = json!(secret.expose_secret());
        }
        self.call("setWebhook", body).await
    }
}
