//! In-memory [`BotApi`] that records calls, for handler tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use crate::client::{BotApi, OutgoingMessage};
use crate::error::TelegramError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCall {
    Send(OutgoingMessage),
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
        show_alert: bool,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
    },
    SetWebhook {
        url: String,
        secret_token: Option<String>,
    },
}

/// Records every call. In failing mode each call is still recorded and then
/// returns an API error.
#[derive(Default)]
pub struct RecordingBot {
    calls: Mutex<Vec<BotCall>>,
    failing: AtomicBool,
}

impl RecordingBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let bot = Self::default();
        bot.set_failing(true);
        bot
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BotCall> {
        self.calls.lock().clone()
    }

    pub fn take_calls(&self) -> Vec<BotCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    fn record(&self, call: BotCall) -> Result<(), TelegramError> {
        self.calls.lock().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(TelegramError::Api {
                code: 400,
                description: "Bad Request: recorded failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BotApi for RecordingBot {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), TelegramError> {
        self.record(BotCall::Send(message))
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.record(BotCall::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        })
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        self.record(BotCall::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        self.record(BotCall::Delete {
            chat_id,
            message_id,
        })
    }

    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&SecretString>,
    ) -> Result<(), TelegramError> {
        self.record(BotCall::SetWebhook {
            url: url.to_string(),
            secret_token: secret_token.map(|s| s.expose_secret().to_string()),
        })
    }
}
