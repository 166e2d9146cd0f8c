pub mod client;
pub mod error;
pub mod gate;
pub mod mock;
pub mod types;

pub use client::{BotApi, HttpBotApi, OutgoingMessage};
pub use error::TelegramError;
pub use gate::ThreadGate;
pub use mock::{BotCall, RecordingBot};
pub use types::{
    CallbackQuery, Chat, ForumTopicCreated, ForumTopicEdited, InlineKeyboardButton,
    InlineKeyboardMarkup, Message, Update, User,
};
