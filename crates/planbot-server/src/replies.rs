//! User-facing texts and plan controls.

use planbot_core::Action;
use planbot_telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const START_HINT: &str = "Напишите план, например: «Купить хлеб»";
pub const NO_ACTIVE_PLANS: &str = "Активных планов нет.";
pub const SAVE_FAILED: &str = "Не удалось сохранить план, попробуйте ещё раз.";

pub const DONE_BUTTON: &str = "✅ Выполнено";
pub const DELETE_BUTTON: &str = "❌ Удалить";

pub const COMPLETED: &str = "✅ Выполнено!";
pub const DELETED: &str = "❌ Удалено.";

pub const UNKNOWN_ACTION: &str = "Неизвестное действие";
pub const NOT_YOUR_PLAN: &str = "Это не ваш план";
pub const PLAN_GONE: &str = "Этот план больше не существует";
pub const RETRY_LATER: &str = "Не удалось сохранить изменения, попробуйте ещё раз.";

pub fn plan_text(text: &str) -> String {
    format!("📝 {text}")
}

/// Done/delete buttons for the active plan at `position`.
pub fn plan_controls(position: usize) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::single_row(vec![
        InlineKeyboardButton::callback(DONE_BUTTON, Action::done(position).to_string()),
        InlineKeyboardButton::callback(DELETE_BUTTON, Action::delete(position).to_string()),
    ])
}
