//! Turns Telegram updates into ledger operations and replies.
//!
//! Handlers never fail: ledger errors become user-visible answers and Bot API
//! delivery errors are logged, so the webhook can always acknowledge the
//! update.

use std::sync::Arc;

use planbot_core::{Action, ActionVerb, Clock, LedgerError, UserKey};
use planbot_store::{PlanStore, StoreError};
use planbot_telegram::{
    BotApi, CallbackQuery, Message, OutgoingMessage, TelegramError, ThreadGate, Update,
};
use tokio::task;
use tracing::{debug, instrument, warn};

use crate::replies;

pub struct UpdateHandler {
    store: Arc<PlanStore>,
    bot: Arc<dyn BotApi>,
    gate: Arc<ThreadGate>,
    clock: Arc<dyn Clock>,
}

impl UpdateHandler {
    pub fn new(
        store: Arc<PlanStore>,
        bot: Arc<dyn BotApi>,
        gate: Arc<ThreadGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            bot,
            gate,
            clock,
        }
    }

    #[instrument(skip_all, fields(update_id = update.update_id))]
    pub async fn handle_update(&self, update: Update) {
        if let Some(msg) = update.message {
            self.handle_message(msg).await;
        } else if let Some(cb) = update.callback_query {
            self.handle_callback(cb).await;
        } else {
            debug!("ignoring update kind");
        }
    }

    async fn handle_message(&self, msg: Message) {
        if !self.gate.admits(&msg) {
            return;
        }
        let Some(from) = msg.from.as_ref().filter(|u| !u.is_bot) else {
            return;
        };
        let Some(text) = msg.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        let user = UserKey::from_user_id(from.id);

        match msg.command() {
            Some("start") => self.reply(&msg, replies::START_HINT).await,
            Some("plans") => self.list_plans(&msg, user).await,
            Some(other) => debug!(command = other, "ignoring command"),
            None => self.submit_plan(&msg, user, text.to_string()).await,
        }
    }

    async fn submit_plan(&self, msg: &Message, user: UserKey, text: String) {
        let store = Arc::clone(&self.store);
        let today = self.clock.today();
        let shown = text.clone();
        let result = blocking(move || store.add_plan(&user, &text, today)).await;

        match result {
            Ok(position) => {
                let out = reply_to(msg, replies::plan_text(&shown))
                    .with_keyboard(replies::plan_controls(position));
                self.deliver("sendMessage", self.bot.send_message(out).await);
            }
            Err(StoreError::Ledger(LedgerError::InvalidInput(_))) => {}
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "plan submission failed");
                self.reply(msg, replies::SAVE_FAILED).await;
            }
        }
    }

    /// Re-post every active plan with controls for its current position.
    async fn list_plans(&self, msg: &Message, user: UserKey) {
        let store = Arc::clone(&self.store);
        let plans = match blocking(move || Ok(store.active_plans(&user))).await {
            Ok(plans) => plans,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "plan listing failed");
                self.reply(msg, replies::RETRY_LATER).await;
                return;
            }
        };
        if plans.is_empty() {
            self.reply(msg, replies::NO_ACTIVE_PLANS).await;
            return;
        }
        for (position, plan) in plans.iter().enumerate() {
            let out = reply_to(msg, replies::plan_text(&plan.text))
                .with_keyboard(replies::plan_controls(position));
            self.deliver("sendMessage", self.bot.send_message(out).await);
        }
    }

    async fn handle_callback(&self, cb: CallbackQuery) {
        let Some(msg) = cb.message.as_ref().filter(|m| self.gate.admits(m)) else {
            self.answer(&cb, None, false).await;
            return;
        };

        let action = match cb.data.as_deref().unwrap_or("").parse::<Action>() {
            Ok(action) => action,
            Err(_) => {
                debug!(data = ?cb.data, "malformed callback data");
                self.answer(&cb, Some(replies::UNKNOWN_ACTION), false).await;
                return;
            }
        };

        let author = msg
            .reply_to_message
            .as_deref()
            .and_then(|parent| parent.from.as_ref())
            .map(|u| u.id);
        if author.is_some_and(|id| id != cb.from.id) {
            self.answer(&cb, Some(replies::NOT_YOUR_PLAN), true).await;
            return;
        }

        let store = Arc::clone(&self.store);
        let user = UserKey::from_user_id(cb.from.id);
        let today = self.clock.today();
        let result = blocking(move || store.apply_action(&user, action, today)).await;

        match result {
            Ok(_) => {
                let text = match action.verb {
                    ActionVerb::Done => replies::COMPLETED,
                    ActionVerb::Delete => replies::DELETED,
                };
                self.deliver(
                    "editMessageText",
                    self.bot.edit_message_text(msg.chat.id, msg.message_id, text).await,
                );
                self.answer(&cb, None, false).await;
            }
            Err(e) if e.is_not_found() => {
                self.answer(&cb, Some(replies::PLAN_GONE), true).await;
                self.deliver(
                    "deleteMessage",
                    self.bot.delete_message(msg.chat.id, msg.message_id).await,
                );
            }
            Err(StoreError::Ledger(LedgerError::InvalidInput(_))) => {
                self.answer(&cb, Some(replies::UNKNOWN_ACTION), false).await;
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), %action, "plan action failed");
                self.answer(&cb, Some(replies::RETRY_LATER), true).await;
            }
        }
    }

    async fn reply(&self, msg: &Message, text: &str) {
        self.deliver("sendMessage", self.bot.send_message(reply_to(msg, text)).await);
    }

    async fn answer(&self, cb: &CallbackQuery, text: Option<&str>, alert: bool) {
        self.deliver(
            "answerCallbackQuery",
            self.bot.answer_callback_query(&cb.id, text, alert).await,
        );
    }

    fn deliver(&self, method: &str, result: Result<(), TelegramError>) {
        if let Err(e) = result {
            warn!(method, error = %e, kind = e.error_kind(), "bot api call failed");
        }
    }
}

fn reply_to(msg: &Message, text: impl Into<String>) -> OutgoingMessage {
    OutgoingMessage::new(msg.chat.id, text)
        .in_thread(msg.message_thread_id)
        .replying_to(msg.message_id)
}

/// Run a store call off the async runtime; the store holds a blocking lock
/// across file writes.
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use planbot_core::FixedClock;
    use planbot_telegram::{BotCall, RecordingBot};
    use serde_json::json;

    const CHAT: i64 = -100;
    const THREAD: i64 = 3;
    const ANN: i64 = 42;
    const BOB: i64 = 77;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<PlanStore>,
        bot: Arc<RecordingBot>,
        handler: UpdateHandler,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PlanStore::open(dir.path().join("data.json")));
        fixture_with(dir, store)
    }

    fn fixture_with(dir: tempfile::TempDir, store: Arc<PlanStore>) -> Fixture {
        let bot = Arc::new(RecordingBot::new());
        let gate = Arc::new(ThreadGate::new("Планы", [(CHAT, THREAD)]));
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()));
        let handler = UpdateHandler::new(Arc::clone(&store), bot.clone(), gate, clock);
        Fixture {
            _dir: dir,
            store,
            bot,
            handler,
        }
    }

    fn text_update(from: i64, thread: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "message_thread_id": thread,
                "is_topic_message": true,
                "from": {"id": from, "is_bot": false},
                "chat": {"id": CHAT},
                "text": text
            }
        }))
        .unwrap()
    }

    fn callback_update(from: i64, author: i64, data: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": from},
                "data": data,
                "message": {
                    "message_id": 11,
                    "message_thread_id": THREAD,
                    "is_topic_message": true,
                    "from": {"id": 999, "is_bot": true},
                    "chat": {"id": CHAT},
                    "text": "📝 A",
                    "reply_to_message": {
                        "message_id": 10,
                        "message_thread_id": THREAD,
                        "from": {"id": author},
                        "chat": {"id": CHAT},
                        "text": "A"
                    }
                }
            }
        }))
        .unwrap()
    }

    fn answer(text: Option<&str>, show_alert: bool) -> BotCall {
        BotCall::Answer {
            callback_id: "cb-1".into(),
            text: text.map(str::to_string),
            show_alert,
        }
    }

    fn active_texts(store: &PlanStore, id: i64) -> Vec<String> {
        store
            .active_plans(&UserKey::from_user_id(id))
            .into_iter()
            .map(|p| p.text)
            .collect()
    }

    #[tokio::test]
    async fn plain_text_adds_plan_and_replies_with_controls() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "  Купить хлеб ")).await;

        assert_eq!(active_texts(&f.store, ANN), vec!["Купить хлеб"]);
        let calls = f.bot.calls();
        let [BotCall::Send(out)] = calls.as_slice() else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(out.text, "📝 Купить хлеб");
        assert_eq!(out.thread_id, Some(THREAD));
        assert_eq!(out.reply_to, Some(10));
        assert_eq!(out.keyboard, Some(replies::plan_controls(0)));
    }

    #[tokio::test]
    async fn second_plan_gets_next_position() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.handler.handle_update(text_update(ANN, THREAD, "B")).await;

        let calls = f.bot.calls();
        let BotCall::Send(out) = &calls[1] else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(out.keyboard, Some(replies::plan_controls(1)));
    }

    #[tokio::test]
    async fn messages_outside_thread_are_ignored() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, 99, "Купить хлеб")).await;
        assert!(f.store.snapshot().is_empty());
        assert!(f.bot.calls().is_empty());
    }

    #[tokio::test]
    async fn start_sends_hint_and_other_commands_are_ignored() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "/start")).await;
        f.handler.handle_update(text_update(ANN, THREAD, "/help")).await;

        let calls = f.bot.calls();
        assert_eq!(calls.len(), 1);
        let BotCall::Send(out) = &calls[0] else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(out.text, replies::START_HINT);
        assert!(f.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn plans_command_rerenders_fresh_positions() {
        let f = fixture();
        for text in ["A", "B", "C"] {
            f.handler.handle_update(text_update(ANN, THREAD, text)).await;
        }
        f.handler.handle_update(callback_update(ANN, ANN, "del_0")).await;
        f.bot.take_calls();

        f.handler.handle_update(text_update(ANN, THREAD, "/plans")).await;
        let sent: Vec<_> = f
            .bot
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                BotCall::Send(out) => Some((out.text, out.keyboard)),
                _ => None,
            })
            .collect();
        assert_eq!(
            sent,
            vec![
                ("📝 B".to_string(), Some(replies::plan_controls(0))),
                ("📝 C".to_string(), Some(replies::plan_controls(1))),
            ]
        );
    }

    #[tokio::test]
    async fn plans_command_with_nothing_active() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "/plans")).await;
        let calls = f.bot.calls();
        let [BotCall::Send(out)] = calls.as_slice() else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(out.text, replies::NO_ACTIVE_PLANS);
    }

    #[tokio::test]
    async fn plans_command_waits_for_the_store_off_the_runtime() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.bot.take_calls();

        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let store = Arc::clone(&f.store);
        let holder = std::thread::spawn(move || {
            store.read(|_| {
                held_tx.send(()).unwrap();
                std::thread::sleep(std::time::Duration::from_millis(300));
            })
        });
        held_rx.recv().unwrap();

        let ticked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let tick = Arc::clone(&ticked);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            tick.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        f.handler.handle_update(text_update(ANN, THREAD, "/plans")).await;

        assert!(ticked.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(f.bot.calls().len(), 1);
        holder.join().unwrap();
    }

    #[tokio::test]
    async fn done_completes_plan_and_edits_message() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.bot.take_calls();

        f.handler.handle_update(callback_update(ANN, ANN, "done_0")).await;

        assert!(active_texts(&f.store, ANN).is_empty());
        let ledger = f.store.read(|b| b.ledger(&UserKey::from_user_id(ANN)).cloned()).unwrap();
        assert_eq!(ledger.completed.len(), 1);
        assert_eq!(
            f.bot.calls(),
            vec![
                BotCall::Edit {
                    chat_id: CHAT,
                    message_id: 11,
                    text: replies::COMPLETED.into()
                },
                answer(None, false),
            ]
        );
    }

    #[tokio::test]
    async fn delete_discards_plan() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.handler.handle_update(text_update(ANN, THREAD, "B")).await;
        f.bot.take_calls();

        f.handler.handle_update(callback_update(ANN, ANN, "del_0")).await;

        assert_eq!(active_texts(&f.store, ANN), vec!["B"]);
        assert!(matches!(&f.bot.calls()[0], BotCall::Edit { text, .. } if text == replies::DELETED));
    }

    #[tokio::test]
    async fn stale_position_alerts_and_removes_message() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.handler.handle_update(text_update(ANN, THREAD, "B")).await;
        f.handler.handle_update(callback_update(ANN, ANN, "del_0")).await;
        f.bot.take_calls();

        f.handler.handle_update(callback_update(ANN, ANN, "del_1")).await;

        assert_eq!(active_texts(&f.store, ANN), vec!["B"]);
        assert_eq!(
            f.bot.calls(),
            vec![
                answer(Some(replies::PLAN_GONE), true),
                BotCall::Delete {
                    chat_id: CHAT,
                    message_id: 11
                },
            ]
        );
    }

    #[tokio::test]
    async fn malformed_data_is_rejected_without_mutation() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.bot.take_calls();

        f.handler.handle_update(callback_update(ANN, ANN, "done_x")).await;

        assert_eq!(active_texts(&f.store, ANN), vec!["A"]);
        assert_eq!(f.bot.calls(), vec![answer(Some(replies::UNKNOWN_ACTION), false)]);
    }

    #[tokio::test]
    async fn other_users_controls_are_refused() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.handler.handle_update(text_update(BOB, THREAD, "B")).await;
        f.bot.take_calls();

        f.handler.handle_update(callback_update(BOB, ANN, "done_0")).await;

        assert_eq!(active_texts(&f.store, ANN), vec!["A"]);
        assert_eq!(active_texts(&f.store, BOB), vec!["B"]);
        assert_eq!(f.bot.calls(), vec![answer(Some(replies::NOT_YOUR_PLAN), true)]);
    }

    #[tokio::test]
    async fn callbacks_outside_thread_are_answered_silently() {
        let f = fixture();
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        f.bot.take_calls();

        let update: Update = serde_json::from_value(json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": ANN},
                "data": "done_0",
                "message": {
                    "message_id": 11,
                    "message_thread_id": 99,
                    "is_topic_message": true,
                    "chat": {"id": CHAT}
                }
            }
        }))
        .unwrap();
        f.handler.handle_update(update).await;

        assert_eq!(active_texts(&f.store, ANN), vec!["A"]);
        assert_eq!(f.bot.calls(), vec![answer(None, false)]);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_to_user() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let store = Arc::new(PlanStore::open(blocker.join("data.json")));
        let f = fixture_with(dir, store);

        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;

        assert!(f.store.snapshot().is_empty());
        let calls = f.bot.calls();
        let [BotCall::Send(out)] = calls.as_slice() else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(out.text, replies::SAVE_FAILED);
    }

    #[tokio::test]
    async fn delivery_failures_do_not_undo_mutations() {
        let f = fixture();
        f.bot.set_failing(true);
        f.handler.handle_update(text_update(ANN, THREAD, "A")).await;
        assert_eq!(active_texts(&f.store, ANN), vec!["A"]);
    }
}
