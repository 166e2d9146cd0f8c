//! Decides which forum threads the bot listens in.
//!
//! A thread qualifies when it is pinned in settings or when the bot has seen
//! evidence that its name is the configured topic name. Evidence is the
//! service message announcing the topic's creation or rename, which Telegram
//! also attaches as `reply_to_message` to messages posted in the topic.

use std::collections::HashSet;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::types::Message;

type ThreadKey = (i64, i64);

pub struct ThreadGate {
    topic_name: String,
    pinned: HashSet<ThreadKey>,
    learned: RwLock<HashSet<ThreadKey>>,
}

impl ThreadGate {
    pub fn new(topic_name: impl Into<String>, pinned: impl IntoIterator<Item = ThreadKey>) -> Self {
        Self {
            topic_name: topic_name.into(),
            pinned: pinned.into_iter().collect(),
            learned: RwLock::new(HashSet::new()),
        }
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    /// Learn from topic service messages carried by `msg`.
    pub fn observe(&self, msg: &Message) {
        let Some(key) = msg.topic() else {
            return;
        };

        if let Some(edited) = &msg.forum_topic_edited {
            if let Some(name) = &edited.name {
                if self.matches(name) {
                    self.learn(key);
                } else if self.learned.write().remove(&key) {
                    info!(chat_id = key.0, thread_id = key.1, new_name = %name, "plans topic renamed away");
                }
            }
            return;
        }

        let created = msg.forum_topic_created.as_ref().or_else(|| {
            msg.reply_to_message
                .as_deref()
                .and_then(|parent| parent.forum_topic_created.as_ref())
        });
        if let Some(created) = created {
            if self.matches(&created.name) {
                self.learn(key);
            }
        }
    }

    /// Whether `msg` was posted in a plans thread. Observes `msg` first.
    pub fn admits(&self, msg: &Message) -> bool {
        self.observe(msg);
        msg.topic().is_some_and(|key| self.is_designated(key))
    }

    pub fn is_designated(&self, key: ThreadKey) -> bool {
        self.pinned.contains(&key) || self.learned.read().contains(&key)
    }

    fn matches(&self, name: &str) -> bool {
        name.trim() == self.topic_name.trim()
    }

    fn learn(&self, key: ThreadKey) {
        if self.learned.write().insert(key) {
            debug!(chat_id = key.0, thread_id = key.1, "learned plans topic");
        }
    }
}
