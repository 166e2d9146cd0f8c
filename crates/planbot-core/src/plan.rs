use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single to-do entry.
///
/// `completed_on` is the only field that changes after creation, and only
/// once, when the plan moves to the completed list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub text: String,
    #[serde(alias = "date")]
    pub created_on: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "done_at")]
    pub completed_on: Option<NaiveDate>,
}

impl Plan {
    pub fn new(text: impl Into<String>, created_on: NaiveDate) -> Self {
        Self {
            text: text.into(),
            created_on,
            completed_on: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_on.is_some()
    }

    /// Consume the plan and stamp its completion date.
    pub(crate) fn completed(mut self, on: NaiveDate) -> Self {
        self.completed_on = Some(on);
        self
    }
}
