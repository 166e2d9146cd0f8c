//! Per-user plan ledgers and the mutations applied to them.
//!
//! A plan is addressed by its current index in the owner's active list.
//! Every lookup is bounds-checked so a position rendered before an earlier
//! removal fails with [`LedgerError::NotFound`] instead of hitting the plan
//! that shifted into its slot.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionVerb};
use crate::errors::LedgerError;
use crate::ids::UserKey;
use crate::period::Period;
use crate::plan::Plan;

/// One user's active and completed plans, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub active: Vec<Plan>,
    #[serde(default, alias = "done")]
    pub completed: Vec<Plan>,
}

impl Ledger {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.completed.is_empty()
    }
}

/// A completed plan selected for the monthly export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveRow {
    pub completed_on: NaiveDate,
    pub user: UserKey,
    pub text: String,
}

/// Totals from one eviction pass over every ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionSummary {
    pub users_scanned: usize,
    pub users_removed: usize,
    pub plans_evicted: usize,
}

/// All users' ledgers, keyed by user. This is the unit that gets persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanBook {
    ledgers: BTreeMap<UserKey, Ledger>,
}

impl PlanBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    pub fn ledger(&self, user: &UserKey) -> Option<&Ledger> {
        self.ledgers.get(user)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserKey> {
        self.ledgers.keys()
    }

    /// Active plans for `user`; empty if the user has no ledger.
    pub fn active(&self, user: &UserKey) -> &[Plan] {
        self.ledgers
            .get(user)
            .map(|l| l.active.as_slice())
            .unwrap_or_default()
    }

    /// Append a plan and return its position in the active list.
    pub fn add_plan(
        &mut self,
        user: &UserKey,
        text: &str,
        today: NaiveDate,
    ) -> Result<usize, LedgerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LedgerError::InvalidInput("plan text is empty".into()));
        }

        let ledger = self.ledgers.entry(user.clone()).or_default();
        ledger.active.push(Plan::new(text, today));
        Ok(ledger.active.len() - 1)
    }

    pub fn resolve(&self, user: &UserKey, position: usize) -> Result<&Plan, LedgerError> {
        let ledger = self
            .ledgers
            .get(user)
            .ok_or_else(|| LedgerError::NotFound(format!("no plans for {user}")))?;
        ledger
            .active
            .get(position)
            .ok_or_else(|| stale_position(user, position, ledger.active.len()))
    }

    /// Move the plan at `position` to the completed list, stamped with `today`.
    pub fn complete(
        &mut self,
        user: &UserKey,
        position: usize,
        today: NaiveDate,
    ) -> Result<Plan, LedgerError> {
        let plan = self.take_active(user, position)?.completed(today);
        let ledger = self
            .ledgers
            .get_mut(user)
            .ok_or_else(|| LedgerError::NotFound(format!("no plans for {user}")))?;
        ledger.completed.push(plan.clone());
        Ok(plan)
    }

    /// Remove the plan at `position` without recording it as completed.
    pub fn discard(&mut self, user: &UserKey, position: usize) -> Result<Plan, LedgerError> {
        self.take_active(user, position)
    }

    pub fn apply(
        &mut self,
        user: &UserKey,
        action: Action,
        today: NaiveDate,
    ) -> Result<Plan, LedgerError> {
        match action.verb {
            ActionVerb::Done => self.complete(user, action.position, today),
            ActionVerb::Delete => self.discard(user, action.position),
        }
    }

    /// Keep only plans whose relevant date satisfies `retain(date, today)`:
    /// creation date for active plans, completion date for completed ones.
    /// Drops the user's ledger if nothing is left. Returns how many plans
    /// were evicted.
    pub fn evict_stale<F>(&mut self, user: &UserKey, today: NaiveDate, retain: F) -> usize
    where
        F: Fn(NaiveDate, NaiveDate) -> bool,
    {
        let Some(ledger) = self.ledgers.get_mut(user) else {
            return 0;
        };

        let before = ledger.active.len() + ledger.completed.len();
        ledger.active.retain(|p| retain(p.created_on, today));
        ledger
            .completed
            .retain(|p| p.completed_on.is_some_and(|on| retain(on, today)));
        let evicted = before - ledger.active.len() - ledger.completed.len();

        if ledger.is_empty() {
            self.ledgers.remove(user);
        }
        evicted
    }

    pub fn evict_all_stale<F>(&mut self, today: NaiveDate, retain: F) -> EvictionSummary
    where
        F: Fn(NaiveDate, NaiveDate) -> bool,
    {
        let users: Vec<UserKey> = self.ledgers.keys().cloned().collect();
        let mut summary = EvictionSummary {
            users_scanned: users.len(),
            ..EvictionSummary::default()
        };

        for user in &users {
            summary.plans_evicted += self.evict_stale(user, today, &retain);
            if !self.ledgers.contains_key(user) {
                summary.users_removed += 1;
            }
        }
        summary
    }

    /// Completed plans finished within `period`, users in key order and each
    /// user's plans in completion order.
    pub fn completed_in(&self, period: Period) -> Vec<ArchiveRow> {
        self.ledgers
            .iter()
            .flat_map(|(user, ledger)| {
                ledger.completed.iter().filter_map(move |plan| {
                    let on = plan.completed_on?;
                    period.contains(on).then(|| ArchiveRow {
                        completed_on: on,
                        user: user.clone(),
                        text: plan.text.clone(),
                    })
                })
            })
            .collect()
    }

    fn take_active(&mut self, user: &UserKey, position: usize) -> Result<Plan, LedgerError> {
        let ledger = self
            .ledgers
            .get_mut(user)
            .ok_or_else(|| LedgerError::NotFound(format!("no plans for {user}")))?;
        if position >= ledger.active.len() {
            return Err(stale_position(user, position, ledger.active.len()));
        }
        Ok(ledger.active.remove(position))
    }
}

fn stale_position(user: &UserKey, position: usize, len: usize) -> LedgerError {
    LedgerError::NotFound(format!(
        "plan {position} for {user} (active list has {len})"
    ))
}
