use std::path::Path;

use chrono::NaiveDate;
use parking_lot::Mutex;
use planbot_core::{Action, LedgerError, Plan, PlanBook, UserKey};
use tracing::{info, instrument, warn};

use crate::document::LedgerDocument;
use crate::error::StoreError;

/// Process-wide plan store.
///
/// The book lives in memory behind a single mutex and every mutation is
/// written through to the document before it becomes visible. The lock is
/// held across the write, so at most one read-modify-write is in flight.
pub struct PlanStore {
    document: LedgerDocument,
    book: Mutex<PlanBook>,
}

impl PlanStore {
    /// Open the store backed by the document at `path`, loading whatever it holds.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let document = LedgerDocument::new(path.as_ref());
        let book = document.load();
        info!(path = %document.path().display(), users = book.len(), "plan store opened");
        Self {
            document,
            book: Mutex::new(book),
        }
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// Apply `f` to a copy of the book and persist it.
    ///
    /// The copy replaces the in-memory book only once the document write has
    /// succeeded; if `f` fails, nothing is written.
    pub fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PlanBook) -> Result<T, LedgerError>,
    {
        let mut guard = self.book.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;

        if let Err(e) = self.document.save(&next) {
            warn!(path = %self.document.path().display(), error = %e, "ledger write failed, mutation discarded");
            return Err(e);
        }
        *guard = next;
        Ok(out)
    }

    pub fn read<T>(&self, f: impl FnOnce(&PlanBook) -> T) -> T {
        f(&self.book.lock())
    }

    pub fn snapshot(&self) -> PlanBook {
        self.book.lock().clone()
    }

    pub fn user_count(&self) -> usize {
        self.book.lock().len()
    }

    #[instrument(skip_all, fields(user = %user))]
    pub fn add_plan(&self, user: &UserKey, text: &str, today: NaiveDate) -> Result<usize, StoreError> {
        self.mutate(|book| book.add_plan(user, text, today))
    }

    #[instrument(skip_all, fields(user = %user, action = %action))]
    pub fn apply_action(
        &self,
        user: &UserKey,
        action: Action,
        today: NaiveDate,
    ) -> Result<Plan, StoreError> {
        self.mutate(|book| book.apply(user, action, today))
    }

    pub fn active_plans(&self, user: &UserKey) -> Vec<Plan> {
        self.read(|book| book.active(user).to_vec())
    }
}
