//! Monthly maintenance: archive last month's completed plans, then purge
//! everything that does not belong to the current month.
//!
//! There is no persisted rollover state. Each run depends only on `today`
//! and the store contents, so re-running for the same day is harmless.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use planbot_core::period::{is_period_start, same_month};
use planbot_core::{EvictionSummary, Period};
use planbot_store::PlanStore;
use tracing::{info, instrument, warn};

use crate::archive::ArchiveWriter;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// `today` is not the first day of a month.
    NotDue,
    Written {
        period: Period,
        rows: usize,
        path: PathBuf,
    },
    /// Nothing left to archive and an artifact from an earlier run exists;
    /// it is kept rather than overwritten with an empty table.
    Kept {
        period: Period,
        path: PathBuf,
    },
    Failed {
        period: Period,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurgeOutcome {
    Purged(EvictionSummary),
    /// The store could not be written; its previous state is untouched.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolloverReport {
    pub today: NaiveDate,
    pub archive: ArchiveOutcome,
    pub purge: PurgeOutcome,
}

impl RolloverReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.archive, ArchiveOutcome::Failed { .. })
            && !matches!(self.purge, PurgeOutcome::Failed(_))
    }
}

impl fmt::Display for RolloverReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.archive {
            ArchiveOutcome::NotDue => write!(f, "archive: not due")?,
            ArchiveOutcome::Written { period, rows, path } => {
                write!(f, "archive: {rows} plans for {period} -> {}", path.display())?
            }
            ArchiveOutcome::Kept { period, path } => {
                write!(f, "archive: nothing new for {period}, kept {}", path.display())?
            }
            ArchiveOutcome::Failed { period, reason } => {
                write!(f, "archive: failed for {period} ({reason})")?
            }
        }
        match &self.purge {
            PurgeOutcome::Purged(s) => write!(
                f,
                "; purge: {} plans evicted, {} of {} users removed",
                s.plans_evicted, s.users_removed, s.users_scanned
            ),
            PurgeOutcome::Failed(reason) => write!(f, "; purge: failed ({reason})"),
        }
    }
}

pub struct RolloverEngine {
    store: Arc<PlanStore>,
    archive: ArchiveWriter,
}

impl RolloverEngine {
    pub fn new(store: Arc<PlanStore>, archive: ArchiveWriter) -> Self {
        Self { store, archive }
    }

    /// Archive the previous month if `today` opens a new one, then purge.
    /// Archive failures are reported but never stop the purge.
    #[instrument(skip(self))]
    pub fn run(&self, today: NaiveDate) -> RolloverReport {
        let archive = if is_period_start(today) {
            self.archive(Period::containing(today).previous())
        } else {
            ArchiveOutcome::NotDue
        };
        let purge = self.purge(today);

        let report = RolloverReport {
            today,
            archive,
            purge,
        };
        if report.is_success() {
            info!(status = %report, "rollover finished");
        } else {
            warn!(status = %report, "rollover finished with errors");
        }
        report
    }

    pub fn archive(&self, period: Period) -> ArchiveOutcome {
        let rows = self.store.read(|book| book.completed_in(period));
        let existing = self.archive.artifact_path(period);
        if rows.is_empty() && existing.exists() {
            return ArchiveOutcome::Kept {
                period,
                path: existing,
            };
        }
        match self.archive.write(period, &rows) {
            Ok(path) => ArchiveOutcome::Written {
                period,
                rows: rows.len(),
                path,
            },
            Err(e) => {
                warn!(%period, error = %e, kind = e.error_kind(), "archive write failed");
                ArchiveOutcome::Failed {
                    period,
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn purge(&self, today: NaiveDate) -> PurgeOutcome {
        match self
            .store
            .mutate(|book| Ok(book.evict_all_stale(today, same_month)))
        {
            Ok(summary) => PurgeOutcome::Purged(summary),
            Err(e) => PurgeOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planbot_core::UserKey;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<PlanStore>,
        engine: RolloverEngine,
        archive_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PlanStore::open(dir.path().join("data.json")));
        let archive_dir = dir.path().join("archive");
        let engine = RolloverEngine::new(Arc::clone(&store), ArchiveWriter::new(&archive_dir));
        Fixture {
            _dir: dir,
            store,
            engine,
            archive_dir,
        }
    }

    fn seed_march(store: &PlanStore, user: &UserKey) {
        store.add_plan(user, "Buy bread", d(2024, 3, 1)).unwrap();
        store.add_plan(user, "Fix bike", d(2024, 3, 15)).unwrap();
        store
            .mutate(|b| b.complete(user, 0, d(2024, 3, 20)))
            .unwrap();
    }

    #[test]
    fn first_of_month_archives_then_purges() {
        let fx = fixture();
        let user = UserKey::from_user_id(1);
        seed_march(&fx.store, &user);

        let report = fx.engine.run(d(2024, 4, 1));

        let ArchiveOutcome::Written { period, rows, path } = &report.archive else {
            panic!("expected archive, got {:?}", report.archive);
        };
        assert_eq!(period.to_string(), "2024-03");
        assert_eq!(*rows, 1);
        let csv = std::fs::read_to_string(path).unwrap();
        assert_eq!(csv, "completedOn,userKey,text\r\n2024-03-20,u1,Buy bread\r\n");

        assert_eq!(
            report.purge,
            PurgeOutcome::Purged(EvictionSummary {
                users_scanned: 1,
                users_removed: 1,
                plans_evicted: 2,
            })
        );
        assert!(fx.store.snapshot().is_empty());
        assert!(report.is_success());
    }

    #[test]
    fn mid_month_only_purges() {
        let fx = fixture();
        let user = UserKey::from_user_id(1);
        seed_march(&fx.store, &user);
        fx.store.add_plan(&user, "April plan", d(2024, 4, 10)).unwrap();

        let report = fx.engine.run(d(2024, 4, 15));

        assert_eq!(report.archive, ArchiveOutcome::NotDue);
        assert!(!fx.archive_dir.exists());
        assert_eq!(fx.store.active_plans(&user).len(), 1);
        assert_eq!(
            report.to_string(),
            "archive: not due; purge: 2 plans evicted, 0 of 1 users removed"
        );
    }

    #[test]
    fn archive_failure_does_not_block_purge() {
        let fx = fixture();
        let user = UserKey::from_user_id(1);
        seed_march(&fx.store, &user);
        std::fs::write(&fx.archive_dir, "occupied").unwrap();

        let report = fx.engine.run(d(2024, 4, 1));

        assert!(matches!(report.archive, ArchiveOutcome::Failed { .. }));
        assert!(matches!(report.purge, PurgeOutcome::Purged(_)));
        assert!(fx.store.snapshot().is_empty());
        assert!(!report.is_success());
        assert!(report.to_string().starts_with("archive: failed for 2024-03"));
    }

    #[test]
    fn rerun_is_idempotent() {
        let fx = fixture();
        let user = UserKey::from_user_id(1);
        seed_march(&fx.store, &user);
        fx.store.add_plan(&user, "April plan", d(2024, 4, 1)).unwrap();

        let first = fx.engine.run(d(2024, 4, 1));
        let after_first = fx.store.snapshot();
        let second = fx.engine.run(d(2024, 4, 1));

        assert_eq!(fx.store.snapshot(), after_first);
        // March is already purged, so the first artifact must survive
        let ArchiveOutcome::Kept { path, .. } = &second.archive else {
            panic!("expected kept archive, got {:?}", second.archive);
        };
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 2);
        assert!(matches!(first.archive, ArchiveOutcome::Written { rows: 1, .. }));
        assert_eq!(
            second.purge,
            PurgeOutcome::Purged(EvictionSummary {
                users_scanned: 1,
                users_removed: 0,
                plans_evicted: 0,
            })
        );
    }

    #[test]
    fn january_archives_december() {
        let fx = fixture();
        let user = UserKey::from_user_id(3);
        fx.store.add_plan(&user, "Gifts", d(2023, 12, 1)).unwrap();
        fx.store.mutate(|b| b.complete(&user, 0, d(2023, 12, 24))).unwrap();

        let report = fx.engine.run(d(2024, 1, 1));
        assert!(matches!(
            report.archive,
            ArchiveOutcome::Written { rows: 1, .. }
        ));
        assert!(fx.archive_dir.join("plans-2023-12.csv").exists());
    }
}
