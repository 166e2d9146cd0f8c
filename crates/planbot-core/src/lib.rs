pub mod action;
pub mod clock;
pub mod errors;
pub mod ids;
pub mod ledger;
pub mod period;
pub mod plan;

pub use action::{Action, ActionVerb};
pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::LedgerError;
pub use ids::UserKey;
pub use ledger::{ArchiveRow, EvictionSummary, Ledger, PlanBook};
pub use period::Period;
pub use plan::Plan;
