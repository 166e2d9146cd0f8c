pub mod document;
pub mod error;
pub mod store;

pub use document::{write_atomic, LedgerDocument};
pub use error::StoreError;
pub use store::PlanStore;
