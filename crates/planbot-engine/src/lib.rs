pub mod archive;
pub mod error;
pub mod rollover;

pub use archive::ArchiveWriter;
pub use error::EngineError;
pub use rollover::{ArchiveOutcome, PurgeOutcome, RolloverEngine, RolloverReport};
