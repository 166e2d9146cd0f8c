//! Webhook server for the plans bot.
//!
//! - [`server`]: axum router, startup and shutdown
//! - [`handlers`]: update dispatch onto the plan store
//! - [`replies`]: user-facing texts and inline controls
//! - [`health`]: `/health` response

pub mod handlers;
pub mod health;
pub mod replies;
pub mod server;

pub use handlers::UpdateHandler;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
